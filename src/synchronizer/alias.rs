//! Alias property resolution
//!
//! An alias `property alias text: label.text` names a type (the type of
//! `label`), a stem property on it and optionally a tail property on the
//! stem's type. The alias takes the type and traits of the last property in
//! that expression. Aliases may point at other aliases, so resolution walks
//! the chain with an explicit stack and rejects cycles.

use std::collections::{BTreeSet, HashSet, VecDeque};

use rusqlite::params;

use super::{Synchronizer, dependents};
use crate::ids::{PropertyDeclarationId, TypeId};
use crate::storage::records::{self, PropertyRow};
use crate::{Error, Result};

/// Where an alias ends up
struct AliasTarget {
    alias_type_id: TypeId,
    stem: PropertyRow,
    tail: Option<PropertyRow>,
}

impl AliasTarget {
    fn terminal(&self) -> &PropertyRow {
        self.tail.as_ref().unwrap_or(&self.stem)
    }
}

enum Step {
    Resolved(AliasTarget),
    /// The alias depends on another alias that has to be resolved first
    Blocked(PropertyDeclarationId),
}

impl Synchronizer<'_> {
    pub(super) fn resolve_aliases(&mut self) -> Result<()> {
        self.collect_pending_aliases()?;
        if self.pending_aliases.is_empty() {
            return Ok(());
        }
        tracing::debug!("Resolving {} alias properties", self.pending_aliases.len());

        let pending = std::mem::take(&mut self.pending_aliases);
        let mut resolved = HashSet::new();
        for &alias_id in &pending {
            self.resolve_alias(alias_id, &pending, &mut resolved)?;
        }
        Ok(())
    }

    /// Aliases whose target may have moved: those touched directly, those
    /// pointing into types whose ancestry or members changed, and every
    /// alias that depends on one of them.
    fn collect_pending_aliases(&mut self) -> Result<()> {
        let roots: BTreeSet<TypeId> = self.chain_changed.union(&self.package_types).copied().collect();
        if !roots.is_empty() {
            let affected_types = dependents::derived_types_closure(self.conn, &roots)?;
            self.pending_aliases
                .extend(dependents::aliases_into_types(self.conn, &affected_types)?);
        }
        self.pending_aliases.extend(self.orphaned_aliases.iter().copied());

        let mut queue: VecDeque<PropertyDeclarationId> = self
            .pending_aliases
            .iter()
            .chain(self.changed_properties.iter())
            .copied()
            .collect();
        let mut visited: HashSet<PropertyDeclarationId> = queue.iter().copied().collect();
        while let Some(property_id) = queue.pop_front() {
            for (dependent, _) in dependents::alias_dependents(self.conn, property_id)? {
                self.pending_aliases.insert(dependent);
                if visited.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        Ok(())
    }

    fn resolve_alias(
        &mut self,
        alias_id: PropertyDeclarationId,
        pending: &BTreeSet<PropertyDeclarationId>,
        resolved: &mut HashSet<PropertyDeclarationId>,
    ) -> Result<()> {
        let mut stack = vec![alias_id];
        let mut on_path: HashSet<PropertyDeclarationId> = HashSet::from([alias_id]);

        while let Some(&current) = stack.last() {
            if resolved.contains(&current) {
                stack.pop();
                on_path.remove(&current);
                continue;
            }
            let Some(row) = records::fetch_property(self.conn, current)? else {
                resolved.insert(current);
                continue;
            };
            if !row.is_alias() {
                resolved.insert(current);
                continue;
            }

            match self.locate_alias_target(&row, pending, resolved)? {
                Step::Blocked(dependency) => {
                    if !on_path.insert(dependency) {
                        tracing::warn!("Alias {} ({}) is part of an alias cycle", row.name, row.id);
                        return Err(Error::AliasChainCycle);
                    }
                    stack.push(dependency);
                }
                Step::Resolved(target) => {
                    self.store_alias_link(&row, &target)?;
                    resolved.insert(current);
                }
            }
        }

        Ok(())
    }

    fn locate_alias_target(
        &mut self,
        row: &PropertyRow,
        pending: &BTreeSet<PropertyDeclarationId>,
        resolved: &HashSet<PropertyDeclarationId>,
    ) -> Result<Step> {
        let unresolved = |property: &PropertyRow| {
            property.is_alias() && (property.id == row.id || (pending.contains(&property.id) && !resolved.contains(&property.id)))
        };

        let alias_type_id = match row.alias_type_id {
            Some(type_id) => type_id,
            None => {
                let name_id = row
                    .property_type_name_id
                    .ok_or_else(|| Error::PropertyNameDoesNotExist(row.name.clone()))?;
                let type_id = self.resolve_stored_name(name_id, false)?;
                self.conn.execute(
                    "UPDATE property_declarations SET alias_type_id = ?1 WHERE property_declaration_id = ?2",
                    params![type_id, row.id],
                )?;
                type_id
            }
        };

        let stem_name = row.alias_property_name.as_deref().unwrap_or_default();
        let stem = self.find_alias_part(row, alias_type_id, stem_name)?;
        if unresolved(&stem) {
            return Ok(Step::Blocked(stem.id));
        }

        let tail = match row.alias_property_name_tail.as_deref() {
            Some(tail_name) => {
                let stem_type = stem
                    .property_type_id
                    .ok_or_else(|| Error::PropertyNameDoesNotExist(format!("{}.{}", stem_name, tail_name)))?;
                let tail = self.find_alias_part(row, stem_type, tail_name)?;
                if unresolved(&tail) {
                    return Ok(Step::Blocked(tail.id));
                }
                Some(tail)
            }
            None => None,
        };

        Ok(Step::Resolved(AliasTarget {
            alias_type_id,
            stem,
            tail,
        }))
    }

    fn find_alias_part(&self, alias: &PropertyRow, type_id: TypeId, name: &str) -> Result<PropertyRow> {
        match records::find_property_in_chain(self.conn, type_id, name)? {
            Some(property) => Ok(property),
            None if self.orphaned_aliases.contains(&alias.id) => Err(Error::ConstraintPreventsModification(
                format!("alias {} still points at removed property {}", alias.name, name),
            )),
            None => Err(Error::PropertyNameDoesNotExist(name.to_string())),
        }
    }

    fn store_alias_link(&mut self, alias: &PropertyRow, target: &AliasTarget) -> Result<()> {
        let terminal = target.terminal();
        self.conn.execute(
            "UPDATE property_declarations SET property_type_id = ?1, traits = ?2, alias_type_id = ?3,
             alias_property_declaration_id = ?4, alias_property_declaration_tail_id = ?5
             WHERE property_declaration_id = ?6",
            params![
                terminal.property_type_id,
                terminal.traits.bits(),
                target.alias_type_id,
                target.stem.id,
                target.tail.as_ref().map(|tail| tail.id),
                alias.id
            ],
        )?;
        self.report.resolved_aliases += 1;
        Ok(())
    }
}
