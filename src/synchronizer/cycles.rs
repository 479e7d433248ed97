//! Prototype graph cycle detection

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension};

use super::Synchronizer;
use crate::ids::TypeId;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

fn ancestors(conn: &Connection, type_id: TypeId) -> Result<Vec<TypeId>> {
    let links: Option<(Option<TypeId>, Option<TypeId>)> = conn
        .prepare_cached("SELECT prototype_id, extension_id FROM types WHERE type_id = ?1")?
        .query_row([type_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .optional()?;
    Ok(links
        .map(|(prototype, extension)| prototype.into_iter().chain(extension).collect())
        .unwrap_or_default())
}

impl Synchronizer<'_> {
    /// A stored graph is acyclic, so any new cycle runs through a type
    /// whose links were written in this call.
    pub(super) fn check_prototype_cycles(&self) -> Result<()> {
        let mut marks: HashMap<TypeId, Mark> = HashMap::new();
        let starts = self.chain_changed.iter().chain(self.declaration_types.iter());

        for &start in starts {
            if marks.contains_key(&start) {
                continue;
            }
            marks.insert(start, Mark::InProgress);
            let mut stack = vec![(start, ancestors(self.conn, start)?, 0usize)];

            while let Some((type_id, next, index)) = stack.last_mut() {
                let Some(&ancestor) = next.get(*index) else {
                    marks.insert(*type_id, Mark::Done);
                    stack.pop();
                    continue;
                };
                *index += 1;

                match marks.get(&ancestor) {
                    Some(Mark::InProgress) => {
                        tracing::warn!("Prototype chain of type {} loops back to {}", start, ancestor);
                        return Err(Error::PrototypeChainCycle);
                    }
                    Some(Mark::Done) => {}
                    None => {
                        marks.insert(ancestor, Mark::InProgress);
                        let ancestor_links = ancestors(self.conn, ancestor)?;
                        stack.push((ancestor, ancestor_links, 0));
                    }
                }
            }
        }

        Ok(())
    }
}
