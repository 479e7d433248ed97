//! File statuses and project data

use std::collections::{BTreeSet, HashSet};

use rusqlite::params;

use super::Synchronizer;
use crate::Result;
use crate::ids::SourceId;
use crate::synchronization::SynchronizationPackage;

impl Synchronizer<'_> {
    pub(super) fn synchronize_file_statuses(&mut self, package: &SynchronizationPackage) -> Result<()> {
        let given: HashSet<SourceId> = package.file_statuses.iter().map(|status| status.source_id).collect();

        for source_id in &package.updated_file_status_source_ids {
            if !given.contains(source_id) {
                self.conn.execute("DELETE FROM file_statuses WHERE source_id = ?1", [source_id])?;
            }
        }

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO file_statuses (source_id, size, last_modified) VALUES (?1, ?2, ?3)
             ON CONFLICT(source_id) DO UPDATE SET size = excluded.size, last_modified = excluded.last_modified",
        )?;
        for status in &package.file_statuses {
            stmt.execute(params![status.source_id, status.size, status.last_modified])?;
        }
        Ok(())
    }

    pub(super) fn synchronize_project_datas(&mut self, package: &SynchronizationPackage) -> Result<()> {
        let projects: BTreeSet<SourceId> = package.updated_project_source_ids.iter().copied().collect();

        for project_source_id in projects {
            let keep: Vec<SourceId> = package
                .project_datas
                .iter()
                .filter(|data| data.project_source_id == project_source_id)
                .map(|data| data.source_id)
                .collect();
            let stored: Vec<SourceId> = {
                let mut stmt = self
                    .conn
                    .prepare_cached("SELECT source_id FROM project_datas WHERE project_source_id = ?1")?;
                let rows = stmt
                    .query_map([project_source_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<_>>()?;
                rows
            };
            for source_id in stored.into_iter().filter(|source_id| !keep.contains(source_id)) {
                self.conn.execute(
                    "DELETE FROM project_datas WHERE project_source_id = ?1 AND source_id = ?2",
                    params![project_source_id, source_id],
                )?;
            }
        }

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO project_datas (project_source_id, source_id, module_id, file_type) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(project_source_id, source_id)
             DO UPDATE SET module_id = excluded.module_id, file_type = excluded.file_type",
        )?;
        for data in &package.project_datas {
            stmt.execute(params![
                data.project_source_id,
                data.source_id,
                data.module_id,
                data.file_type.as_str()
            ])?;
        }
        Ok(())
    }
}
