use crate::models::{Stored, WorkflowActivity, WorkflowRun, WorkflowStats};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Tables {
    runs: HashMap<u64, Stored<WorkflowRun>>,
    stats: HashMap<String, Stored<WorkflowStats>>,
    activity: HashMap<(String, NaiveDate), Stored<WorkflowActivity>>,
    next_id: u64,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Volatile in-memory store for runs, per-repository stats and daily activity.
///
/// Every method takes the lock for its whole duration, so each call is atomic
/// from the caller's point of view.
#[derive(Default)]
pub struct RecordStore {
    inner: RwLock<Tables>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tables> {
        // a panicking writer cannot leave a map half-updated, so poison is ignored
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tables> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Runs for `repository`, newest first, then sliced to `offset..offset + limit`.
    pub fn list_runs(&self, repository: &str, limit: usize, offset: usize) -> Vec<Stored<WorkflowRun>> {
        let tables = self.read();
        let mut runs: Vec<Stored<WorkflowRun>> = tables
            .runs
            .values()
            .filter(|r| r.record.repository == repository)
            .cloned()
            .collect();
        runs.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then_with(|| b.record.run_id.cmp(&a.record.run_id))
        });
        runs.into_iter().skip(offset).take(limit).collect()
    }

    pub fn count_runs(&self, repository: &str) -> usize {
        self.read()
            .runs
            .values()
            .filter(|r| r.record.repository == repository)
            .count()
    }

    pub fn get_run(&self, run_id: u64) -> Option<Stored<WorkflowRun>> {
        self.read().runs.get(&run_id).cloned()
    }

    /// Merge-or-insert by `run_id`. An existing record keeps its surrogate id.
    pub fn put_run(&self, run: WorkflowRun) -> Stored<WorkflowRun> {
        let mut tables = self.write();
        let id = match tables.runs.get(&run.run_id) {
            Some(existing) => existing.id,
            None => tables.allocate_id(),
        };
        let stored = Stored { id, record: run };
        tables.runs.insert(stored.record.run_id, stored.clone());
        stored
    }

    pub fn delete_run(&self, run_id: u64) -> bool {
        self.write().runs.remove(&run_id).is_some()
    }

    pub fn get_stats(&self, repository: &str) -> Option<Stored<WorkflowStats>> {
        self.read().stats.get(repository).cloned()
    }

    pub fn put_stats(&self, stats: WorkflowStats) -> Stored<WorkflowStats> {
        let mut tables = self.write();
        let id = match tables.stats.get(&stats.repository) {
            Some(existing) => existing.id,
            None => tables.allocate_id(),
        };
        let stored = Stored { id, record: stats };
        tables.stats.insert(stored.record.repository.clone(), stored.clone());
        stored
    }

    /// The last `days` activity entries for `repository`, oldest first.
    pub fn list_activity(&self, repository: &str, days: usize) -> Vec<Stored<WorkflowActivity>> {
        let tables = self.read();
        let mut entries: Vec<Stored<WorkflowActivity>> = tables
            .activity
            .values()
            .filter(|a| a.record.repository == repository)
            .cloned()
            .collect();
        entries.sort_by_key(|a| a.record.date);
        let skip = entries.len().saturating_sub(days);
        entries.split_off(skip)
    }

    pub fn put_activity(&self, repository: &str, date: NaiveDate, run_count: u32) -> Stored<WorkflowActivity> {
        let mut tables = self.write();
        let key = (repository.to_string(), date);
        let id = match tables.activity.get(&key) {
            Some(existing) => existing.id,
            None => tables.allocate_id(),
        };
        let stored = Stored {
            id,
            record: WorkflowActivity {
                repository: repository.to_string(),
                date,
                run_count,
            },
        };
        tables.activity.insert(key, stored.clone());
        stored
    }
}
