use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

/// A table known to the mock lake catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRecord {
    pub name: String,
    pub owner: String,
    pub ddl: String,
}

/// An integration task known to the mock scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub target_table: String,
    pub parallelism: u64,
    pub status: String,
}

/// Mocked lake environment the inspection tools operate on.
///
/// Holds tables and integration tasks behind one lock so tool calls observe a
/// consistent view. Seeded with sample records so validation dialogues have
/// something to find.
pub struct MockCatalog {
    inner: RwLock<CatalogState>,
}

struct CatalogState {
    tables: HashMap<String, TableRecord>,
    tasks: HashMap<String, TaskRecord>,
}

impl MockCatalog {
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(CatalogState {
                tables: HashMap::new(),
                tasks: HashMap::new(),
            }),
        }
    }

    pub fn with_samples() -> Self {
        let catalog = Self::empty();
        catalog.put_table(TableRecord {
            name: "lake_ods_orders_order_detail".into(),
            owner: "data_platform".into(),
            ddl: "CREATE TABLE lake_ods_orders_order_detail (id bigint, order_no varchar(64), amount decimal(18,2), dt date)".into(),
        });
        catalog.put_table(TableRecord {
            name: "lake_ods_users_profile".into(),
            owner: "data_platform".into(),
            ddl: "CREATE TABLE lake_ods_users_profile (id bigint, nickname varchar(128), dt date)".into(),
        });
        catalog.put_task(TaskRecord {
            task_id: "INT-SAMPLE01-001".into(),
            target_table: "lake_ods_orders_order_detail".into(),
            parallelism: 2,
            status: "running".into(),
        });
        catalog
    }

    pub fn put_table(&self, table: TableRecord) {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        state.tables.insert(table.name.clone(), table);
    }

    pub fn put_task(&self, task: TaskRecord) {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        state.tasks.insert(task.task_id.clone(), task);
    }

    pub fn table_ddl(&self, name: &str) -> Option<String> {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        state.tables.get(name).map(|t| t.ddl.clone())
    }

    /// Remove a table. Returns whether it existed.
    pub fn drop_table(&self, name: &str) -> bool {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        state.tables.remove(name).is_some()
    }

    /// Remove an integration task. Returns whether it existed.
    pub fn drop_task(&self, task_id: &str) -> bool {
        let mut state = self.inner.write().unwrap_or_else(|e| e.into_inner());
        state.tasks.remove(task_id).is_some()
    }

    /// Tasks matching the given filters; no filters means all tasks.
    pub fn query_tasks(&self, target_table: Option<&str>, status: Option<&str>) -> Vec<TaskRecord> {
        let state = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut tasks: Vec<TaskRecord> = state
            .tasks
            .values()
            .filter(|t| target_table.map_or(true, |table| t.target_table == table))
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        tasks
    }
}
