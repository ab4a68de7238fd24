use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::info;

use lakeflow_core::error::{LakeflowError, Result};
use lakeflow_core::traits::{InspectionTool, ToolParam};

use crate::catalog::MockCatalog;

/// Removes a table from the lake catalog.
pub struct DropTableTool {
    catalog: Arc<MockCatalog>,
}

impl InspectionTool for DropTableTool {
    fn name(&self) -> &str {
        "drop_table"
    }

    fn description(&self) -> &str {
        "Remove a table from the lake catalog, e.g. to clear a leftover from a failed run"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![ToolParam::required("table_name", "Table to remove", "string")]
    }

    fn invoke<'a>(
        &'a self,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'a, Result<serde_json::Value>> {
        Box::pin(async move {
            let name = require_str(&params, "table_name")?;
            let removed = self.catalog.drop_table(name);
            info!(table = %name, removed, "drop_table invoked");
            Ok(serde_json::json!({"table_name": name, "removed": removed}))
        })
    }
}

/// Removes an integration task from the scheduler.
pub struct DropIntegrationTaskTool {
    catalog: Arc<MockCatalog>,
}

impl InspectionTool for DropIntegrationTaskTool {
    fn name(&self) -> &str {
        "drop_integration_task"
    }

    fn description(&self) -> &str {
        "Remove an integration task from the scheduler"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![ToolParam::required("task_id", "Task to remove", "string")]
    }

    fn invoke<'a>(
        &'a self,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'a, Result<serde_json::Value>> {
        Box::pin(async move {
            let task_id = require_str(&params, "task_id")?;
            let removed = self.catalog.drop_task(task_id);
            info!(task_id = %task_id, removed, "drop_integration_task invoked");
            Ok(serde_json::json!({"task_id": task_id, "removed": removed}))
        })
    }
}

/// Lists integration tasks, optionally filtered by target table.
pub struct QueryIntegrationTasksTool {
    catalog: Arc<MockCatalog>,
}

impl InspectionTool for QueryIntegrationTasksTool {
    fn name(&self) -> &str {
        "query_integration_tasks"
    }

    fn description(&self) -> &str {
        "List integration tasks, optionally filtered by target table"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::optional("target_table", "Only tasks syncing into this table", "string"),
            ToolParam::optional("status", "Only tasks in this state", "string"),
        ]
    }

    fn invoke<'a>(
        &'a self,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'a, Result<serde_json::Value>> {
        Box::pin(async move {
            let target = params.get("target_table").and_then(|v| v.as_str());
            let status = params.get("status").and_then(|v| v.as_str());
            let tasks = self.catalog.query_tasks(target, status);
            let count = tasks.len();
            Ok(serde_json::json!({"tasks": tasks, "count": count}))
        })
    }
}

/// Fetches the DDL of a lake table.
pub struct TableDdlTool {
    catalog: Arc<MockCatalog>,
}

impl InspectionTool for TableDdlTool {
    fn name(&self) -> &str {
        "get_table_ddl"
    }

    fn description(&self) -> &str {
        "Fetch the DDL of a lake table"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![ToolParam::required("table_name", "Table to describe", "string")]
    }

    fn invoke<'a>(
        &'a self,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'a, Result<serde_json::Value>> {
        Box::pin(async move {
            let name = require_str(&params, "table_name")?;
            match self.catalog.table_ddl(name) {
                Some(ddl) => Ok(serde_json::json!({"table_name": name, "ddl": ddl})),
                None => Err(LakeflowError::ToolExecution {
                    tool: "get_table_ddl".into(),
                    message: format!("table '{name}' not found in catalog"),
                }),
            }
        })
    }
}

fn require_str<'a>(
    params: &'a serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| LakeflowError::ToolValidation(format!("missing required parameter '{key}'")))
}

/// The set of tools available to a validation dialogue.
pub struct ToolCatalog {
    tools: HashMap<String, Arc<dyn InspectionTool>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Catalog with the four built-in environment tools over shared state.
    pub fn with_builtins(catalog: Arc<MockCatalog>) -> Self {
        let mut tools = Self::new();
        tools.register(DropTableTool {
            catalog: catalog.clone(),
        });
        tools.register(DropIntegrationTaskTool {
            catalog: catalog.clone(),
        });
        tools.register(QueryIntegrationTasksTool {
            catalog: catalog.clone(),
        });
        tools.register(TableDdlTool { catalog });
        tools
    }

    pub fn register(&mut self, tool: impl InspectionTool) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    /// Invoke a tool, validating required parameters first.
    pub async fn invoke(
        &self,
        name: &str,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> Result<serde_json::Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| LakeflowError::ToolNotFound(name.to_string()))?;

        for param in tool.parameters() {
            if param.required && !params.contains_key(&param.name) {
                return Err(LakeflowError::ToolValidation(format!(
                    "tool '{}' requires parameter '{}'",
                    name, param.name
                )));
            }
        }

        tool.invoke(params).await
    }

    /// Tool descriptions rendered for the dialogue prompt.
    pub fn render_for_prompt(&self) -> String {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();

        let mut out = String::new();
        for name in names {
            let tool = &self.tools[name];
            let params: Vec<String> = tool
                .parameters()
                .iter()
                .map(|p| {
                    format!(
                        "{} ({}{})",
                        p.name,
                        p.data_type,
                        if p.required { ", required" } else { "" }
                    )
                })
                .collect();
            out.push_str(&format!(
                "- {}: {} | params: {}\n",
                name,
                tool.description(),
                if params.is_empty() {
                    "none".to_string()
                } else {
                    params.join(", ")
                }
            ));
        }
        out
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ToolCatalog {
        ToolCatalog::with_builtins(Arc::new(MockCatalog::with_samples()))
    }

    fn params(pairs: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::json!(v)))
            .collect()
    }

    #[tokio::test]
    async fn test_query_then_drop_task() {
        let tools = catalog();

        let listed = tools
            .invoke("query_integration_tasks", params(&[]))
            .await
            .unwrap();
        assert_eq!(listed["count"], serde_json::json!(1));

        let dropped = tools
            .invoke("drop_integration_task", params(&[("task_id", "INT-SAMPLE01-001")]))
            .await
            .unwrap();
        assert_eq!(dropped["removed"], serde_json::json!(true));

        let listed = tools
            .invoke("query_integration_tasks", params(&[]))
            .await
            .unwrap();
        assert_eq!(listed["count"], serde_json::json!(0));
    }

    #[tokio::test]
    async fn test_missing_required_param_rejected() {
        let err = catalog().invoke("drop_table", params(&[])).await.unwrap_err();
        assert!(matches!(err, LakeflowError::ToolValidation(_)));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = catalog().invoke("explode", params(&[])).await.unwrap_err();
        assert!(matches!(err, LakeflowError::ToolNotFound(name) if name == "explode"));
    }

    #[tokio::test]
    async fn test_ddl_of_missing_table_is_tool_error() {
        let err = catalog()
            .invoke("get_table_ddl", params(&[("table_name", "missing")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LakeflowError::ToolExecution { .. }));
    }

    #[test]
    fn test_prompt_rendering_lists_all_tools() {
        let rendered = catalog().render_for_prompt();
        for name in [
            "drop_table",
            "drop_integration_task",
            "query_integration_tasks",
            "get_table_ddl",
        ] {
            assert!(rendered.contains(name), "missing {name}");
        }
        assert!(rendered.contains("required"));
    }
}
