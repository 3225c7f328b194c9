//! Read-only vault tools

use super::{parse_input, Tool, ToolContext, ToolError, DEFAULT_SEARCH_LIMIT};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

pub struct ListFilesTool;

#[derive(Debug, Deserialize)]
struct ListFilesInput {
    #[serde(default = "root_path")]
    path: String,
    #[serde(default)]
    recursive: bool,
}

fn root_path() -> String {
    "/".to_string()
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &'static str {
        "vault_list_files"
    }

    fn description(&self) -> String {
        "List files and folders under a vault path. Folders end with '/', files show their size. Use recursive to include nested entries.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Folder path relative to the vault root; '/' for the root"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Include entries in nested folders"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: ListFilesInput = parse_input(input)?;
        ctx.vault.list(&input.path, input.recursive).await
    }
}

pub struct ReadFileTool;

#[derive(Debug, Deserialize)]
struct PathInput {
    path: String,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "vault_read_file"
    }

    fn description(&self) -> String {
        "Read the full content of a file in the vault. Always read a file before editing it."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the vault root"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: PathInput = parse_input(input)?;
        ctx.vault.read(&input.path).await
    }
}

pub struct SearchTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchInput {
    query: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    max_results: Option<usize>,
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &'static str {
        "vault_search"
    }

    fn description(&self) -> String {
        format!(
            "Search file names and contents for a case-insensitive substring. Returns 'path:line: text' per match, at most maxResults (default {DEFAULT_SEARCH_LIMIT})."
        )
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Text to look for"
                },
                "path": {
                    "type": "string",
                    "description": "Optional folder to limit the search to"
                },
                "maxResults": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of matches to return"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: SearchInput = parse_input(input)?;
        let limit = input.max_results.unwrap_or(DEFAULT_SEARCH_LIMIT);
        ctx.vault
            .search(&input.query, input.path.as_deref(), limit, ctx.cancel.clone())
            .await
    }
}

pub struct GetActiveFileTool;

#[async_trait]
impl Tool for GetActiveFileTool {
    fn name(&self) -> &'static str {
        "vault_get_active_file"
    }

    fn description(&self) -> String {
        "Get the path and content of the file the user currently has open.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn run(&self, _input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let (path, content) = ctx.vault.read_active().await?;
        Ok(format!("Active file: {path}\n\n{content}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Vault;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    fn test_context() -> (TempDir, ToolContext) {
        let dir = TempDir::new().unwrap();
        let vault = Arc::new(Vault::open(dir.path()).unwrap());
        (dir, ToolContext::new(CancellationToken::new(), vault))
    }

    #[tokio::test]
    async fn test_list_defaults_to_root() {
        let (_dir, ctx) = test_context();
        ctx.vault.write("readme.md", "hi").await.unwrap();
        let out = ListFilesTool.run(json!({}), ctx).await.unwrap();
        assert_eq!(out, "readme.md (2 B)");
    }

    #[tokio::test]
    async fn test_read_requires_path() {
        let (_dir, ctx) = test_context();
        let err = ReadFileTool.run(json!({}), ctx).await.unwrap_err();
        assert!(err.to_string().contains("path"), "{err}");
    }

    #[tokio::test]
    async fn test_search_accepts_camel_case_cap() {
        let (_dir, ctx) = test_context();
        ctx.vault.write("a.md", "x\nx\nx").await.unwrap();
        let out = SearchTool
            .run(json!({"query": "X", "maxResults": 1}), ctx)
            .await
            .unwrap();
        assert_eq!(out, "a.md:1: x\n(results limited to 1)");
    }

    #[tokio::test]
    async fn test_active_file_output() {
        let (_dir, ctx) = test_context();
        ctx.vault.write("today.md", "plan").await.unwrap();
        ctx.vault.set_active_file(Some("today.md".into())).await;
        let out = GetActiveFileTool.run(json!({}), ctx).await.unwrap();
        assert_eq!(out, "Active file: today.md\n\nplan");
    }
}
