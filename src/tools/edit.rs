//! Content-changing vault tools

use super::{parse_input, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct ContentInput {
    path: String,
    content: String,
}

fn content_schema(content_description: &str) -> Value {
    json!({
        "type": "object",
        "required": ["path", "content"],
        "properties": {
            "path": {
                "type": "string",
                "description": "File path relative to the vault root"
            },
            "content": {
                "type": "string",
                "description": content_description
            }
        }
    })
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "vault_write_file"
    }

    fn description(&self) -> String {
        "Create a file or overwrite an existing one with the given content. Missing parent folders are created.".to_string()
    }

    fn input_schema(&self) -> Value {
        content_schema("Complete new file content")
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: ContentInput = parse_input(input)?;
        ctx.vault.write(&input.path, &input.content).await
    }
}

/// Exact-span replacement
pub struct EditFileTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditFileInput {
    path: String,
    old_text: String,
    new_text: String,
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &'static str {
        "vault_edit_file"
    }

    fn description(&self) -> String {
        "Replace an exact span of text in a file. oldText must match the current file content exactly, including whitespace; read the file first. Only the first occurrence is replaced.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path", "oldText", "newText"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the vault root"
                },
                "oldText": {
                    "type": "string",
                    "description": "Exact text to replace"
                },
                "newText": {
                    "type": "string",
                    "description": "Replacement text"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: EditFileInput = parse_input(input)?;
        ctx.vault
            .edit(&input.path, &input.old_text, &input.new_text)
            .await
    }
}

pub struct AppendToFileTool;

#[async_trait]
impl Tool for AppendToFileTool {
    fn name(&self) -> &'static str {
        "vault_append_to_file"
    }

    fn description(&self) -> String {
        "Append text to the end of an existing file, starting on a new line.".to_string()
    }

    fn input_schema(&self) -> Value {
        content_schema("Text to append")
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: ContentInput = parse_input(input)?;
        ctx.vault.append(&input.path, &input.content).await
    }
}

pub struct InsertAtLineTool;

#[derive(Debug, Deserialize)]
struct InsertAtLineInput {
    path: String,
    line: usize,
    content: String,
}

#[async_trait]
impl Tool for InsertAtLineTool {
    fn name(&self) -> &'static str {
        "vault_insert_at_line"
    }

    fn description(&self) -> String {
        "Insert text before the given 1-indexed line of a file. Use one past the last line to insert at the end.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path", "line", "content"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the vault root"
                },
                "line": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "1-indexed line to insert before"
                },
                "content": {
                    "type": "string",
                    "description": "Text to insert"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: InsertAtLineInput = parse_input(input)?;
        ctx.vault
            .insert_at_line(&input.path, input.line, &input.content)
            .await
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
    async fn test_edit_uses_camel_case_params() {
        let (_dir, ctx) = test_context();
        ctx.vault.write("a.md", "old line").await.unwrap();
        EditFileTool
            .run(
                json!({"path": "a.md", "oldText": "old", "newText": "new"}),
                ctx.clone(),
            )
            .await
            .unwrap();
        assert_eq!(ctx.vault.read("a.md").await.unwrap(), "new line");
    }

    #[tokio::test]
    async fn test_edit_snake_case_params_rejected() {
        let (_dir, ctx) = test_context();
        ctx.vault.write("a.md", "old").await.unwrap();
        let err = EditFileTool
            .run(
                json!({"path": "a.md", "old_text": "old", "new_text": "new"}),
                ctx,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_insert_rejects_negative_line() {
        let (_dir, ctx) = test_context();
        ctx.vault.write("a.md", "x").await.unwrap();
        let err = InsertAtLineTool
            .run(json!({"path": "a.md", "line": -1, "content": "y"}), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_append_then_write() {
        let (_dir, ctx) = test_context();
        WriteFileTool
            .run(json!({"path": "log.md", "content": "a"}), ctx.clone())
            .await
            .unwrap();
        AppendToFileTool
            .run(json!({"path": "log.md", "content": "b"}), ctx.clone())
            .await
            .unwrap();
        assert_eq!(ctx.vault.read("log.md").await.unwrap(), "a\nb");
    }
}
