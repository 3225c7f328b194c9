//! Vault tools that move or create entries

use super::{parse_input, Tool, ToolContext, ToolError, TRASH_DIR};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct PathInput {
    path: String,
}

fn path_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "required": ["path"],
        "properties": {
            "path": {
                "type": "string",
                "description": description
            }
        }
    })
}

pub struct DeleteFileTool;

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &'static str {
        "vault_delete_file"
    }

    fn description(&self) -> String {
        format!("Move a file or folder to the vault trash ({TRASH_DIR}/). It can be restored by the user.")
    }

    fn input_schema(&self) -> Value {
        path_schema("Path of the file or folder to delete")
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: PathInput = parse_input(input)?;
        ctx.vault.delete(&input.path).await
    }
}

pub struct RenameFileTool;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameInput {
    path: String,
    new_path: String,
}

#[async_trait]
impl Tool for RenameFileTool {
    fn name(&self) -> &'static str {
        "vault_rename_file"
    }

    fn description(&self) -> String {
        "Rename or move a file or folder. Fails if the destination already exists.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["path", "newPath"],
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Current path relative to the vault root"
                },
                "newPath": {
                    "type": "string",
                    "description": "New path relative to the vault root"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: RenameInput = parse_input(input)?;
        ctx.vault.rename(&input.path, &input.new_path).await
    }
}

pub struct CreateFolderTool;

#[async_trait]
impl Tool for CreateFolderTool {
    fn name(&self) -> &'static str {
        "vault_create_folder"
    }

    fn description(&self) -> String {
        "Create a folder, including any missing parents.".to_string()
    }

    fn input_schema(&self) -> Value {
        path_schema("Folder path relative to the vault root")
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError> {
        let input: PathInput = parse_input(input)?;
        ctx.vault.create_folder(&input.path).await
    }
}
