//! Vault tools exposed to the model
//!
//! Tools are stateless singletons; the vault and cancellation signal arrive
//! per call through [`ToolContext`]. The registry validates at construction
//! that every declared tool name has exactly one handler.

mod browse;
mod edit;
mod organize;
mod vault;

pub use browse::{GetActiveFileTool, ListFilesTool, ReadFileTool, SearchTool};
pub use edit::{AppendToFileTool, EditFileTool, InsertAtLineTool, WriteFileTool};
pub use organize::{CreateFolderTool, DeleteFileTool, RenameFileTool};
pub use vault::{format_size, Vault, DEFAULT_SEARCH_LIMIT, TRASH_DIR};

use crate::llm::ToolDefinition;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Names of the vault operations, in advertised order
pub const VAULT_TOOL_NAMES: [&str; 11] = [
    "vault_list_files",
    "vault_read_file",
    "vault_write_file",
    "vault_edit_file",
    "vault_search",
    "vault_delete_file",
    "vault_rename_file",
    "vault_create_folder",
    "vault_get_active_file",
    "vault_append_to_file",
    "vault_insert_at_line",
];

/// Failure of a single tool dispatch
///
/// Always recoverable: the engine folds it into history as `Error: ...`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Cancelled")]
    Cancelled,
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Map an I/O error on `path` to a tool error
    pub fn io(path: &str, err: &std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Failed(format!("{path}: {err}"))
        }
    }
}

/// Mismatch between declared tool names and registered handlers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Tool '{0}' has more than one handler")]
    DuplicateHandler(String),
    #[error("Declared tool '{0}' has no handler")]
    MissingHandler(String),
    #[error("Handler '{0}' is not a declared tool")]
    UndeclaredHandler(String),
}

/// Per-call context for tools
#[derive(Clone)]
pub struct ToolContext {
    /// Cancellation signal for long-running operations
    pub cancel: CancellationToken,
    pub vault: Arc<Vault>,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken, vault: Arc<Vault>) -> Self {
        Self { cancel, vault }
    }
}

/// Trait for tools that can be executed by the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &'static str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool, returning the text shown to the model
    async fn run(&self, input: Value, ctx: ToolContext) -> Result<String, ToolError>;
}

/// Deserialize tool input into its typed form
pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolError> {
    serde_json::from_value(input).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Dispatch surface the engine calls
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool by name with cancellation support
    async fn execute(
        &self,
        name: &str,
        args: Map<String, Value>,
        cancel: CancellationToken,
    ) -> Result<String, ToolError>;

    /// Get tool definitions for the model
    fn definitions(&self) -> Vec<ToolDefinition>;
}

#[async_trait]
impl<T: ToolExecutor + ?Sized> ToolExecutor for Arc<T> {
    async fn execute(
        &self,
        name: &str,
        args: Map<String, Value>,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        (**self).execute(name, args, cancel).await
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        (**self).definitions()
    }
}

/// Validated name-to-handler table bound to one vault
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<&'static str, usize>,
    vault: Arc<Vault>,
}

impl ToolRegistry {
    /// The standard vault tool set
    pub fn vault(vault: Arc<Vault>) -> Result<Self, RegistryError> {
        let tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ListFilesTool),
            Arc::new(ReadFileTool),
            Arc::new(WriteFileTool),
            Arc::new(EditFileTool),
            Arc::new(SearchTool),
            Arc::new(DeleteFileTool),
            Arc::new(RenameFileTool),
            Arc::new(CreateFolderTool),
            Arc::new(GetActiveFileTool),
            Arc::new(AppendToFileTool),
            Arc::new(InsertAtLineTool),
        ];
        Self::new(&VAULT_TOOL_NAMES, tools, vault)
    }

    /// Build a registry, failing if `declared` and the handlers disagree
    pub fn new(
        declared: &[&str],
        tools: Vec<Arc<dyn Tool>>,
        vault: Arc<Vault>,
    ) -> Result<Self, RegistryError> {
        let mut by_name = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            let name = tool.name();
            if !declared.contains(&name) {
                return Err(RegistryError::UndeclaredHandler(name.to_string()));
            }
            if by_name.insert(name, i).is_some() {
                return Err(RegistryError::DuplicateHandler(name.to_string()));
            }
        }
        if let Some(missing) = declared.iter().find(|n| !by_name.contains_key(**n)) {
            return Err(RegistryError::MissingHandler((*missing).to_string()));
        }

        // Advertise in declared order
        let mut ordered = Vec::with_capacity(tools.len());
        let mut index = HashMap::with_capacity(tools.len());
        for name in declared {
            if let Some(&i) = by_name.get(name) {
                index.insert(tools[i].name(), ordered.len());
                ordered.push(Arc::clone(&tools[i]));
            }
        }

        Ok(Self {
            tools: ordered,
            by_name: index,
            vault,
        })
    }

    pub fn vault_handle(&self) -> &Arc<Vault> {
        &self.vault
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(
        &self,
        name: &str,
        args: Map<String, Value>,
        cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let tool = self
            .by_name
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let start = std::time::Instant::now();
        tracing::info!(tool = %name, "Executing tool");
        let ctx = ToolContext::new(cancel, Arc::clone(&self.vault));
        let result = tool.run(Value::Object(args), ctx).await;
        let duration_ms = start.elapsed().as_millis();
        match &result {
            Ok(output) => tracing::info!(
                tool = %name,
                duration_ms = %duration_ms,
                output_len = output.len(),
                "Tool completed"
            ),
            Err(e) => tracing::warn!(
                tool = %name,
                duration_ms = %duration_ms,
                error = %e,
                "Tool failed"
            ),
        }
        result
    }

    fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }
}
