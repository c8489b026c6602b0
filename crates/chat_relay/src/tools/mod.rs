//! Handlers that execute directives found in assistant responses

pub mod approval_flow;
pub mod quote;
pub mod storage;

pub use approval_flow::CreateApprovalFlowTool;
pub use quote::GenerateQuoteTool;
pub use storage::{DocumentStore, LocalDocumentStore};

use async_trait::async_trait;
use indexmap::IndexMap;
use llm::LLMProvider;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Human readable progress text shown while a handler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub status: &'static str,
    pub message: &'static str,
}

/// Status text for directives without a registered handler
pub const FALLBACK_STATUS: (&str, &str) = ("Running Tool", "Working on your request...");

/// Result of a successful handler run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub file_path: Option<String>,
    pub data: Map<String, Value>,
}

impl ToolOutput {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: Some(file_path.into()),
            data: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unrecognized directive: {0}")]
    UnknownTool(String),
    #[error("{0}")]
    Execution(#[from] anyhow::Error),
}

#[async_trait]
pub trait DirectiveHandler: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn execute(&self, parameters: &IndexMap<String, String>) -> Result<ToolOutput, ToolError>;
}

/// Handlers by directive name
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn DirectiveHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The handlers this service ships with
    pub fn with_default_handlers(
        provider: Arc<dyn LLMProvider>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GenerateQuoteTool::new(provider, store)));
        registry.register(Arc::new(CreateApprovalFlowTool::default()));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn DirectiveHandler>) {
        self.handlers.insert(handler.spec().name.to_string(), handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn DirectiveHandler>> {
        self.handlers.get(name)
    }

    /// Status and message for the `detected` notification
    pub fn status_text(&self, name: &str) -> (&'static str, &'static str) {
        self.get(name)
            .map(|handler| {
                let spec = handler.spec();
                (spec.status, spec.message)
            })
            .unwrap_or(FALLBACK_STATUS)
    }

    pub async fn execute(
        &self,
        name: &str,
        parameters: &IndexMap<String, String>,
    ) -> Result<ToolOutput, ToolError> {
        let handler = self
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        handler.execute(parameters).await
    }
}

/// Parameter value or a default for absent parameters
pub(crate) fn param_or<'a>(
    parameters: &'a IndexMap<String, String>,
    key: &str,
    default: &'a str,
) -> &'a str {
    parameters.get(key).map(String::as_str).unwrap_or(default)
}
