//! Tool definitions and executor trait for the completion service.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;

/// A tool definition advertised to the completion service.
#[derive(Clone, Debug, Serialize)]
pub struct ToolDescriptor {
    /// The name of the tool.
    pub name: &'static str,
    /// A description of what the tool does.
    pub description: &'static str,
    /// JSON schema for the tool's input parameters.
    pub parameters: Value,
}

/// Trait for executing tools. Implement this to provide tool capabilities.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// The tool definitions advertised to the completion service.
    fn descriptors(&self) -> Vec<ToolDescriptor>;

    /// The tool names `execute` actually dispatches on.
    ///
    /// Checked against `descriptors` at startup so the advertised set and
    /// the dispatch table cannot silently diverge.
    fn handler_names(&self) -> Vec<&'static str>;

    /// Check if this executor handles a tool with the given name.
    fn has_tool(&self, name: &str) -> bool {
        self.handler_names().contains(&name)
    }

    /// Execute a tool by name with the given input arguments.
    /// Returns the result text to be fed back to the completion service.
    async fn execute(&self, name: &str, input: &Value) -> Result<String, String>;
}

/// Error type for tool registry validation.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A tool is advertised to the completion service but has no handler.
    #[error("tool '{0}' is advertised but has no handler")]
    MissingHandler(String),
    /// A handler exists for a tool that is never advertised.
    #[error("handler '{0}' is not advertised to the completion service")]
    UnadvertisedHandler(String),
}

/// Verify that an executor's advertised tool set and its dispatch table
/// match exactly. Called once at startup; divergence is fatal.
pub fn verify_registry(executor: &dyn ToolExecutor) -> Result<(), RegistryError> {
    let advertised: BTreeSet<&str> = executor.descriptors().iter().map(|t| t.name).collect();
    let handlers: BTreeSet<&str> = executor.handler_names().into_iter().collect();

    if let Some(name) = advertised.difference(&handlers).next() {
        return Err(RegistryError::MissingHandler((*name).to_owned()));
    }
    if let Some(name) = handlers.difference(&advertised).next() {
        return Err(RegistryError::UnadvertisedHandler((*name).to_owned()));
    }
    Ok(())
}
