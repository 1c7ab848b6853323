//! Error handling for the script node
//!
//! This module defines the error taxonomy shared by the loader, the script
//! instances and the node, plus a Result alias used throughout the crate.
//!
//! Reload failures (`Validation`, `Compile`, `Instantiation`) are always
//! returned synchronously to the caller of `load_script`/`set_state` and
//! leave the previously active script running.

use thiserror::Error;

/// Main error type for script node operations
#[derive(Error, Debug)]
pub enum ScriptError {
    /// Static contract check failed before anything was evaluated
    #[error("Validation error: {0}")]
    Validation(String),

    /// The script raised while being evaluated
    #[error("Compile error: {0}")]
    Compile(String),

    /// The script ran but did not return a usable DSP object
    #[error("Instantiation error: {0}")]
    Instantiation(String),

    /// A failure inside `process` on the render thread
    #[error("Render fault: {0}")]
    Render(String),

    /// A script callback other than `process` raised
    #[error("Script error: {0}")]
    Script(String),

    /// Persisted node state could not be decoded
    #[error("State error: {0}")]
    State(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// The node has been torn down
    #[error("Node has been released")]
    NodeReleased,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ScriptError>,
    },
}

impl ScriptError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ScriptError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a script error from a Rhai error
    pub fn from_rhai_error(err: Box<rhai::EvalAltResult>) -> Self {
        ScriptError::Script(err.to_string())
    }

    /// Whether this error rejected a reload (the active script is untouched).
    pub fn is_reload_failure(&self) -> bool {
        match self {
            ScriptError::Validation(_)
            | ScriptError::Compile(_)
            | ScriptError::Instantiation(_) => true,
            ScriptError::WithContext { source, .. } => source.is_reload_failure(),
            _ => false,
        }
    }
}

/// Result type alias for script node operations
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, Box<rhai::EvalAltResult>> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ScriptError::from_rhai_error(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ScriptError::from_rhai_error(e).with_context(f()))
    }
}
