//! Error taxonomy for the panel engine and the surrounding toolkit.

/// Errors raised by classification, selection, rolling and portfolio accounting.
///
/// Every variant is raised where the problem is detected and carries a
/// description of the offending key or shape. Nothing in the engine retries
/// or suppresses these.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PanelError {
    #[error("shape error: {reason}")]
    Shape { reason: String },

    #[error("dimension error: {reason}")]
    Dimension { reason: String },

    #[error("key {key} not found on {axis} axis")]
    KeyNotFound { key: String, axis: String },

    #[error("window {key} returned an unusable result: {reason}")]
    ResultShape { key: String, reason: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("computation failed: {reason}")]
    Compute { reason: String },
}

impl PanelError {
    pub fn shape(reason: impl Into<String>) -> Self {
        PanelError::Shape {
            reason: reason.into(),
        }
    }

    pub fn dimension(reason: impl Into<String>) -> Self {
        PanelError::Dimension {
            reason: reason.into(),
        }
    }

    pub fn key_not_found(key: impl ToString, axis: &str) -> Self {
        PanelError::KeyNotFound {
            key: key.to_string(),
            axis: axis.to_string(),
        }
    }
}

/// Top-level error type for adapters and the command line.
#[derive(Debug, thiserror::Error)]
pub enum ToolkitError {
    #[error(transparent)]
    Panel(#[from] PanelError),

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("failed to ingest {path}: {reason}")]
    Ingest { path: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ToolkitError> for std::process::ExitCode {
    fn from(err: &ToolkitError) -> Self {
        let code: u8 = match err {
            ToolkitError::Io(_) => 1,
            ToolkitError::ConfigParse { .. } | ToolkitError::ConfigInvalid { .. } => 2,
            ToolkitError::Ingest { .. } => 3,
            ToolkitError::Panel(_) => 4,
        };
        std::process::ExitCode::from(code)
    }
}
