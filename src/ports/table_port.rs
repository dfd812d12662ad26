//! Table ingestion and output port traits.

use crate::domain::error::ToolkitError;
use crate::domain::frame::Container;

/// Produces containers with unique keys and a chronological time axis.
pub trait TableSource {
    fn load(&self, name: &str) -> Result<Container, ToolkitError>;
}

pub trait TableSink {
    fn write(&self, name: &str, container: &Container) -> Result<(), ToolkitError>;
}
