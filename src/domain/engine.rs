//! `PanelEngine`: the entry point that ties classification, selection and
//! rolling evaluation together for one configured worker count.

use crate::domain::error::PanelError;
use crate::domain::frame::{Container, LabeledTable, Slice};
use crate::domain::layout::{classify, classify_with, ClassifyOptions, LayoutKind};
use crate::domain::rolling::{rolling, RollingOptions};
use crate::domain::selector::{select, Sel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelEngine {
    processes: usize,
    classify_options: ClassifyOptions,
}

impl Default for PanelEngine {
    fn default() -> Self {
        Self::new(1)
    }
}

impl PanelEngine {
    pub fn new(processes: usize) -> Self {
        Self {
            processes: processes.max(1),
            classify_options: ClassifyOptions::default(),
        }
    }

    pub fn with_classify_options(mut self, options: ClassifyOptions) -> Self {
        self.classify_options = options;
        self
    }

    pub fn processes(&self) -> usize {
        self.processes
    }

    pub fn classify(&self, container: &Container) -> Result<LayoutKind, PanelError> {
        if self.classify_options == ClassifyOptions::default() {
            classify(container)
        } else {
            classify_with(container, self.classify_options)
        }
    }

    /// Classify `container`, then select from it.
    pub fn select(
        &self,
        container: &Container,
        time: &Sel,
        asset: &Sel,
        indicator: &Sel,
    ) -> Result<Slice, PanelError> {
        let layout = self.classify(container)?;
        select(container, layout, time, asset, indicator)
    }

    /// Rolling evaluation using this engine's worker count.
    pub fn rolling<F>(
        &self,
        container: &Container,
        window: usize,
        offset: usize,
        interval: usize,
        func: F,
    ) -> Result<LabeledTable, PanelError>
    where
        F: Fn(&Container) -> Result<Slice, PanelError> + Send + Sync,
    {
        let options = RollingOptions::new(window)
            .with_offset(offset)
            .with_interval(interval)
            .with_processes(self.processes);
        rolling(container, &options, func)
    }
}
