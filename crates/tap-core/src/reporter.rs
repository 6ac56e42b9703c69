//! Reporter trait for dependency injection
//!
//! This trait allows the install flow to report progress and status without
//! being coupled to a specific terminal implementation.

use crate::flow::InstallStage;
use crate::types::Version;

pub trait Reporter: Send + Sync {
    /// Indicates a new section or phase has started (e.g. "Installing netfetch").
    fn section(&self, title: &str);

    /// The install operation for `version` entered `stage`.
    fn stage(&self, version: &Version, stage: InstallStage);

    /// Updates the progress of a download.
    fn downloading(&self, version: &Version, current: u64, total: Option<u64>);

    /// Marks the operation as successfully completed.
    fn done(&self, version: &Version, detail: &str);

    /// Marks the operation as failed with a specific reason.
    fn failed(&self, version: &Version, reason: &str);

    /// Log an informational message.
    fn info(&self, msg: &str);

    /// Log a warning message.
    fn warning(&self, msg: &str);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn section(&self, title: &str) {
        (**self).section(title);
    }
    fn stage(&self, version: &Version, stage: InstallStage) {
        (**self).stage(version, stage);
    }
    fn downloading(&self, version: &Version, current: u64, total: Option<u64>) {
        (**self).downloading(version, current, total);
    }
    fn done(&self, version: &Version, detail: &str) {
        (**self).done(version, detail);
    }
    fn failed(&self, version: &Version, reason: &str) {
        (**self).failed(version, reason);
    }
    fn info(&self, msg: &str) {
        (**self).info(msg);
    }
    fn warning(&self, msg: &str) {
        (**self).warning(msg);
    }
}

/// A no-op reporter for silent operations (e.g., verification, testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn section(&self, _: &str) {}
    fn stage(&self, _: &Version, _: InstallStage) {}
    fn downloading(&self, _: &Version, _: u64, _: Option<u64>) {}
    fn done(&self, _: &Version, _: &str) {}
    fn failed(&self, _: &Version, _: &str) {}
    fn info(&self, _: &str) {}
    fn warning(&self, _: &str) {}
}
