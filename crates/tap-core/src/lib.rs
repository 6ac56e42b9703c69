pub mod catalog;
pub mod config;
pub mod flow;
pub mod formula;
pub mod io;
pub mod paths;
pub mod reporter;
pub mod resolver;
pub mod types;

pub use catalog::{Catalog, CatalogError};
pub use config::Config;
pub use flow::{InstallError, InstallReport, InstallRequest, InstallStage, Installer};
pub use paths::*;
pub use reporter::{NullReporter, Reporter};
pub use resolver::{ResolveError, resolve};

pub use types::*;

/// User Agent string for core operations
pub const USER_AGENT: &str = concat!("tap-core/", env!("CARGO_PKG_VERSION"));
