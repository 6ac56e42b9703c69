//! IO modules - side effects (network, filesystem, processes)

pub mod download;
pub mod extract;
pub mod install;
pub mod lock;
pub mod smoke;
