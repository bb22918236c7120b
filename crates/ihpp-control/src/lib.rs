//! Configuration lifecycle for running proxy instances
//!
//! Tracks which proxy configurations are live in this process, records
//! configuration snapshots in the store, and writes the live proxy set back
//! to the declarative config file.
pub mod error;
pub mod exporter;
pub mod lifecycle;
pub mod registrar;
pub mod registry;
pub mod settings;
pub mod sysconfig;

pub use error::{ControlError, ExportError};
pub use exporter::{ConfigExporter, ExportOutcome};
pub use lifecycle::ProxyLifecycle;
pub use registrar::{register_configuration, CLI_FLAGS_SOURCE};
pub use registry::{
    ActivationGuard, ActiveProxy, ActiveRegistry, InactiveGuard, ServerHandle, ServingFlag,
};
pub use settings::ProxyEntry;
pub use sysconfig::{ConfigFormat, SysConfig, SysConfigHandle};
