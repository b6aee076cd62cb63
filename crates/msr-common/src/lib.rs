//! ---
//! msr_section: "01-shared-foundation"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Shared configuration and logging primitives."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
//! Shared primitives for the managed service reconciler workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed by the control CLI and the integration suites.

pub mod config;
pub mod logging;

pub use config::{
    ApiConfig, AppConfig, LimitsConfig, LoadedAppConfig, LoggingConfig, PollerConfig,
    StateConfig,
};
pub use logging::{init_tracing, LogFormat};
