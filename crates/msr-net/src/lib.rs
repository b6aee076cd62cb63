//! ---
//! msr_section: "04-control-plane-client"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "HTTP binding of the control plane contract."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
//! HTTP client implementing [`msr_core::ServiceApi`] against the control plane
//! REST API.

pub mod client;
pub mod wire;

pub use client::HttpServiceApi;
