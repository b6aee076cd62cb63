//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Reconciliation error taxonomy."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::api::ApiError;
use crate::model::ValidationError;

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Attribute the control plane cannot change on an existing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImmutableField {
    CloudProvider,
    Region,
    Tier,
}

impl ImmutableField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImmutableField::CloudProvider => "cloud_provider",
            ImmutableField::Region => "region",
            ImmutableField::Tier => "tier",
        }
    }
}

impl fmt::Display for ImmutableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("service {id}: cannot change immutable field(s) {}", join_fields(.fields))]
    ImmutableFieldViolation {
        id: String,
        fields: Vec<ImmutableField>,
    },
    #[error("create: could not create service {name}: {source}")]
    CreationFailed {
        name: String,
        #[source]
        source: ApiError,
    },
    #[error("create: could not retrieve state of service {id} after creation: {source}")]
    PollFailed {
        id: String,
        #[source]
        source: ApiError,
    },
    #[error("create: service {id} still provisioning after {}s", .waited.as_secs())]
    PollTimeout { id: String, waited: Duration },
    #[error("create: wait for service {id} was cancelled")]
    Cancelled { id: String },
    #[error("{operation}: service {id} not found")]
    NotFound { operation: &'static str, id: String },
    #[error("{operation}: service {id}: {source}")]
    Remote {
        operation: &'static str,
        id: String,
        #[source]
        source: ApiError,
    },
}

impl ReconcileError {
    /// Map a collaborator failure, keeping `NotFound` distinct.
    pub fn remote(operation: &'static str, id: impl Into<String>, source: ApiError) -> Self {
        let id = id.into();
        match source {
            ApiError::NotFound => ReconcileError::NotFound { operation, id },
            source => ReconcileError::Remote {
                operation,
                id,
                source,
            },
        }
    }

    /// Fields named by an immutability violation, empty for other errors.
    pub fn immutable_fields(&self) -> &[ImmutableField] {
        match self {
            ReconcileError::ImmutableFieldViolation { fields, .. } => fields,
            _ => &[],
        }
    }
}

fn join_fields(fields: &[ImmutableField]) -> String {
    fields
        .iter()
        .map(ImmutableField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_kept_distinct() {
        let err = ReconcileError::remote("read", "svc-1", ApiError::NotFound);
        assert!(matches!(err, ReconcileError::NotFound { operation: "read", .. }));

        let err = ReconcileError::remote("delete", "svc-1", ApiError::Transport("reset".into()));
        assert!(matches!(err, ReconcileError::Remote { operation: "delete", .. }));
        assert_eq!(err.to_string(), "delete: service svc-1: transport error: reset");
    }

    #[test]
    fn immutable_violation_lists_every_field() {
        let err = ReconcileError::ImmutableFieldViolation {
            id: "svc-1".into(),
            fields: vec![ImmutableField::Region, ImmutableField::Tier],
        };
        assert_eq!(
            err.to_string(),
            "service svc-1: cannot change immutable field(s) region, tier"
        );
        assert_eq!(err.immutable_fields().len(), 2);
    }
}
