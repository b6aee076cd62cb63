//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Lifecycle controller behaviour against the in-memory control plane."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use msr_core::{
    ApiError, CloudProvider, ImmutableField, IpAccessEntry, IpAccessUpdate, ManagedServiceSpec,
    ManagedServiceState, MockControlPlane, MockOperation, PasswordUpdate, PollSettings,
    ReconcileError, ReconcileMetrics, RecordedCall, ScalingUpdate, ServiceController,
    ServiceLifecycle, ServiceRecord, ServiceStatus, ServiceUpdate, Tier,
};
use prometheus::Registry;

const SERVICE_ID: &str = "7f9c2d3e-0000-4000-8000-000000000001";

fn fast_polling() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(5),
        timeout: Some(Duration::from_secs(5)),
    }
}

fn controller(api: Arc<MockControlPlane>) -> ServiceController<Arc<MockControlPlane>> {
    msr_logging::init();
    ServiceController::new(api).with_poll_settings(fast_polling())
}

fn svc1_spec(password: &str) -> ManagedServiceSpec {
    ManagedServiceSpec {
        name: "svc1".into(),
        cloud_provider: CloudProvider::Aws,
        region: "us-east-1".into(),
        tier: Tier::Production,
        idle_scaling: true,
        ip_access: vec![IpAccessEntry::new("0.0.0.0", "Test IP")],
        min_total_memory_gb: 24,
        max_total_memory_gb: 360,
        idle_timeout_minutes: 5,
        password: Some(password.into()),
    }
}

fn running_state() -> ManagedServiceState {
    ManagedServiceState {
        id: SERVICE_ID.into(),
        name: "analytics".into(),
        cloud_provider: CloudProvider::Aws,
        region: "us-east-1".into(),
        tier: Tier::Production,
        idle_scaling: true,
        ip_access: vec![IpAccessEntry::new("1.2.3.4/32", "A")],
        min_total_memory_gb: 24,
        max_total_memory_gb: 120,
        idle_timeout_minutes: 15,
        status: ServiceStatus::new("running"),
        endpoints: Vec::new(),
    }
}

fn seeded() -> (Arc<MockControlPlane>, ServiceRecord) {
    let api = Arc::new(MockControlPlane::new().with_service(running_state()));
    let record = ServiceRecord::new(running_state(), Some("current-password".into()));
    (api, record)
}

#[tokio::test]
async fn create_polls_until_provisioned_and_returns_generated_password() {
    let api = Arc::new(MockControlPlane::new().with_provisioning_polls(2));
    let lifecycle = controller(api.clone());

    let record = lifecycle
        .create(&svc1_spec(""))
        .await
        .expect("create succeeds");

    assert!(!record.id().is_empty());
    assert!(!record.state.status.is_provisioning());
    assert_eq!(record.state.name, "svc1");
    assert_eq!(record.state.ip_access, vec![IpAccessEntry::new("0.0.0.0", "Test IP")]);
    assert!(!record.state.endpoints.is_empty());
    for endpoint in &record.state.endpoints {
        assert!(!endpoint.protocol.is_empty());
        assert!(!endpoint.host.is_empty());
        assert!(endpoint.port > 0);
    }

    let generated = api.generated_passwords();
    assert_eq!(generated.len(), 1);
    assert_eq!(record.password.as_deref(), Some(generated[0].as_str()));

    let operations: Vec<_> = api.calls().iter().map(RecordedCall::operation).collect();
    assert_eq!(
        operations,
        vec![
            MockOperation::Create,
            MockOperation::Get,
            MockOperation::Get,
            MockOperation::Get
        ]
    );
}

#[tokio::test]
async fn create_with_password_pushes_it_after_provisioning() {
    let api = Arc::new(MockControlPlane::new().with_provisioning_polls(1));
    let lifecycle = controller(api.clone());

    let record = lifecycle
        .create(&svc1_spec("s3cret-Passw0rd"))
        .await
        .expect("create succeeds");

    assert_eq!(record.password.as_deref(), Some("s3cret-Passw0rd"));
    assert_eq!(api.password(record.id()).as_deref(), Some("s3cret-Passw0rd"));
    let calls = api.calls();
    match calls.first() {
        Some(RecordedCall::Create(request)) => assert_eq!(request.name, "svc1"),
        other => panic!("expected create call first, got {other:?}"),
    }
    assert_eq!(
        calls.last(),
        Some(&RecordedCall::Password(
            record.id().to_owned(),
            PasswordUpdate::Plaintext("s3cret-Passw0rd".into())
        ))
    );
}

#[tokio::test]
async fn create_rejects_out_of_bounds_spec_without_calls() {
    let api = Arc::new(MockControlPlane::new());
    let lifecycle = controller(api.clone());
    let mut spec = svc1_spec("");
    spec.min_total_memory_gb = 30;

    let err = lifecycle.create(&spec).await.unwrap_err();
    match err {
        ReconcileError::Validation(validation) => {
            assert_eq!(validation.fields(), vec!["min_total_memory_gb"])
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn create_failure_is_reported_as_creation_failed() {
    let api = Arc::new(MockControlPlane::new());
    api.fail_on(
        MockOperation::Create,
        ApiError::Status {
            status: 400,
            message: "quota exceeded".into(),
        },
    );
    let err = controller(api).create(&svc1_spec("")).await.unwrap_err();
    assert!(matches!(err, ReconcileError::CreationFailed { ref name, .. } if name == "svc1"));
    assert!(err.to_string().contains("quota exceeded"));
}

#[tokio::test]
async fn poll_failure_leaves_service_behind() {
    let api = Arc::new(MockControlPlane::new());
    api.fail_on(MockOperation::Get, ApiError::Transport("connection reset".into()));

    let err = controller(api.clone())
        .create(&svc1_spec(""))
        .await
        .unwrap_err();

    let id = match err {
        ReconcileError::PollFailed { id, .. } => id,
        other => panic!("expected poll failure, got {other:?}"),
    };
    assert!(api.service(&id).is_some(), "created service is not cleaned up");
}

#[tokio::test]
async fn failed_password_push_after_create_is_a_remote_error() {
    let api = Arc::new(MockControlPlane::new());
    api.fail_on(
        MockOperation::Password,
        ApiError::Status {
            status: 500,
            message: "credential store unavailable".into(),
        },
    );

    let err = controller(api.clone())
        .create(&svc1_spec("s3cret-Passw0rd"))
        .await
        .unwrap_err();

    let id = match &err {
        ReconcileError::Remote {
            operation: "create",
            id,
            ..
        } => id.clone(),
        other => panic!("expected remote error from create, got {other:?}"),
    };
    assert!(err.to_string().contains("credential store unavailable"));
    assert!(api.service(&id).is_some(), "created service is not cleaned up");
    assert!(matches!(api.calls().first(), Some(RecordedCall::Create(_))));
    assert!(matches!(
        api.calls().last(),
        Some(RecordedCall::Password(called, PasswordUpdate::Plaintext(_))) if *called == id
    ));
}

#[tokio::test]
async fn access_list_only_change_issues_one_general_call() {
    let (api, record) = seeded();
    let mut desired = record.observed_spec();
    desired
        .ip_access
        .push(IpAccessEntry::new("5.6.7.8/32", "B"));

    let updated = controller(api.clone())
        .update(&desired, &record)
        .await
        .expect("update succeeds");

    assert_eq!(
        api.mutations(),
        vec![RecordedCall::Update(
            SERVICE_ID.into(),
            ServiceUpdate {
                name: None,
                ip_access_list: Some(IpAccessUpdate {
                    add: vec![IpAccessEntry::new("5.6.7.8/32", "B")],
                    remove: Vec::new(),
                }),
            }
        )]
    );
    assert_eq!(updated.state.ip_access.len(), 2);
    assert_eq!(updated.password.as_deref(), Some("current-password"));
}

#[tokio::test]
async fn idle_timeout_change_carries_other_scaling_fields() {
    let (api, record) = seeded();
    let mut desired = record.observed_spec();
    desired.idle_timeout_minutes = 30;

    let updated = controller(api.clone())
        .update(&desired, &record)
        .await
        .expect("update succeeds");

    assert_eq!(
        api.mutations(),
        vec![RecordedCall::Scaling(
            SERVICE_ID.into(),
            ScalingUpdate {
                idle_scaling: Some(true),
                min_total_memory_gb: Some(24),
                max_total_memory_gb: Some(120),
                idle_timeout_minutes: Some(30),
            }
        )]
    );
    assert_eq!(updated.state.idle_timeout_minutes, 30);
    assert_eq!(updated.state.max_total_memory_gb, 120);
}

#[tokio::test]
async fn each_immutable_field_is_rejected_without_calls() {
    for field in [
        ImmutableField::CloudProvider,
        ImmutableField::Region,
        ImmutableField::Tier,
    ] {
        let (api, record) = seeded();
        let mut desired = record.observed_spec();
        match field {
            ImmutableField::CloudProvider => desired.cloud_provider = CloudProvider::Gcp,
            ImmutableField::Region => desired.region = "eu-west-1".into(),
            ImmutableField::Tier => desired.tier = Tier::Development,
        }

        let err = controller(api.clone())
            .update(&desired, &record)
            .await
            .unwrap_err();
        assert_eq!(err.immutable_fields(), &[field]);
        assert!(api.calls().is_empty(), "{field} change issued calls");
    }
}

#[tokio::test]
async fn tier_only_update_leaves_state_unchanged() {
    let (api, record) = seeded();
    let mut desired = record.observed_spec();
    desired.tier = Tier::Development;
    desired.name = "renamed".into();

    let err = controller(api.clone())
        .update(&desired, &record)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::ImmutableFieldViolation { ref fields, .. } if fields == &[ImmutableField::Tier]
    ));
    assert_eq!(api.service(SERVICE_ID), Some(running_state()));
    assert_eq!(record.state, running_state());
}

#[tokio::test]
async fn failed_scaling_call_keeps_general_change_and_skips_credential() {
    let (api, record) = seeded();
    api.fail_on(
        MockOperation::Scaling,
        ApiError::Status {
            status: 503,
            message: "unavailable".into(),
        },
    );
    let mut desired = record.observed_spec();
    desired.name = "reporting".into();
    desired.idle_timeout_minutes = 60;
    desired.password = Some("rotated".into());

    let err = controller(api.clone())
        .update(&desired, &record)
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Remote { operation: "update", .. }));
    let operations: Vec<_> = api.calls().iter().map(RecordedCall::operation).collect();
    assert_eq!(operations, vec![MockOperation::Update, MockOperation::Scaling]);
    let remote = api.service(SERVICE_ID).expect("service exists");
    assert_eq!(remote.name, "reporting");
    assert_eq!(remote.idle_timeout_minutes, 15);
}

#[tokio::test]
async fn credential_only_update_propagates_previous_state() {
    let (api, record) = seeded();
    let mut desired = record.observed_spec();
    desired.password = Some("rotated".into());

    let updated = controller(api.clone())
        .update(&desired, &record)
        .await
        .expect("update succeeds");

    assert_eq!(updated.state, record.state);
    assert_eq!(updated.password.as_deref(), Some("rotated"));
    assert_eq!(
        api.mutations(),
        vec![RecordedCall::Password(
            SERVICE_ID.into(),
            PasswordUpdate::Plaintext("rotated".into())
        )]
    );
}

#[tokio::test]
async fn clearing_the_credential_adopts_the_generated_value() {
    let (api, record) = seeded();
    let mut desired = record.observed_spec();
    desired.password = None;

    let updated = controller(api.clone())
        .update(&desired, &record)
        .await
        .expect("update succeeds");

    let generated = api.generated_passwords();
    assert_eq!(generated.len(), 1);
    assert_eq!(updated.password.as_deref(), Some(generated[0].as_str()));
}

#[tokio::test]
async fn converged_update_issues_no_calls() {
    let (api, record) = seeded();
    let updated = controller(api.clone())
        .update(&record.observed_spec(), &record)
        .await
        .expect("no-op update");
    assert!(api.calls().is_empty());
    assert_eq!(updated.state, record.state);
    assert!(updated.last_updated >= record.last_updated);
}

#[tokio::test]
async fn read_delete_and_import() {
    let (api, record) = seeded();
    let lifecycle: Box<dyn ServiceLifecycle> = Box::new(controller(api.clone()));

    let state = lifecycle.read(SERVICE_ID).await.expect("read succeeds");
    assert_eq!(state, running_state());

    let imported = lifecycle.import(SERVICE_ID).await.expect("import succeeds");
    assert_eq!(imported.state, record.state);
    assert!(imported.password.is_none());

    let refreshed = lifecycle.refresh(&record).await.expect("refresh succeeds");
    assert_eq!(refreshed.password, record.password);

    lifecycle.delete(SERVICE_ID).await.expect("delete succeeds");
    assert!(matches!(
        lifecycle.read(SERVICE_ID).await,
        Err(ReconcileError::NotFound { operation: "read", .. })
    ));
    assert!(matches!(
        lifecycle.delete(SERVICE_ID).await,
        Err(ReconcileError::NotFound { operation: "delete", .. })
    ));
}

#[tokio::test]
async fn remote_calls_are_counted() {
    let registry = Arc::new(Registry::new());
    let metrics = Arc::new(ReconcileMetrics::new(registry).expect("metrics register"));
    let api = Arc::new(MockControlPlane::new().with_provisioning_polls(1));
    let lifecycle = controller(api.clone()).with_metrics(metrics.clone());

    let record = lifecycle.create(&svc1_spec("")).await.expect("create");
    let mut desired = record.observed_spec();
    desired.name = "svc1-renamed".into();
    lifecycle.update(&desired, &record).await.expect("update");

    assert_eq!(metrics.remote_calls("create_service", "ok"), 1);
    assert_eq!(metrics.remote_calls("get_service", "ok"), 2);
    assert_eq!(metrics.remote_calls("update_service", "ok"), 1);
    assert_eq!(metrics.poll_iterations(), 2);
}
