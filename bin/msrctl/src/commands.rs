//! ---
//! msr_section: "05-cli"
//! msr_subsection: "binary"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Lifecycle subcommands driving the reconciliation engine."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use msr_common::config::AppConfig;
use msr_core::{
    ManagedServiceSpec, ServiceController, ServiceLifecycle, ServiceRecord, UpdatePlan,
    ValidationLimits,
};
use msr_net::HttpServiceApi;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::store::RecordStore;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a service from a spec file and wait until it is provisioned.
    Create(SpecArgs),
    /// Refresh the stored record of a service from the control plane.
    Read(NameArgs),
    /// Reconcile an existing service towards a spec file.
    Update(ReconcileArgs),
    /// Delete a service and its stored record.
    Delete(NameArgs),
    /// Adopt an existing service by id.
    Import(ImportArgs),
    /// Print the calls an update would issue, without contacting the control plane.
    Plan(ReconcileArgs),
}

#[derive(Debug, Args)]
pub struct SpecArgs {
    /// Desired service spec (TOML).
    #[arg(long, short = 'f', value_name = "FILE")]
    pub spec: PathBuf,

    /// Read the default user password from this environment variable.
    #[arg(long = "password-env", value_name = "VAR")]
    pub password_env: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub spec: SpecArgs,

    /// Stored record to reconcile. Defaults to the spec name; required when renaming.
    #[arg(long, value_name = "NAME")]
    pub record: Option<String>,
}

impl ReconcileArgs {
    fn record_name<'a>(&'a self, spec: &'a ManagedServiceSpec) -> &'a str {
        self.record.as_deref().unwrap_or(&spec.name)
    }

    /// Load the stored record this reconcile targets, returning its key.
    fn load_record(
        &self,
        store: &RecordStore,
        spec: &ManagedServiceSpec,
    ) -> Result<(String, ServiceRecord)> {
        let key = self.record_name(spec).to_owned();
        if self.record.is_none() && !store.exists(&key)? {
            bail!(
                "no record for service {key} in {}; create or import it first, \
                 or pass --record <NAME> when the spec renames a stored service",
                store.directory().display()
            );
        }
        let record = store.load(&key)?;
        Ok((key, record))
    }
}

#[derive(Debug, Args)]
pub struct NameArgs {
    /// Service name the record is stored under.
    pub name: String,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Remote service id.
    pub id: String,

    /// Store the record under this name instead of the remote service name.
    #[arg(long)]
    pub name: Option<String>,
}

/// Execute the supplied command.
pub fn run(command: Command, config: &AppConfig) -> Result<()> {
    let store = RecordStore::new(config.state.directory.clone());
    if let Command::Plan(args) = &command {
        return plan(args, config, &store);
    }

    let runtime = Runtime::new()?;
    runtime.block_on(async {
        let lifecycle = connect(config)?;
        let lifecycle = lifecycle.as_ref();
        match command {
            Command::Create(args) => create(lifecycle, &store, &args).await,
            Command::Read(args) => read(lifecycle, &store, &args.name).await,
            Command::Update(args) => update(lifecycle, &store, &args).await,
            Command::Delete(args) => delete(lifecycle, &store, &args.name).await,
            Command::Import(args) => import(lifecycle, &store, &args).await,
            Command::Plan(args) => plan(&args, config, &store),
        }
    })
}

/// Build the lifecycle controller. Ctrl-C cancels a pending provisioning wait.
fn connect(config: &AppConfig) -> Result<Box<dyn ServiceLifecycle>> {
    let api = HttpServiceApi::from_config(&config.api)?;
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; abandoning provisioning wait");
            let _ = cancel_tx.send(true);
        }
    });
    Ok(Box::new(
        ServiceController::from_config(api, config).with_cancellation(cancel_rx),
    ))
}

fn load_spec(args: &SpecArgs) -> Result<ManagedServiceSpec> {
    let contents = fs::read_to_string(&args.spec)
        .with_context(|| format!("unable to read spec file {}", args.spec.display()))?;
    let mut spec: ManagedServiceSpec = toml::from_str(&contents)
        .with_context(|| format!("failed to parse spec file {}", args.spec.display()))?;
    if let Some(var) = &args.password_env {
        let password = std::env::var(var)
            .with_context(|| format!("environment variable {var} is not set"))?;
        spec.password = Some(password);
    }
    Ok(spec)
}

/// A spec without a `password` key keeps the recorded credential; an empty one regenerates it.
fn desired_for(mut spec: ManagedServiceSpec, record: &ServiceRecord) -> ManagedServiceSpec {
    if spec.password.is_none() {
        spec.password = record.password.clone();
    }
    spec
}

fn print_record(store: &RecordStore, name: &str, record: &ServiceRecord) -> Result<()> {
    let path = store.save(name, record)?;
    println!("{}", serde_json::to_string_pretty(&record.state)?);
    info!(service_id = record.id(), record = %path.display(), "record stored");
    Ok(())
}

async fn create(
    lifecycle: &dyn ServiceLifecycle,
    store: &RecordStore,
    args: &SpecArgs,
) -> Result<()> {
    let spec = load_spec(args)?;
    if store.exists(&spec.name)? {
        bail!(
            "a record for service {} already exists in {}; use update instead",
            spec.name,
            store.directory().display()
        );
    }
    let record = lifecycle.create(&spec).await?;
    print_record(store, &spec.name, &record)
}

async fn read(lifecycle: &dyn ServiceLifecycle, store: &RecordStore, name: &str) -> Result<()> {
    let record = store.load(name)?;
    let refreshed = lifecycle.refresh(&record).await?;
    print_record(store, name, &refreshed)
}

async fn update(
    lifecycle: &dyn ServiceLifecycle,
    store: &RecordStore,
    args: &ReconcileArgs,
) -> Result<()> {
    let spec = load_spec(&args.spec)?;
    let (key, record) = args.load_record(store, &spec)?;
    let desired = desired_for(spec, &record);
    let updated = lifecycle.update(&desired, &record).await?;
    print_record(store, &key, &updated)
}

async fn delete(lifecycle: &dyn ServiceLifecycle, store: &RecordStore, name: &str) -> Result<()> {
    let record = store.load(name)?;
    lifecycle.delete(record.id()).await?;
    store.remove(name)?;
    println!("deleted service {name} ({})", record.id());
    Ok(())
}

async fn import(
    lifecycle: &dyn ServiceLifecycle,
    store: &RecordStore,
    args: &ImportArgs,
) -> Result<()> {
    let record = lifecycle.import(&args.id).await?;
    let name = args.name.clone().unwrap_or_else(|| record.state.name.clone());
    if store.exists(&name)? {
        bail!("a record for service {name} already exists; refusing to overwrite it");
    }
    print_record(store, &name, &record)
}

fn plan(args: &ReconcileArgs, config: &AppConfig, store: &RecordStore) -> Result<()> {
    let spec = load_spec(&args.spec)?;
    let (_, record) = args.load_record(store, &spec)?;
    let desired = desired_for(spec, &record);
    desired.validate(&ValidationLimits::from_config(&config.limits))?;
    let plan = UpdatePlan::build(&desired, &record)?;
    info!(service_id = record.id(), calls = plan.call_count(), "plan: {plan}");
    println!("{}", serde_json::to_string_pretty(&plan.summary())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use msr_core::{ManagedServiceState, ServiceStatus};

    const SPEC: &str = r#"
name = "svc1"
cloud_provider = "aws"
region = "us-east-1"
tier = "production"
idle_scaling = true
min_total_memory_gb = 24
max_total_memory_gb = 360
idle_timeout_minutes = 5

[[ip_access]]
source = "0.0.0.0"
description = "Test IP"
"#;

    #[test]
    fn spec_file_parses_with_access_list_tables() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("svc1.toml");
        fs::write(&path, SPEC).expect("spec written");

        let spec = load_spec(&SpecArgs {
            spec: path,
            password_env: None,
        })
        .expect("spec loads");
        assert_eq!(spec.name, "svc1");
        assert_eq!(spec.ip_access.len(), 1);
        assert!(spec.password.is_none());
    }

    #[test]
    fn missing_password_variable_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("svc1.toml");
        fs::write(&path, SPEC).expect("spec written");

        let err = load_spec(&SpecArgs {
            spec: path,
            password_env: Some("MSRCTL_TEST_UNSET_PASSWORD_VAR".into()),
        })
        .unwrap_err();
        assert!(err.to_string().contains("MSRCTL_TEST_UNSET_PASSWORD_VAR"));
    }

    #[test]
    fn renamed_spec_targets_the_named_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("svc2.toml");
        fs::write(&path, SPEC.replace("\"svc1\"", "\"svc2\"")).expect("spec written");
        let store = RecordStore::new(dir.path().join("state"));
        let spec = load_spec(&SpecArgs {
            spec: path.clone(),
            password_env: None,
        })
        .expect("spec loads");
        let state = ManagedServiceState {
            id: "svc-1".into(),
            name: "svc1".into(),
            cloud_provider: spec.cloud_provider,
            region: spec.region.clone(),
            tier: spec.tier,
            idle_scaling: spec.idle_scaling,
            ip_access: spec.ip_access.clone(),
            min_total_memory_gb: spec.min_total_memory_gb,
            max_total_memory_gb: spec.max_total_memory_gb,
            idle_timeout_minutes: spec.idle_timeout_minutes,
            status: ServiceStatus::new("running"),
            endpoints: Vec::new(),
        };
        let record = ServiceRecord::new(state, None);
        store.save("svc1", &record).expect("record saved");

        let args = ReconcileArgs {
            spec: SpecArgs {
                spec: path.clone(),
                password_env: None,
            },
            record: Some("svc1".into()),
        };
        let (key, loaded) = args.load_record(&store, &spec).expect("record found");
        assert_eq!(key, "svc1");
        assert_eq!(loaded.id(), "svc-1");

        let args = ReconcileArgs {
            spec: SpecArgs {
                spec: path,
                password_env: None,
            },
            record: None,
        };
        let err = args.load_record(&store, &spec).unwrap_err();
        assert!(err.to_string().contains("--record"));
    }
}
