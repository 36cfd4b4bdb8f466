use crate::dispatch::{shutdown_commands, startup_commands, RemoteCommandDispatcher};
use crate::probe::{InstanceStateProbe, ProbeResult};
use crate::retry::{retry, RetryError, RetryPolicy};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use warden_common::{
    record_timestamp, DesiredTransition, InstanceState, LifecycleError, ServerRecord, StopStage,
};
use warden_providers::{CommandChannel, ComputeProvider, RegistryStore};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub retry: RetryPolicy,
    pub working_directory: String,
    pub world_data_bucket: String,
    /// Terminate deletes the persisted record; keep it off unless the
    /// deployment explicitly opts in.
    pub enable_terminate: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            working_directory: String::from("/home/ec2-user"),
            world_data_bucket: String::from("warden-world-data"),
            enable_terminate: false,
        }
    }
}

/// Outcome of pairing the probed state against the requested transition.
enum Action {
    Proceed,
    AlreadySatisfied,
}

/// Drives the managed instance through lifecycle transitions: validates
/// the request against the probed state, issues the control-plane calls
/// (validate-only first, then for real, with retries), runs the remote
/// commands in the order the data requires, and reconciles the registry.
///
/// Holds no mutable state between invocations; concurrent requests for
/// the same instance can race on a stale probe (no per-instance lock).
pub struct Orchestrator {
    compute: Arc<dyn ComputeProvider>,
    probe: InstanceStateProbe,
    dispatcher: RemoteCommandDispatcher,
    registry: Arc<dyn RegistryStore>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        compute: Arc<dyn ComputeProvider>,
        channel: Arc<dyn CommandChannel>,
        registry: Arc<dyn RegistryStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            probe: InstanceStateProbe::new(compute.clone()),
            dispatcher: RemoteCommandDispatcher::new(channel),
            compute,
            registry,
            config,
        }
    }

    pub fn with_command_polling(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.dispatcher = self.dispatcher.with_polling(poll_interval, max_polls);
        self
    }

    /// Transition table. Only `Running` and `Stopped` accept any input;
    /// transitional and terminal states reject everything.
    fn validate(
        current: InstanceState,
        requested: DesiredTransition,
    ) -> Result<Action, LifecycleError> {
        use DesiredTransition::*;
        use InstanceState::*;

        match (current, requested) {
            (Running, Start) | (Stopped, Stop) => Ok(Action::AlreadySatisfied),
            (Stopped, Start) | (Running, Stop) => Ok(Action::Proceed),
            (Running, Terminate) | (Stopped, Terminate) => Ok(Action::Proceed),
            _ => Err(LifecycleError::InvalidStateForTransition {
                current,
                requested,
            }),
        }
    }

    /// Read-only state check, exposed for the ping endpoint.
    pub async fn ping(&self, instance_id: &str) -> Result<ProbeResult, LifecycleError> {
        self.probe.probe(instance_id).await
    }

    /// Start the instance and the managed server process on it. Returns
    /// the resolved public address. A partially started instance is not
    /// rolled back; the error says which step failed.
    pub async fn start(
        &self,
        instance_id: &str,
        server_name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LifecycleError> {
        let probed = self.probe.probe(instance_id).await?;
        match Self::validate(probed.state, DesiredTransition::Start)? {
            Action::AlreadySatisfied => {
                tracing::info!(instance_id, "instance already running");
                return probed.address.ok_or(LifecycleError::AddressUnavailable);
            }
            Action::Proceed => {}
        }

        // Validate-only call first: a permission or parameter problem
        // surfaces here with no side effects and no retries.
        self.compute
            .start_instance(instance_id, true)
            .await
            .map_err(|e| LifecycleError::StartFailed {
                cause: format!("dry run rejected: {e}"),
            })?;

        let compute = &self.compute;
        retry(&self.config.retry, cancel, || {
            compute.start_instance(instance_id, false)
        })
        .await
        .map_err(|e| map_retry(e, |cause| LifecycleError::StartFailed { cause }))?;

        tracing::info!(instance_id, "start accepted, waiting for address");

        // Poll until the instance is running with an address, bounded by
        // the same policy.
        let address = retry(&self.config.retry, cancel, || async move {
            let probed = self.probe.probe(instance_id).await?;
            match (probed.state, probed.address) {
                (InstanceState::Running, Some(address)) => Ok(address),
                (state, _) => Err(anyhow::anyhow!("instance is {state}, not running yet")),
            }
        })
        .await
        .map_err(|e| map_retry(e, |cause| LifecycleError::StartFailed { cause }))?;

        // The process can only come up once the OS is reachable.
        self.dispatcher
            .dispatch(
                instance_id,
                startup_commands(server_name),
                &self.config.working_directory,
            )
            .await
            .map_err(|e| LifecycleError::StartFailed {
                cause: e.to_string(),
            })?;

        self.reconcile(instance_id, server_name, Some(address.clone()), true)
            .await?;

        tracing::info!(instance_id, address = %address, "server started");
        Ok(address)
    }

    /// Stop the managed server process, then the instance. The graceful
    /// shutdown command always runs (and is awaited) before the compute
    /// stop call; stopping compute first would lose unsaved world data.
    pub async fn stop(
        &self,
        instance_id: &str,
        server_name: &str,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        let probed = self.probe.probe(instance_id).await?;
        match Self::validate(probed.state, DesiredTransition::Stop)? {
            Action::AlreadySatisfied => {
                tracing::info!(instance_id, "instance already stopped");
                return Ok(());
            }
            Action::Proceed => {}
        }

        let handle = self
            .dispatcher
            .dispatch(
                instance_id,
                shutdown_commands(server_name, &self.config.world_data_bucket),
                &self.config.working_directory,
            )
            .await
            .map_err(|e| stop_failed(StopStage::Shutdown, e))?;

        self.dispatcher
            .wait(&handle, cancel)
            .await
            .map_err(|e| match e {
                LifecycleError::Cancelled => LifecycleError::Cancelled,
                other => stop_failed(StopStage::Shutdown, other),
            })?;

        self.compute
            .stop_instance(instance_id, true)
            .await
            .map_err(|e| LifecycleError::StopFailed {
                stage: StopStage::Compute,
                cause: format!("dry run rejected: {e}"),
            })?;

        let compute = &self.compute;
        retry(&self.config.retry, cancel, || {
            compute.stop_instance(instance_id, false)
        })
        .await
        .map_err(|e| {
            map_retry(e, |cause| LifecycleError::StopFailed {
                stage: StopStage::Compute,
                cause,
            })
        })?;

        self.reconcile(instance_id, server_name, probed.address, false)
            .await?;

        tracing::info!(instance_id, "server stopping");
        Ok(())
    }

    /// Terminate the instance and drop its registry entry. Gated: the
    /// record deletion is destructive, so the capability must be enabled
    /// explicitly per deployment.
    pub async fn terminate(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), LifecycleError> {
        if !self.config.enable_terminate {
            return Err(LifecycleError::TerminateDisabled);
        }

        let probed = self.probe.probe(instance_id).await?;
        match Self::validate(probed.state, DesiredTransition::Terminate)? {
            Action::AlreadySatisfied | Action::Proceed => {}
        }

        self.compute
            .terminate_instance(instance_id, true)
            .await
            .map_err(|e| LifecycleError::TerminateFailed {
                cause: format!("dry run rejected: {e}"),
            })?;

        let compute = &self.compute;
        retry(&self.config.retry, cancel, || {
            compute.terminate_instance(instance_id, false)
        })
        .await
        .map_err(|e| map_retry(e, |cause| LifecycleError::TerminateFailed { cause }))?;

        // Delete only after the provider accepted the termination.
        self.registry
            .delete(instance_id)
            .await
            .map_err(|e| LifecycleError::Registry(e.to_string()))?;

        tracing::warn!(instance_id, "instance terminated and record deleted");
        Ok(())
    }

    /// Last-writer-wins registry update after a successful transition.
    /// Keeps the previous address when the new one is unknown.
    async fn reconcile(
        &self,
        instance_id: &str,
        server_name: &str,
        address: Option<String>,
        is_running: bool,
    ) -> Result<(), LifecycleError> {
        let existing = self
            .registry
            .get(instance_id)
            .await
            .map_err(|e| LifecycleError::Registry(e.to_string()))?;

        let record = ServerRecord {
            id: instance_id.to_string(),
            address: address.or_else(|| existing.as_ref().and_then(|r| r.address.clone())),
            name: server_name.to_string(),
            last_updated: record_timestamp(),
            is_running,
        };

        self.registry
            .put(&record)
            .await
            .map_err(|e| LifecycleError::Registry(e.to_string()))
    }
}

fn stop_failed(stage: StopStage, err: impl fmt::Display) -> LifecycleError {
    LifecycleError::StopFailed {
        stage,
        cause: err.to_string(),
    }
}

fn map_retry<E: fmt::Display>(
    err: RetryError<E>,
    exhausted: impl FnOnce(String) -> LifecycleError,
) -> LifecycleError {
    match err {
        RetryError::Cancelled => LifecycleError::Cancelled,
        RetryError::Exhausted {
            attempts,
            last_error,
        } => exhausted(format!(
            "gave up after {attempts} attempts, last error: {last_error}"
        )),
    }
}
