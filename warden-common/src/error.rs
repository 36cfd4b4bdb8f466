use crate::types::{DesiredTransition, InstanceState};
use std::fmt;
use thiserror::Error;

/// Which half of the two-step stop flow failed. The graceful shutdown
/// command always runs before the compute stop call, so a `Compute`
/// failure means the managed process is already down but compute is
/// still billing, and only the compute half needs a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStage {
    Shutdown,
    Compute,
}

impl fmt::Display for StopStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopStage::Shutdown => f.write_str("shutdown command"),
            StopStage::Compute => f.write_str("compute stop"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("instance is {current}, cannot {requested}")]
    InvalidStateForTransition {
        current: InstanceState,
        requested: DesiredTransition,
    },

    #[error("failed to probe instance state: {0}")]
    Probe(String),

    #[error("instance is running but has no public address")]
    AddressUnavailable,

    #[error("gave up after {attempts} attempts, last error: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },

    #[error("operation cancelled by caller")]
    Cancelled,

    #[error("remote command ended with status {status}: {detail}")]
    CommandFailed { status: String, detail: String },

    #[error("start did not complete: {cause}")]
    StartFailed { cause: String },

    #[error("stop did not complete at the {stage} step: {cause}")]
    StopFailed { stage: StopStage, cause: String },

    #[error("terminate did not complete: {cause}")]
    TerminateFailed { cause: String },

    #[error("terminate is disabled on this deployment")]
    TerminateDisabled,

    #[error("registry operation failed: {0}")]
    Registry(String),
}

impl LifecycleError {
    /// Stable code surfaced to callers alongside the human-readable cause.
    pub fn code(&self) -> &'static str {
        match self {
            LifecycleError::InvalidStateForTransition { .. } => "invalid_state_for_transition",
            LifecycleError::Probe(_) => "probe_error",
            LifecycleError::AddressUnavailable => "address_unavailable",
            LifecycleError::ExhaustedRetries { .. } => "exhausted_retries",
            LifecycleError::Cancelled => "cancelled",
            LifecycleError::CommandFailed { .. } => "command_failed",
            LifecycleError::StartFailed { .. } => "start_failed",
            LifecycleError::StopFailed {
                stage: StopStage::Shutdown,
                ..
            } => "stop_failed_shutdown",
            LifecycleError::StopFailed {
                stage: StopStage::Compute,
                ..
            } => "stop_failed_compute",
            LifecycleError::TerminateFailed { .. } => "terminate_failed",
            LifecycleError::TerminateDisabled => "terminate_disabled",
            LifecycleError::Registry(_) => "registry_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_error_names_current_state() {
        let err = LifecycleError::InvalidStateForTransition {
            current: InstanceState::Stopping,
            requested: DesiredTransition::Start,
        };
        let msg = err.to_string();
        assert!(msg.contains("STOPPING"), "message should name the state: {msg}");
        assert!(msg.contains("start"), "message should name the transition: {msg}");
    }

    #[test]
    fn stop_stages_have_distinct_codes() {
        let shutdown = LifecycleError::StopFailed {
            stage: StopStage::Shutdown,
            cause: "rcon unreachable".into(),
        };
        let compute = LifecycleError::StopFailed {
            stage: StopStage::Compute,
            cause: "api timeout".into(),
        };
        assert_ne!(shutdown.code(), compute.code());
    }
}
