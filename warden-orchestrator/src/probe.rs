use std::sync::Arc;
use warden_common::{InstanceState, LifecycleError};
use warden_providers::ComputeProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub state: InstanceState,
    pub address: Option<String>,
}

/// Read-only view of the instance through the control plane. Safe to call
/// any number of times; never touches the registry.
pub struct InstanceStateProbe {
    compute: Arc<dyn ComputeProvider>,
}

impl InstanceStateProbe {
    pub fn new(compute: Arc<dyn ComputeProvider>) -> Self {
        Self { compute }
    }

    /// Current state plus, when running, the public address. A provider
    /// that reports no status yields `NotFound` (a state, not an error);
    /// a running instance without a public address is
    /// `AddressUnavailable`.
    pub async fn probe(&self, instance_id: &str) -> Result<ProbeResult, LifecycleError> {
        let code = self
            .compute
            .instance_status(instance_id)
            .await
            .map_err(|e| LifecycleError::Probe(e.to_string()))?;

        let state = match code {
            Some(code) => InstanceState::from_code(code),
            None => InstanceState::NotFound,
        };

        if state != InstanceState::Running {
            return Ok(ProbeResult {
                state,
                address: None,
            });
        }

        let address = self
            .compute
            .public_address(instance_id)
            .await
            .map_err(|e| LifecycleError::Probe(e.to_string()))?;

        match address {
            Some(address) => Ok(ProbeResult {
                state,
                address: Some(address),
            }),
            None => Err(LifecycleError::AddressUnavailable),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_providers::mock::{new_call_log, MockCompute};

    fn probe_with(codes: &[Option<i32>], address: Option<&str>) -> InstanceStateProbe {
        let compute = MockCompute::new(new_call_log());
        compute.script_status(codes);
        compute.set_address(address);
        InstanceStateProbe::new(Arc::new(compute))
    }

    #[tokio::test]
    async fn running_instance_resolves_address() {
        let probe = probe_with(&[Some(16)], Some("203.0.113.10"));
        let result = probe.probe("i-0abc").await.unwrap();
        assert_eq!(result.state, InstanceState::Running);
        assert_eq!(result.address.as_deref(), Some("203.0.113.10"));
    }

    #[tokio::test]
    async fn stopped_instance_has_no_address_and_no_error() {
        let probe = probe_with(&[Some(80)], Some("203.0.113.10"));
        let result = probe.probe("i-0abc").await.unwrap();
        assert_eq!(result.state, InstanceState::Stopped);
        assert_eq!(result.address, None);
    }

    #[tokio::test]
    async fn running_without_address_is_address_unavailable() {
        let probe = probe_with(&[Some(16)], None);
        let err = probe.probe("i-0abc").await.unwrap_err();
        assert!(matches!(err, LifecycleError::AddressUnavailable));
    }

    #[tokio::test]
    async fn missing_status_maps_to_not_found() {
        let probe = probe_with(&[None], None);
        let result = probe.probe("i-0abc").await.unwrap();
        assert_eq!(result.state, InstanceState::NotFound);
    }

    #[tokio::test]
    async fn unmapped_code_falls_back_to_not_found() {
        let probe = probe_with(&[Some(99)], None);
        let result = probe.probe("i-0abc").await.unwrap();
        assert_eq!(result.state, InstanceState::NotFound);
    }

    #[tokio::test]
    async fn transport_failure_is_a_probe_error() {
        let compute = MockCompute::new(new_call_log());
        compute.fail_status("connection refused");
        let probe = InstanceStateProbe::new(Arc::new(compute));
        let err = probe.probe("i-0abc").await.unwrap_err();
        match err {
            LifecycleError::Probe(msg) => assert!(msg.contains("connection refused")),
            other => panic!("expected probe error, got {other:?}"),
        }
    }
}
