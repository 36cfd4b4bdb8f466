use axum_test::TestServer;
use std::sync::Arc;
use std::time::Duration;
use warden_api::app::{build_router, AppState};
use warden_api::auth::{GatewayContext, TokenValidator};
use warden_orchestrator::{Orchestrator, OrchestratorConfig, RetryPolicy};
use warden_providers::mock::{
    new_call_log, CallLog, MemoryRegistry, MockCommandChannel, MockCompute,
};

pub const GOOD_TOKEN: &str = "good-token";

/// Accepts exactly one token so the guard tests exercise the middleware
/// without signing real JWTs.
pub struct StubValidator;

impl TokenValidator for StubValidator {
    fn validate(&self, token: &str) -> anyhow::Result<String> {
        if token == GOOD_TOKEN {
            Ok(String::from("client-abc@clients"))
        } else {
            anyhow::bail!("unknown token")
        }
    }
}

#[allow(dead_code)]
pub struct TestHarness {
    pub server: TestServer,
    pub compute: Arc<MockCompute>,
    pub channel: Arc<MockCommandChannel>,
    pub registry: Arc<MemoryRegistry>,
    pub calls: CallLog,
}

pub fn harness(enable_terminate: bool) -> TestHarness {
    let calls = new_call_log();
    let compute = Arc::new(MockCompute::new(calls.clone()));
    let channel = Arc::new(MockCommandChannel::new(calls.clone()));
    let registry = Arc::new(MemoryRegistry::new());

    let config = OrchestratorConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        },
        enable_terminate,
        ..OrchestratorConfig::default()
    };
    let orchestrator = Orchestrator::new(
        compute.clone(),
        channel.clone(),
        registry.clone(),
        config,
    )
    .with_command_polling(Duration::from_millis(1), 5);

    let state = Arc::new(AppState {
        orchestrator,
        registry: registry.clone(),
        validator: Arc::new(StubValidator),
        gateway: GatewayContext {
            region: String::from("us-east-1"),
            account_id: String::from("123456789012"),
            api_id: String::from("abc123"),
            stage: String::from("prod"),
        },
    });

    TestHarness {
        server: TestServer::new(build_router(state)).unwrap(),
        compute,
        channel,
        registry,
        calls,
    }
}
