use std::sync::Arc;
use warden_api::app::{build_router, AppState};
use warden_api::auth::{GatewayContext, JwtValidator};
use warden_api::settings;
use warden_orchestrator::{Orchestrator, OrchestratorConfig, RetryPolicy};
use warden_providers::http::{HttpCommandChannel, HttpComputeProvider};
use warden_providers::postgres::PgRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let base_url = settings::control_plane_url();
    let token = settings::control_plane_token();
    let compute = Arc::new(HttpComputeProvider::new(base_url.clone(), token.clone())?);
    let channel = Arc::new(HttpCommandChannel::new(base_url, token)?);

    let registry = Arc::new(PgRegistry::connect(&settings::database_url()?).await?);

    let config = OrchestratorConfig {
        retry: RetryPolicy::default(),
        working_directory: settings::working_directory(),
        world_data_bucket: settings::world_data_bucket(),
        enable_terminate: settings::enable_terminate(),
    };
    let orchestrator = Orchestrator::new(compute, channel, registry.clone(), config);

    let state = Arc::new(AppState {
        orchestrator,
        registry,
        validator: Arc::new(JwtValidator::from_env()),
        gateway: GatewayContext {
            region: settings::gateway_region(),
            account_id: settings::gateway_account_id(),
            api_id: settings::gateway_api_id(),
            stage: settings::gateway_stage(),
        },
    });

    let app = build_router(state);
    let addr = settings::bind_addr();
    tracing::info!(%addr, "control api listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
