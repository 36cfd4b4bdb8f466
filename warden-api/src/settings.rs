//! Environment-backed configuration. Every getter has a dev-friendly
//! default except the secrets, which fail loudly at startup.

pub fn jwt_secret() -> String {
    std::env::var("JWT_SECRET")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "dev_insecure_change_me".to_string())
}

pub fn jwt_issuer() -> String {
    std::env::var("JWT_ISSUER")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "https://warden.example.auth0.com/".to_string())
}

pub fn jwt_audience() -> String {
    std::env::var("JWT_AUDIENCE")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "warden-control-api".to_string())
}

/// When set, the azp claim must match exactly. Empty disables the check.
pub fn jwt_authorized_party() -> Option<String> {
    std::env::var("JWT_AUTHORIZED_PARTY")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn gateway_region() -> String {
    std::env::var("GATEWAY_REGION")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "us-east-1".to_string())
}

pub fn gateway_account_id() -> String {
    std::env::var("GATEWAY_ACCOUNT_ID")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "000000000000".to_string())
}

pub fn gateway_api_id() -> String {
    std::env::var("GATEWAY_API_ID")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "local".to_string())
}

pub fn gateway_stage() -> String {
    std::env::var("GATEWAY_STAGE")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "dev".to_string())
}

pub fn control_plane_url() -> String {
    std::env::var("CONTROL_PLANE_URL")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "http://localhost:9400".to_string())
        .trim_end_matches('/')
        .to_string()
}

pub fn control_plane_token() -> String {
    std::env::var("CONTROL_PLANE_TOKEN").unwrap_or_default()
}

pub fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))
}

pub fn world_data_bucket() -> String {
    std::env::var("WORLD_DATA_BUCKET")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "warden-world-data".to_string())
}

pub fn working_directory() -> String {
    std::env::var("COMMAND_WORKING_DIRECTORY")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "/home/ec2-user".to_string())
}

pub fn enable_terminate() -> bool {
    std::env::var("WARDEN_ENABLE_TERMINATE")
        .ok()
        .map(|v| {
            matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "0.0.0.0:8080".to_string())
}
