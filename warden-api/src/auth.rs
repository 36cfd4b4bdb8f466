use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::app::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

/// Outcome of evaluating one request against one resource. Deny is the
/// default; only a fully validated token flips it.
#[derive(Debug, Clone)]
pub struct AuthDecision {
    pub principal: Option<String>,
    pub effect: Effect,
    pub resource: String,
}

/// Gateway coordinates used to name the resource a request targets.
#[derive(Debug, Clone)]
pub struct GatewayContext {
    pub region: String,
    pub account_id: String,
    pub api_id: String,
    pub stage: String,
}

#[derive(Debug, Clone)]
pub struct RequestScope {
    pub gateway: GatewayContext,
    pub route: String,
}

impl RequestScope {
    pub fn resource_arn(&self) -> String {
        format!(
            "arn:aws:execute-api:{}:{}:{}/{}/{}",
            self.gateway.region,
            self.gateway.account_id,
            self.gateway.api_id,
            self.gateway.stage,
            self.route.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    aud: String,
    iat: usize,
    exp: usize,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    gty: Option<String>,
    #[serde(default)]
    azp: Option<String>,
}

/// Validates a bearer token and yields the principal it names.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> anyhow::Result<String>;
}

/// HS256 validation for machine-to-machine tokens: issuer, audience and
/// expiry via the library, then the client-credentials shape on top.
pub struct JwtValidator {
    secret: String,
    issuer: String,
    audience: String,
    authorized_party: Option<String>,
}

impl JwtValidator {
    pub fn new(
        secret: String,
        issuer: String,
        audience: String,
        authorized_party: Option<String>,
    ) -> Self {
        Self {
            secret,
            issuer,
            audience,
            authorized_party,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            crate::settings::jwt_secret(),
            crate::settings::jwt_issuer(),
            crate::settings::jwt_audience(),
            crate::settings::jwt_authorized_party(),
        )
    }
}

impl TokenValidator for JwtValidator {
    fn validate(&self, token: &str) -> anyhow::Result<String> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        let data = jsonwebtoken::decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?;
        let claims = data.claims;

        if !claims.sub.ends_with("@clients") {
            anyhow::bail!("subject is not a machine client");
        }
        if claims.gty.as_deref() != Some("client-credentials") {
            anyhow::bail!("grant type is not client-credentials");
        }
        if let Some(expected) = &self.authorized_party {
            if claims.azp.as_deref() != Some(expected.as_str()) {
                anyhow::bail!("authorized party mismatch");
            }
        }

        Ok(claims.sub)
    }
}

pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let Some(auth) = headers.get(header::AUTHORIZATION) else {
        return None;
    };
    let Ok(auth) = auth.to_str() else {
        return None;
    };
    let auth = auth.trim();
    let prefix = "Bearer ";
    if auth.len() <= prefix.len() || !auth.starts_with(prefix) {
        return None;
    }
    Some(auth[prefix.len()..].trim().to_string())
}

/// A missing header, a malformed header and a bad token all converge on
/// the same Deny; only the debug log tells them apart.
pub fn authorize(
    headers: &HeaderMap,
    scope: &RequestScope,
    validator: &dyn TokenValidator,
) -> AuthDecision {
    let resource = scope.resource_arn();

    let Some(token) = extract_bearer(headers) else {
        return AuthDecision {
            principal: None,
            effect: Effect::Deny,
            resource,
        };
    };

    match validator.validate(&token) {
        Ok(principal) => AuthDecision {
            principal: Some(principal),
            effect: Effect::Allow,
            resource,
        },
        Err(e) => {
            tracing::debug!("token rejected: {e}");
            AuthDecision {
                principal: None,
                effect: Effect::Deny,
                resource,
            }
        }
    }
}

pub async fn require_authorized(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let scope = RequestScope {
        gateway: state.gateway.clone(),
        route: req.uri().path().to_string(),
    };

    let decision = authorize(req.headers(), &scope, state.validator.as_ref());
    match decision.effect {
        Effect::Allow => {
            req.extensions_mut().insert(decision);
            next.run(req).await
        }
        Effect::Deny => {
            tracing::warn!(resource = %decision.resource, "request denied");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error":"unauthorized","message":"invalid_or_missing_token"})),
            )
                .into_response()
        }
    }
}
