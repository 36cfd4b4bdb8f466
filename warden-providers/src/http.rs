use crate::{CommandChannel, CommandInvocation, ComputeProvider};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Document name for the run-shell-script command template on the
/// management channel.
const SHELL_SCRIPT_DOCUMENT: &str = "run-shell-script";

fn control_plane_client() -> Result<Client> {
    // Without an overall timeout a stalled control-plane call can hang a
    // lifecycle request forever.
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(20))
        .build()?;
    Ok(client)
}

fn auth_headers(token: &str) -> Result<reqwest::header::HeaderMap> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        "X-Auth-Token",
        reqwest::header::HeaderValue::from_str(token)?,
    );
    headers.insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    Ok(headers)
}

/// Compute control plane over the provider's REST API.
pub struct HttpComputeProvider {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpComputeProvider {
    pub fn new(base_url: String, token: String) -> Result<Self> {
        Ok(Self {
            client: control_plane_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    /// Issue one of the instance actions (`start`, `stop`, `terminate`).
    /// With `dry_run` the provider only validates; its "dry run would have
    /// succeeded" response is reported as `Ok(())`.
    async fn instance_action(&self, instance_id: &str, action: &str, dry_run: bool) -> Result<()> {
        let url = format!("{}/instances/{}/action", self.base_url, instance_id);
        let body = json!({ "action": action, "dry_run": dry_run });

        tracing::debug!(instance_id, action, dry_run, "issuing instance action");

        let resp = self
            .client
            .post(&url)
            .headers(auth_headers(&self.token)?)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "instance action {} failed: status={}, response={}",
                action,
                status.as_u16(),
                text
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ComputeProvider for HttpComputeProvider {
    async fn instance_status(&self, instance_id: &str) -> Result<Option<i32>> {
        let url = format!("{}/instances/{}/status", self.base_url, instance_id);
        let resp = self
            .client
            .get(&url)
            .headers(auth_headers(&self.token)?)
            .send()
            .await?;

        // The provider reports "no status" for unknown or freshly removed
        // instances; that is a state, not a transport failure.
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "describe instance status failed: status={}, response={}",
                status.as_u16(),
                text
            ));
        }

        let v: serde_json::Value = resp.json().await?;
        Ok(v.pointer("/state/code").and_then(|c| c.as_i64()).map(|c| c as i32))
    }

    async fn public_address(&self, instance_id: &str) -> Result<Option<String>> {
        let url = format!("{}/instances/{}", self.base_url, instance_id);
        let resp = self
            .client
            .get(&url)
            .headers(auth_headers(&self.token)?)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "describe instance failed: status={}, response={}",
                status.as_u16(),
                text
            ));
        }

        let v: serde_json::Value = resp.json().await?;
        Ok(v.pointer("/public_ip/address")
            .and_then(|a| a.as_str())
            .map(|a| a.to_string()))
    }

    async fn start_instance(&self, instance_id: &str, dry_run: bool) -> Result<()> {
        self.instance_action(instance_id, "start", dry_run).await
    }

    async fn stop_instance(&self, instance_id: &str, dry_run: bool) -> Result<()> {
        self.instance_action(instance_id, "stop", dry_run).await
    }

    async fn terminate_instance(&self, instance_id: &str, dry_run: bool) -> Result<()> {
        self.instance_action(instance_id, "terminate", dry_run).await
    }
}

/// Remote command channel over the provider's REST API.
pub struct HttpCommandChannel {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpCommandChannel {
    pub fn new(base_url: String, token: String) -> Result<Self> {
        Ok(Self {
            client: control_plane_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }
}

#[async_trait]
impl CommandChannel for HttpCommandChannel {
    async fn send_command(
        &self,
        instance_id: &str,
        commands: &[String],
        working_directory: &str,
    ) -> Result<String> {
        let url = format!("{}/commands", self.base_url);
        let body = json!({
            "document_name": SHELL_SCRIPT_DOCUMENT,
            "instance_ids": [instance_id],
            "parameters": {
                "commands": commands,
                "workingDirectory": [working_directory],
            },
        });

        tracing::debug!(instance_id, count = commands.len(), "sending remote command");

        let resp = self
            .client
            .post(&url)
            .headers(auth_headers(&self.token)?)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "send command failed: status={}, response={}",
                status.as_u16(),
                text
            ));
        }

        let v: serde_json::Value = resp.json().await?;
        v.get("command_id")
            .and_then(|c| c.as_str())
            .map(|c| c.to_string())
            .ok_or_else(|| anyhow!("send command response carried no command_id"))
    }

    async fn command_invocation(
        &self,
        command_id: &str,
        instance_id: &str,
    ) -> Result<CommandInvocation> {
        let url = format!(
            "{}/commands/{}/invocations/{}",
            self.base_url, command_id, instance_id
        );
        let resp = self
            .client
            .get(&url)
            .headers(auth_headers(&self.token)?)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!(
                "get command invocation failed: status={}, response={}",
                status.as_u16(),
                text
            ));
        }

        let v: serde_json::Value = resp.json().await?;
        Ok(CommandInvocation {
            status: v
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("Unknown")
                .to_string(),
            stdout: v
                .get("standard_output_content")
                .and_then(|s| s.as_str())
                .unwrap_or_default()
                .to_string(),
            stderr: v
                .get("standard_error_content")
                .and_then(|s| s.as_str())
                .unwrap_or_default()
                .to_string(),
        })
    }
}
