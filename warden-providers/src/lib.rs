use anyhow::Result;
use async_trait::async_trait;
use warden_common::ServerRecord;

/// Compute control plane for the single managed instance. Mutating calls
/// accept a `dry_run` flag: with `dry_run = true` the provider validates
/// permissions and parameters without side effects, and `Ok(())` means the
/// real call would succeed.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Numeric lifecycle status code, or `None` when the provider reports
    /// no status for this instance id.
    async fn instance_status(&self, instance_id: &str) -> Result<Option<i32>>;

    /// Public address of the instance, if one is assigned.
    async fn public_address(&self, instance_id: &str) -> Result<Option<String>>;

    async fn start_instance(&self, instance_id: &str, dry_run: bool) -> Result<()>;
    async fn stop_instance(&self, instance_id: &str, dry_run: bool) -> Result<()>;
    async fn terminate_instance(&self, instance_id: &str, dry_run: bool) -> Result<()>;
}

/// Terminal and in-flight states reported by the command channel for a
/// single invocation.
#[derive(Debug, Clone)]
pub struct CommandInvocation {
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

impl CommandInvocation {
    pub fn in_flight(&self) -> bool {
        matches!(self.status.as_str(), "Pending" | "InProgress")
    }

    pub fn succeeded(&self) -> bool {
        self.status == "Success"
    }
}

/// Out-of-band shell execution on the instance OS. `send_command` enqueues
/// execution and returns a command id; completion is observed by polling
/// `command_invocation`.
#[async_trait]
pub trait CommandChannel: Send + Sync {
    async fn send_command(
        &self,
        instance_id: &str,
        commands: &[String],
        working_directory: &str,
    ) -> Result<String>;

    async fn command_invocation(
        &self,
        command_id: &str,
        instance_id: &str,
    ) -> Result<CommandInvocation>;
}

/// Key/value store holding the last-known `ServerRecord` per server id.
/// Last-writer-wins, no transaction semantics.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn put(&self, record: &ServerRecord) -> Result<()>;
    async fn get(&self, server_id: &str) -> Result<Option<ServerRecord>>;
    async fn list(&self) -> Result<Vec<ServerRecord>>;
    async fn delete(&self, server_id: &str) -> Result<()>;
}

pub mod http;
pub mod postgres;

#[cfg(feature = "mock")]
pub mod mock;
