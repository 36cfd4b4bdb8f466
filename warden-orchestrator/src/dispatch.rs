use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use warden_common::LifecycleError;
use warden_providers::CommandChannel;

/// Identifies one enqueued command invocation on one instance.
#[derive(Debug, Clone)]
pub struct CommandHandle {
    pub command_id: String,
    pub instance_id: String,
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Sends shell commands to the instance OS through the management channel
/// and optionally polls the invocation to completion. Dispatch is
/// fire-and-forget at the protocol level; `wait` is bounded so a hung
/// invocation cannot stall a lifecycle request forever.
pub struct RemoteCommandDispatcher {
    channel: Arc<dyn CommandChannel>,
    poll_interval: Duration,
    max_polls: u32,
}

impl RemoteCommandDispatcher {
    pub fn new(channel: Arc<dyn CommandChannel>) -> Self {
        Self {
            channel,
            poll_interval: Duration::from_secs(5),
            max_polls: 24,
        }
    }

    pub fn with_polling(mut self, poll_interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = poll_interval;
        self.max_polls = max_polls.max(1);
        self
    }

    pub async fn dispatch(
        &self,
        instance_id: &str,
        commands: Vec<String>,
        working_directory: &str,
    ) -> Result<CommandHandle, LifecycleError> {
        tracing::debug!(instance_id, count = commands.len(), "dispatching remote command");
        let command_id = self
            .channel
            .send_command(instance_id, &commands, working_directory)
            .await
            .map_err(|e| LifecycleError::CommandFailed {
                status: String::from("DeliveryFailed"),
                detail: e.to_string(),
            })?;

        Ok(CommandHandle {
            command_id,
            instance_id: instance_id.to_string(),
        })
    }

    /// Poll the invocation until it leaves Pending/InProgress, up to
    /// `max_polls` cycles. Terminal non-success statuses and poll
    /// exhaustion both surface as `CommandFailed`.
    pub async fn wait(
        &self,
        handle: &CommandHandle,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, LifecycleError> {
        for poll in 0..self.max_polls {
            let invocation = self
                .channel
                .command_invocation(&handle.command_id, &handle.instance_id)
                .await
                .map_err(|e| LifecycleError::CommandFailed {
                    status: String::from("PollFailed"),
                    detail: e.to_string(),
                })?;

            if invocation.in_flight() {
                tracing::debug!(
                    command_id = %handle.command_id,
                    poll,
                    "command still running"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LifecycleError::Cancelled),
                    _ = sleep(self.poll_interval) => {}
                }
                continue;
            }

            if invocation.succeeded() {
                return Ok(CommandOutput {
                    stdout: invocation.stdout,
                    stderr: invocation.stderr,
                });
            }

            return Err(LifecycleError::CommandFailed {
                status: invocation.status,
                detail: invocation.stderr,
            });
        }

        Err(LifecycleError::CommandFailed {
            status: String::from("TimedOut"),
            detail: format!(
                "command {} still in flight after {} polls",
                handle.command_id, self.max_polls
            ),
        })
    }
}

/// Commands that gracefully stop the managed game-server process: persist
/// the world through the server console, then sync the world data off the
/// host. Must complete before compute stops, or the last writes are lost.
pub fn shutdown_commands(server_name: &str, world_data_bucket: &str) -> Vec<String> {
    vec![
        format!("sudo docker exec -i {server_name} rcon-cli stop"),
        format!("sudo aws s3 sync --delete data s3://{world_data_bucket}/{server_name}/"),
    ]
}

/// Command that brings the managed game-server process up once the OS is
/// reachable.
pub fn startup_commands(server_name: &str) -> Vec<String> {
    vec![format!("sudo docker start {server_name}")]
}
