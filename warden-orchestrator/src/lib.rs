pub mod dispatch;
pub mod lifecycle;
pub mod probe;
pub mod retry;

pub use dispatch::{CommandHandle, CommandOutput, RemoteCommandDispatcher};
pub use lifecycle::{Orchestrator, OrchestratorConfig};
pub use probe::{InstanceStateProbe, ProbeResult};
pub use retry::{retry, RetryError, RetryPolicy};
