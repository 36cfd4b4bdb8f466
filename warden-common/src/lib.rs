pub mod error;
pub mod types;

pub use error::{LifecycleError, StopStage};
pub use types::{record_timestamp, DesiredTransition, InstanceState, ServerRecord, RECORD_SORT_KEY};
