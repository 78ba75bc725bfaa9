pub mod adapters;
pub mod artifacts;
pub mod completion;
pub mod config;
pub mod discovery;
pub mod error;
pub mod layout;
pub mod orchestrator;
pub mod pipeline;
pub mod runlog;
pub mod state;
pub mod sync;
pub mod types;
pub mod wiring;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapters::{CommandAdapter, Delegates, SignalConditioner, StageAdapter, StageContext};
pub use config::{Settings, SorterParams};
pub use discovery::SessionDiscoverer;
pub use error::{ConfigError, FailureKind, LayoutError, Result, SpikesortError, StageFailure, SyncError};
pub use orchestrator::Orchestrator;
pub use pipeline::StagePipeline;
pub use runlog::RunLog;
pub use state::{infer_state, ArtifactInventory, ProbeState};
pub use types::*;
pub use wiring::SyncDescriptor;
