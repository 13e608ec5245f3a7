pub mod config;
pub mod phase;
pub mod snapshot;
pub mod timer;

pub use config::PomodoroConfig;
pub use phase::{Phase, RunState};
pub use snapshot::{Snapshot, reconcile};
pub use timer::{Completion, ForcedPhase, Timer};
