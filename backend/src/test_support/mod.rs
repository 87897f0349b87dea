//! Test utilities for the recovery crate.
//!
//! Shared by unit tests (in `src/`) and integration tests (in `tests/`, via
//! the `test-support` feature).

mod collaborators;
mod in_memory;
mod runtime;

pub use collaborators::{RecordingMetrics, RecordingNotifier, ScriptedContentGenerator};
pub use in_memory::InMemoryRecoveryStore;
pub use runtime::{ImmediateSleeper, MutableClock, RecordingSleeper};
