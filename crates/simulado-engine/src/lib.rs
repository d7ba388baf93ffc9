//! simulado-engine: the exam session coordinator.
//!
//! Owns the session lifecycle on top of `simulado-core`: starting and
//! resuming sessions, background question loading, the countdown timer,
//! autosave, finalize, and turbo review.

mod loader;
pub mod review;
pub mod session;

pub use review::remediation_config;
pub use session::{EngineConfig, ExamEngine, NoopObserver, SessionHandle, SessionObserver};
