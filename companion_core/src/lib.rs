#![forbid(unsafe_code)]

//! Core engines for the wellness companion.
//!
//! This crate provides:
//! - Domain types (exercises, vitals records, rhythm and stress labels)
//! - The built-in exercise catalog
//! - The guided exercise session state machine and its tick driver
//! - Camera PPG heart rate estimation over pluggable frame sources
//! - Fall screening and the simulated stress walk
//! - Record persistence (JSONL sink) and CSV trace loading

pub mod types;
pub mod error;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod session;
pub mod timer;
pub mod frame;
pub mod ppg;
pub mod motion;
pub mod stress;
pub mod sink;
pub mod trace;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog};
pub use config::{Config, FallbackPolicy};
pub use session::{ExerciseSession, SessionStatus, TickOutcome, Vitals};
pub use timer::{run_session, IntervalTimer, Ticker};
pub use frame::{Frame, FrameSource, SyntheticPulse, TraceSource, UnavailableSource};
pub use ppg::{Estimate, FrameOutcome, PpgEstimator, PpgMonitor};
pub use motion::{Acceleration, FallDetector};
pub use stress::StressMonitor;
pub use sink::{read_records, JsonlSink, MemorySink, RecordSink};
