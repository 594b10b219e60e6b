// Conversion engine - independent of the CLI

pub mod core;
pub mod error;
pub mod hardware;
pub mod probe;
pub mod runner;
pub mod worker;

pub use core::*;
pub use error::EngineError;
pub use hardware::{CapabilityClass, EncoderCapabilityProber, EncoderDescriptor};
pub use probe::{MediaInfo, MediaProbe};
pub use runner::{EncodePlan, JobRunner, RunnerState};
pub use worker::{BatchScheduler, BatchState};
