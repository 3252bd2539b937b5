pub mod engine;
pub mod extraction;
pub mod images;
pub mod probes;

pub use crate::domain::model::{ChatRequest, ChatResponse, Completion};
pub use crate::domain::ports::{ApiSettings, PlannedRequest, Probe, ProbeReport, StepReport, Storage};
pub use crate::utils::error::Result;
