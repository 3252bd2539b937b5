pub mod adapters;
#[cfg(feature = "cli")]
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::{http::ChatClient, storage::LocalStorage};
pub use config::{ApiOverrides, FlowKind, ProbeSettings};
pub use core::engine::ProbeEngine;
pub use core::extraction::{FrameSplitProbe, RoleExtractionProbe};
pub use core::probes::{ConnectivityProbe, ImageProbe, ReferenceProbe, StoryboardMode, StoryboardProbe};
pub use utils::error::{ProbeError, Result};
