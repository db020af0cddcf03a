#![forbid(unsafe_code)]

pub mod align;
pub mod audio;
pub mod backend;
pub mod cli;
pub mod error;
pub mod lang;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod process;
pub mod prosody;
pub mod segment;
pub mod subtitle;
pub mod timing;

pub use error::{RdError, RdResult};
pub use model::{DubRequest, Partition, PipelineStage, RunReport};
pub use orchestrator::RedubEngine;
