pub mod client;
pub mod config;
pub mod flatten;
pub mod format;
pub mod logging;
pub mod model;
pub mod table;

pub use client::{Client, OperationAccepted, TransformOptions};
pub use config::ClientConfig;
pub use model::{DatasetRef, Process, ProcessStatus, StepFile};
pub use table::Table;
