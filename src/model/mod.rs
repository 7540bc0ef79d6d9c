pub mod output;
pub mod process;
pub mod source;

pub use output::{ExecutionFile, StepDefinition, StepExecution};
pub use process::{Process, ProcessStatus, StepFile};
pub use source::DatasetRef;
