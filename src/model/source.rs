use serde_json::{json, Value};

use crate::model::process::StepFile;

/// The closed set of equivalent ways to address a dataset in an operation
/// call: a path on the remote user file system, a catalog resource revision,
/// or one output file of a workflow execution. A live `StepFile` handle
/// reduces to the output triple; the other forms pass through unchanged.
/// Each positional argument of a multi-argument operation converts in
/// isolation via `Into<DatasetRef>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetRef {
    Path(String),
    Catalog { id: i64, version: i64 },
    Output {
        process_id: i64,
        process_version: i64,
        file_id: i64,
    },
}

impl DatasetRef {
    pub fn to_request_value(&self) -> Value {
        match self {
            Self::Path(path) => json!({ "type": "FILESYSTEM", "path": path }),
            Self::Catalog { id, version } => json!({
                "type": "CATALOG",
                "id": id,
                "version": version,
            }),
            Self::Output {
                process_id,
                process_version,
                file_id,
            } => json!({
                "type": "OUTPUT",
                "processId": process_id,
                "processVersion": process_version,
                "fileId": file_id,
            }),
        }
    }
}

impl From<&str> for DatasetRef {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for DatasetRef {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<(i64, i64)> for DatasetRef {
    fn from((id, version): (i64, i64)) -> Self {
        Self::Catalog { id, version }
    }
}

impl From<(i64, i64, i64)> for DatasetRef {
    fn from((process_id, process_version, file_id): (i64, i64, i64)) -> Self {
        Self::Output {
            process_id,
            process_version,
            file_id,
        }
    }
}

impl From<&StepFile> for DatasetRef {
    fn from(file: &StepFile) -> Self {
        Self::Output {
            process_id: file.process_id(),
            process_version: file.process_version(),
            file_id: file.id(),
        }
    }
}

impl From<StepFile> for DatasetRef {
    fn from(file: StepFile) -> Self {
        Self::from(&file)
    }
}
