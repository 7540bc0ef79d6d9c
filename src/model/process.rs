use std::fmt;
use std::time::SystemTime;

use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::flatten;
use crate::format::{format_file_size, timestamp_from_millis};
use crate::model::output::{
    decode_steps, resolve_terminal_file, ExecutionFile, StepDefinition, StepExecution,
};
use crate::table::Table;

/// Lifecycle state of a workflow execution. A process that has never run has
/// no execution record and reports `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Unknown,
    Created,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl ProcessStatus {
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "CREATED" => Self::Created,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            "STOPPED" => Self::Stopped,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Created => "CREATED",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable view over one `{definition, execution}` pair as fetched from the
/// API. Every derived view is computed on demand from the owned pair, never
/// cached, so it always reflects the record as fetched.
#[derive(Debug, Clone)]
pub struct Process {
    process: Value,
    execution: Option<Value>,
}

impl Process {
    /// Normalizes the historical wire shapes into the single pair
    /// representation: the current `{process, execution}` envelope, the
    /// older definition record with an embedded `execution`, and the flat
    /// status record with no execution at all.
    pub fn from_record(record: Value) -> Result<Self> {
        let Value::Object(mut map) = record else {
            return Err(anyhow!("process record must be an object"));
        };

        if let Some(process) = map.remove("process") {
            if !process.is_object() {
                return Err(anyhow!("`process` must be an object"));
            }
            let execution = map.remove("execution").filter(|v| !v.is_null());
            return Ok(Self { process, execution });
        }

        let execution = map.remove("execution").filter(|v| !v.is_null());
        Ok(Self {
            process: Value::Object(map),
            execution,
        })
    }

    pub fn id(&self) -> Result<i64> {
        self.process
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("missing or invalid `id`"))
    }

    pub fn version(&self) -> Result<i64> {
        self.process
            .get("version")
            .and_then(Value::as_i64)
            .ok_or_else(|| anyhow!("missing or invalid `version`"))
    }

    pub fn name(&self) -> Option<&str> {
        self.process.get("name").and_then(Value::as_str)
    }

    pub fn status(&self) -> ProcessStatus {
        self.execution
            .as_ref()
            .and_then(|execution| execution.get("status"))
            .or_else(|| self.process.get("status"))
            .and_then(Value::as_str)
            .map(ProcessStatus::from_wire)
            .unwrap_or(ProcessStatus::Unknown)
    }

    pub fn submitted_on(&self) -> Option<SystemTime> {
        self.execution_millis("submittedOn")
    }

    pub fn started_on(&self) -> Option<SystemTime> {
        self.execution_millis("startedOn")
    }

    pub fn completed_on(&self) -> Option<SystemTime> {
        self.execution_millis("completedOn")
    }

    fn execution_millis(&self, key: &str) -> Option<SystemTime> {
        let raw = self
            .execution
            .as_ref()
            .and_then(|execution| execution.get(key))
            .and_then(Value::as_f64);
        timestamp_from_millis(raw)
    }

    /// Step metadata table, sorted by step name.
    pub fn steps(&self) -> Result<Table> {
        let rows = match &self.execution {
            Some(execution) => flatten::step_rows(execution)?,
            None => Vec::new(),
        };
        let mut table = Table::from_rows(&flatten::STEP_COLUMNS, rows)?;
        table.sort_by(&["Name"], true)?;
        Ok(table)
    }

    /// All files produced by the execution, sorted by type then id.
    pub fn files(&self, format_size: bool) -> Result<Table> {
        let rows = match &self.execution {
            Some(execution) => flatten::step_file_rows(execution)?,
            None => Vec::new(),
        };
        let mut table = Table::from_rows(&flatten::STEP_FILE_COLUMNS, rows)?;
        table.sort_by(&["Type", "Id"], true)?;
        if format_size {
            table.format_column("Size", |cell| match cell.as_f64() {
                Some(num) => Value::from(format_file_size(num)),
                None => cell.clone(),
            })?;
        }
        Ok(table)
    }

    /// Resolves the canonical terminal output of the pipeline. Ambiguous or
    /// empty resolution is an absent result; a payload violating the wire
    /// contract is an error.
    pub fn output(&self, part_key: Option<&str>) -> Result<Option<StepFile>> {
        let Some(execution) = self.execution.as_ref() else {
            return Ok(None);
        };
        let Some(definitions) = decode_steps::<StepDefinition>(&self.process)? else {
            return Ok(None);
        };
        let Some(executions) = decode_steps::<StepExecution>(execution)? else {
            return Ok(None);
        };
        let Some(file) = resolve_terminal_file(&definitions, &executions, part_key) else {
            return Ok(None);
        };
        // identity always comes from the definition record; older execution
        // payloads may lack it entirely
        Ok(Some(StepFile {
            process_id: self.id()?,
            process_version: self.version()?,
            file,
        }))
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Process ({}, {}) status is {}",
            self.id().unwrap_or_default(),
            self.version().unwrap_or_default(),
            self.status()
        )
    }
}

/// A live handle to one resolved output file, usable as a dataset address in
/// subsequent operation calls. Identity is `(process_id, process_version,
/// file id)`; it has no lifecycle of its own.
#[derive(Debug, Clone)]
pub struct StepFile {
    process_id: i64,
    process_version: i64,
    file: ExecutionFile,
}

impl StepFile {
    pub fn id(&self) -> i64 {
        self.file.id
    }

    pub fn process_id(&self) -> i64 {
        self.process_id
    }

    pub fn process_version(&self) -> i64 {
        self.process_version
    }

    pub fn name(&self) -> &str {
        &self.file.name
    }

    pub fn output_type(&self) -> &str {
        &self.file.file_type
    }

    pub fn output_part_key(&self) -> Option<&str> {
        self.file.output_part_key.as_deref()
    }

    pub fn size(&self) -> i64 {
        self.file.size
    }
}

impl fmt::Display for StepFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File ({}, {})", self.id(), self.name())
    }
}
