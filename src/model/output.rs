use std::collections::HashSet;

use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Operations that only ingest already-registered data. Their steps never
/// count as producing an addressable artifact for terminal resolution.
const OPERATION_REGISTER: &str = "REGISTER";

/// Static description of one pipeline step inside a process definition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub key: String,
    #[serde(default)]
    pub output_key: Option<String>,
    #[serde(default)]
    pub input_keys: Vec<Option<String>>,
    pub operation: String,
    pub tool: String,
}

/// One execution record per definition step that actually ran, linked to its
/// definition by matching `key`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    pub key: String,
    pub name: String,
    pub tool: String,
    pub operation: String,
    pub status: String,
    #[serde(default)]
    pub started_on: Option<f64>,
    #[serde(default)]
    pub completed_on: Option<f64>,
    #[serde(default)]
    pub files: Vec<ExecutionFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFile {
    pub id: i64,
    #[serde(rename = "type")]
    pub file_type: String,
    #[serde(default)]
    pub output_part_key: Option<String>,
    pub name: String,
    pub size: i64,
}

/// Default output part key per toolkit component. Tools outside this table
/// have no default and require an explicit key from the caller.
pub fn default_part_key(tool: &str) -> Option<&'static str> {
    match tool {
        "TRIPLEGEO" | "REVERSE_TRIPLEGEO" => Some("transformed"),
        "LIMES" => Some("accepted"),
        "FAGI" => Some("fused"),
        "DEER" => Some("enriched"),
        _ => None,
    }
}

/// Decodes the `steps` list of a definition or execution record. A missing or
/// null list is an absent result; a present list that does not decode is a
/// malformed-response fault.
pub fn decode_steps<T: DeserializeOwned>(record: &Value) -> Result<Option<Vec<T>>> {
    match record.get("steps") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => {
            let steps = serde_json::from_value(value.clone())
                .map_err(|err| anyhow!("malformed step record: {err}"))?;
            Ok(Some(steps))
        }
    }
}

/// Resolves the single terminal output file of a pipeline: the one file,
/// tagged with the requested (or tool-default) part key, produced by the one
/// step whose output key is never consumed as another step's input.
///
/// The set-difference shortcut relies on the orchestrator only emitting
/// simple DAGs that converge to at most one sink; any ambiguity (no sink,
/// several sinks, duplicate producers, retried executions, part-key
/// collisions) resolves to `None` rather than an arbitrary pick.
pub fn resolve_terminal_file(
    definitions: &[StepDefinition],
    executions: &[StepExecution],
    part_key: Option<&str>,
) -> Option<ExecutionFile> {
    let inputs: HashSet<&str> = definitions
        .iter()
        .flat_map(|definition| definition.input_keys.iter())
        .filter_map(|key| key.as_deref())
        .collect();
    let outputs: HashSet<&str> = definitions
        .iter()
        .filter(|definition| definition.operation != OPERATION_REGISTER)
        .filter_map(|definition| definition.output_key.as_deref())
        .collect();

    let terminal: Vec<&str> = outputs.difference(&inputs).copied().collect();
    let [terminal_key] = terminal.as_slice() else {
        return None;
    };

    let producers: Vec<&StepDefinition> = definitions
        .iter()
        .filter(|definition| definition.output_key.as_deref() == Some(*terminal_key))
        .collect();
    let [producer] = producers.as_slice() else {
        return None;
    };

    let matches: Vec<&StepExecution> = executions
        .iter()
        .filter(|execution| execution.key == producer.key)
        .collect();
    let [step] = matches.as_slice() else {
        return None;
    };

    let part_key = part_key.or_else(|| default_part_key(&step.tool))?;

    let files: Vec<&ExecutionFile> = step
        .files
        .iter()
        .filter(|file| file.output_part_key.as_deref() == Some(part_key))
        .collect();
    let [file] = files.as_slice() else {
        return None;
    };
    Some((*file).clone())
}
