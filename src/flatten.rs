use anyhow::{anyhow, Result};
use serde_json::Value;

use crate::format::{render_timestamp, timestamp_from_millis};

/// Column orders for the flat projections. Rows produced by the reducers in
/// this module are aligned to these, in discovery order, unsorted.
pub const FILE_BROWSE_COLUMNS: [&str; 4] = ["name", "modified", "size", "path"];
pub const STEP_COLUMNS: [&str; 6] = [
    "Name",
    "Tool",
    "Operation",
    "Status",
    "Started On",
    "Completed On",
];
pub const STEP_FILE_COLUMNS: [&str; 7] = [
    "Id",
    "Step",
    "Tool",
    "Type",
    "Output Part Key",
    "Name",
    "Size",
];
pub const WORKFLOW_COLUMNS: [&str; 7] = [
    "Id",
    "Version",
    "Updated On",
    "Executed On",
    "Name",
    "Description",
    "Task Type",
];
pub const CATALOG_COLUMNS: [&str; 7] = [
    "Id",
    "Name",
    "Description",
    "Size",
    "Entities",
    "Table Name",
    "Created On",
];

fn field_str<'a>(record: &'a Value, key: &'static str) -> Result<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("missing or invalid `{key}`"))
}

fn field_i64(record: &Value, key: &'static str) -> Result<i64> {
    record
        .get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| anyhow!("missing or invalid `{key}`"))
}

fn optional_millis(record: &Value, key: &str) -> Option<f64> {
    record.get(key).and_then(Value::as_f64)
}

fn rendered_or_empty(record: &Value, key: &str) -> Value {
    match render_timestamp(timestamp_from_millis(optional_millis(record, key))) {
        Some(text) => Value::String(text),
        None => Value::String(String::new()),
    }
}

/// Walks a folder tree `{files?: [..], folders?: [node]}` and emits one row
/// per file found at any depth. Non-object nodes contribute nothing; a node
/// whose `folders` value is missing or not an array is a leaf. An explicit
/// worklist keeps adversarially deep trees from exhausting the stack.
pub fn file_system_rows(tree: &Value) -> Result<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    let mut pending = vec![tree];

    while let Some(node) = pending.pop() {
        let Some(map) = node.as_object() else {
            continue;
        };

        match map.get("files") {
            None => {}
            Some(Value::Array(files)) => {
                for file in files {
                    let modified =
                        render_timestamp(timestamp_from_millis(optional_millis(file, "modified")))
                            .map(Value::String)
                            .unwrap_or(Value::Null);
                    rows.push(vec![
                        Value::from(field_str(file, "name")?),
                        modified,
                        Value::from(field_i64(file, "size")?),
                        Value::from(field_str(file, "path")?),
                    ]);
                }
            }
            Some(_) => return Err(anyhow!("`files` must be an array")),
        }

        if let Some(folders) = map.get("folders").and_then(Value::as_array) {
            // reversed so the worklist pops children in listing order
            for folder in folders.iter().rev() {
                pending.push(folder);
            }
        }
    }

    Ok(rows)
}

/// One row per execution step, ignoring its files.
pub fn step_rows(execution: &Value) -> Result<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    let Some(steps) = execution.get("steps").and_then(Value::as_array) else {
        return Ok(rows);
    };

    for step in steps {
        if !step.is_object() {
            continue;
        }
        rows.push(vec![
            Value::from(field_str(step, "name")?),
            Value::from(field_str(step, "tool")?),
            Value::from(field_str(step, "operation")?),
            Value::from(field_str(step, "status")?),
            rendered_or_empty(step, "startedOn"),
            rendered_or_empty(step, "completedOn"),
        ]);
    }

    Ok(rows)
}

/// One row per file of every execution step carrying a `files` list, with the
/// originating step's name and tool attached. Steps without a `files` key
/// contribute nothing.
pub fn step_file_rows(execution: &Value) -> Result<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    let Some(steps) = execution.get("steps").and_then(Value::as_array) else {
        return Ok(rows);
    };

    for step in steps {
        let Some(map) = step.as_object() else {
            continue;
        };
        let Some(files) = map.get("files") else {
            continue;
        };
        let files = files
            .as_array()
            .ok_or_else(|| anyhow!("`files` must be an array"))?;

        let step_name = field_str(step, "name")?;
        let tool = field_str(step, "tool")?;
        for file in files {
            rows.push(vec![
                Value::from(field_i64(file, "id")?),
                Value::from(step_name),
                Value::from(tool),
                Value::from(field_str(file, "type")?),
                Value::from(file.get("outputPartKey").and_then(Value::as_str).unwrap_or("")),
                Value::from(field_str(file, "name")?),
                Value::from(field_i64(file, "size")?),
            ]);
        }
    }

    Ok(rows)
}

fn workflow_row(record: &Value) -> Result<Vec<Value>> {
    Ok(vec![
        Value::from(field_i64(record, "id")?),
        Value::from(field_i64(record, "version")?),
        rendered_or_empty(record, "updatedOn"),
        rendered_or_empty(record, "executedOn"),
        Value::from(field_str(record, "name")?),
        record.get("description").cloned().unwrap_or(Value::Null),
        record.get("taskType").cloned().unwrap_or(Value::Null),
    ])
}

/// One row per workflow catalog item. An item carrying a `revisions` list
/// contributes one row per historical revision instead of itself.
pub fn workflow_rows(items: &Value) -> Result<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    let Some(items) = items.as_array() else {
        return Ok(rows);
    };

    for item in items {
        match item.get("revisions") {
            None => rows.push(workflow_row(item)?),
            Some(Value::Array(revisions)) => {
                for revision in revisions {
                    rows.push(workflow_row(revision)?);
                }
            }
            Some(_) => return Err(anyhow!("`revisions` must be an array")),
        }
    }

    Ok(rows)
}

/// One row per catalog resource item.
pub fn catalog_rows(items: &Value) -> Result<Vec<Vec<Value>>> {
    let mut rows = Vec::new();
    let Some(items) = items.as_array() else {
        return Ok(rows);
    };

    for item in items {
        rows.push(vec![
            Value::from(field_i64(item, "id")?),
            Value::from(field_str(item, "name")?),
            item.get("description").cloned().unwrap_or(Value::Null),
            Value::from(field_i64(item, "size")?),
            item.get("numberOfEntities").cloned().unwrap_or(Value::Null),
            item.get("tableName").cloned().unwrap_or(Value::Null),
            rendered_or_empty(item, "createdOn"),
        ]);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_tree_yields_no_rows() {
        assert!(file_system_rows(&json!({})).unwrap().is_empty());
        assert!(file_system_rows(&json!(null)).unwrap().is_empty());
        assert!(file_system_rows(&json!([1, 2])).unwrap().is_empty());
    }

    #[test]
    fn files_are_collected_in_listing_order() {
        let tree = json!({
            "files": [
                { "name": "a.csv", "modified": 0, "size": 10, "path": "/a.csv" }
            ],
            "folders": [
                {
                    "files": [
                        { "name": "b.csv", "modified": 1000, "size": 20, "path": "/one/b.csv" }
                    ]
                },
                {
                    "files": [
                        { "name": "c.csv", "modified": null, "size": 30, "path": "/two/c.csv" }
                    ]
                }
            ]
        });
        let rows = file_system_rows(&tree).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r[0].as_str().unwrap()).collect();
        assert_eq!(names, ["a.csv", "b.csv", "c.csv"]);
        assert_eq!(rows[0][1], json!("1970-01-01T00:00:00Z"));
        assert_eq!(rows[2][1], Value::Null);
    }

    #[test]
    fn folders_value_that_is_not_a_list_makes_a_leaf() {
        let tree = json!({
            "files": [{ "name": "a", "size": 1, "path": "/a" }],
            "folders": "oops"
        });
        assert_eq!(file_system_rows(&tree).unwrap().len(), 1);
    }

    #[test]
    fn file_missing_name_is_a_fault() {
        let tree = json!({ "files": [{ "size": 1, "path": "/a" }] });
        let err = file_system_rows(&tree).unwrap_err();
        assert!(err.to_string().contains("`name`"));
    }

    #[test]
    fn steps_without_files_contribute_nothing() {
        let execution = json!({
            "steps": [
                { "name": "transform", "tool": "TRIPLEGEO" },
                {
                    "name": "link",
                    "tool": "LIMES",
                    "files": [
                        { "id": 3, "type": "OUTPUT", "outputPartKey": "accepted",
                          "name": "links.nt", "size": 42 }
                    ]
                }
            ]
        });
        let rows = step_file_rows(&execution).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], json!(3));
        assert_eq!(rows[0][1], json!("link"));
        assert_eq!(rows[0][4], json!("accepted"));
    }

    #[test]
    fn execution_without_steps_key_is_empty() {
        assert!(step_rows(&json!({})).unwrap().is_empty());
        assert!(step_file_rows(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn null_part_key_renders_empty() {
        let execution = json!({
            "steps": [{
                "name": "t", "tool": "TRIPLEGEO",
                "files": [
                    { "id": 1, "type": "KPI", "outputPartKey": null, "name": "kpi.json", "size": 5 }
                ]
            }]
        });
        let rows = step_file_rows(&execution).unwrap();
        assert_eq!(rows[0][4], json!(""));
    }

    #[test]
    fn revisions_replace_their_item() {
        let items = json!([
            { "id": 1, "version": 3, "name": "workflow-a",
              "revisions": [
                  { "id": 1, "version": 1, "name": "workflow-a" },
                  { "id": 1, "version": 2, "name": "workflow-a" },
                  { "id": 1, "version": 3, "name": "workflow-a" }
              ] },
            { "id": 2, "version": 1, "name": "workflow-b" }
        ]);
        let rows = workflow_rows(&items).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][1], json!(1));
        assert_eq!(rows[3][0], json!(2));
    }
}
