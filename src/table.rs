use std::cmp::Ordering;
use std::fmt;
use std::io::Write;

use anyhow::{anyhow, Result};
use serde_json::Value;

/// A small column-ordered container for uniform records. Rows keep their
/// insertion order until sorted; cells are raw JSON scalars so callers decide
/// presentation (see `format_column`).
#[derive(Debug, Clone, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: &[&str], rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(anyhow!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Stable sort by the named columns, first column outermost.
    pub fn sort_by(&mut self, columns: &[&str], ascending: bool) -> Result<()> {
        let mut indices = Vec::with_capacity(columns.len());
        for name in columns {
            indices.push(
                self.column_index(name)
                    .ok_or_else(|| anyhow!("unknown column `{name}`"))?,
            );
        }
        self.rows.sort_by(|a, b| {
            for &idx in &indices {
                let ordering = compare_cells(&a[idx], &b[idx]);
                if ordering != Ordering::Equal {
                    return if ascending {
                        ordering
                    } else {
                        ordering.reverse()
                    };
                }
            }
            Ordering::Equal
        });
        Ok(())
    }

    /// Selects (and reorders) the named columns into a new table.
    pub fn select(&self, columns: &[&str]) -> Result<Table> {
        let mut indices = Vec::with_capacity(columns.len());
        for name in columns {
            indices.push(
                self.column_index(name)
                    .ok_or_else(|| anyhow!("unknown column `{name}`"))?,
            );
        }
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&idx| row[idx].clone()).collect())
            .collect();
        Ok(Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
    }

    /// Rewrites every cell of one column through `f`.
    pub fn format_column<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&Value) -> Value,
    {
        let idx = self
            .column_index(name)
            .ok_or_else(|| anyhow!("unknown column `{name}`"))?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        Ok(())
    }

    pub fn to_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        out.write_record(&self.columns)?;
        for row in &self.rows {
            out.write_record(row.iter().map(|cell| cell_text(cell)))?;
        }
        out.flush()?;
        Ok(())
    }
}

pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_cells(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => cell_text(a).cmp(&cell_text(b)),
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        let rendered: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| cell_text(cell)).collect())
            .collect();
        for row in &rendered {
            for (idx, cell) in row.iter().enumerate() {
                widths[idx] = widths[idx].max(cell.chars().count());
            }
        }

        for (idx, column) in self.columns.iter().enumerate() {
            if idx > 0 {
                write!(f, "  ")?;
            }
            write!(f, "{column:<width$}", width = widths[idx])?;
        }
        writeln!(f)?;

        for row in &rendered {
            for (idx, cell) in row.iter().enumerate() {
                if idx > 0 {
                    write!(f, "  ")?;
                }
                if idx + 1 == row.len() {
                    write!(f, "{cell}")?;
                } else {
                    write!(f, "{cell:<width$}", width = widths[idx])?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_rows(
            &["Id", "Type", "Name"],
            vec![
                vec![json!(2), json!("OUTPUT"), json!("b.nt")],
                vec![json!(1), json!("OUTPUT"), json!("a.nt")],
                vec![json!(3), json!("LOG"), json!("step.log")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn sort_is_stable_across_columns() {
        let mut table = sample();
        table.sort_by(&["Type", "Id"], true).unwrap();
        let ids: Vec<_> = table.rows().iter().map(|r| r[0].as_i64().unwrap()).collect();
        assert_eq!(ids, [3, 1, 2]);
    }

    #[test]
    fn unknown_sort_column_is_an_error() {
        let mut table = sample();
        assert!(table.sort_by(&["Nope"], true).is_err());
    }

    #[test]
    fn select_reorders_columns() {
        let table = sample().select(&["Name", "Id"]).unwrap();
        assert_eq!(table.columns(), ["Name", "Id"]);
        assert_eq!(table.rows()[0][1], json!(2));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let mut table = Table::new(&["A", "B"]);
        assert!(table.push_row(vec![json!(1)]).is_err());
    }

    #[test]
    fn csv_renders_nulls_empty() {
        let table = Table::from_rows(
            &["Id", "Note"],
            vec![vec![json!(1), Value::Null], vec![json!(2), json!("x")]],
        )
        .unwrap();
        let mut buffer = Vec::new();
        table.to_csv(&mut buffer).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "Id,Note\n1,\n2,x\n");
    }
}
