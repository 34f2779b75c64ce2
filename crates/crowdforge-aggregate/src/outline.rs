//! Partition aggregation.
//!
//! A partition result is an outline: form fields whose values are part
//! labels. Only the first submitted result counts; later submissions for the
//! same partition task are ignored.

use std::cmp::Ordering;

use crowdforge_model::{Params, ResultValue, TaskResult, value_text};
use serde::{Deserialize, Serialize};

/// One independent sub-part of a problem, to be mapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
  /// A single outline entry.
  Outline(String),
  /// A (row, column) pair of a table-style partition.
  Cell { row: String, column: String },
}

impl Part {
  pub fn label(&self) -> String {
    match self {
      Part::Outline(label) => label.clone(),
      Part::Cell { row, column } => format!("{}: {}", row, column),
    }
  }

  /// Parameters for the map instance working on this part.
  pub fn to_params(&self) -> Params {
    let mut params = Params::new();
    params.insert("topic".to_string(), self.label());
    if let Part::Cell { row, column } = self {
      params.insert("row".to_string(), row.clone());
      params.insert("column".to_string(), column.clone());
    }
    params
  }
}

/// Integer-looking keys sort numerically and ahead of any other key, so
/// `"10"` follows `"9"`. Remaining keys sort lexicographically.
fn outline_key_order(a: &str, b: &str) -> Ordering {
  match (a.parse::<u64>(), b.parse::<u64>()) {
    (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
    (Ok(_), Err(_)) => Ordering::Less,
    (Err(_), Ok(_)) => Ordering::Greater,
    (Err(_), Err(_)) => a.cmp(b),
  }
}

/// Labels of one outline value in key order, dropping empty entries.
pub fn outline_labels(value: &ResultValue) -> Vec<String> {
  let mut entries: Vec<(&String, &serde_json::Value)> = value.iter().collect();
  entries.sort_by(|(a, _), (b, _)| outline_key_order(a, b));

  entries
    .into_iter()
    .filter_map(|(_, v)| value_text(v))
    .filter(|label| !label.trim().is_empty())
    .collect()
}

/// Parts of an outline-style partition, taken from the first result.
pub fn outline_parts(results: &[TaskResult]) -> Vec<String> {
  results
    .first()
    .map(|r| outline_labels(&r.value))
    .unwrap_or_default()
}

/// Parts of a table-style partition: the product of the first row-header
/// result and the first column-header result, row-major.
pub fn table_parts(rows: &[TaskResult], columns: &[TaskResult]) -> Vec<Part> {
  let rows = outline_parts(rows);
  let columns = outline_parts(columns);

  rows
    .iter()
    .flat_map(|row| {
      columns.iter().map(move |column| Part::Cell {
        row: row.clone(),
        column: column.clone(),
      })
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::result;
  use serde_json::json;

  #[test]
  fn test_outline_parts_in_key_order() {
    let results = vec![result("r1", json!({ "1": "Body", "0": "Intro", "2": "Conclusion" }))];

    assert_eq!(outline_parts(&results), vec!["Intro", "Body", "Conclusion"]);
  }

  #[test]
  fn test_outline_parts_numeric_keys_sort_numerically() {
    let mut value = serde_json::Map::new();
    for i in 0..12 {
      value.insert(i.to_string(), json!(format!("part {}", i)));
    }
    let results = vec![result("r1", serde_json::Value::Object(value))];

    let parts = outline_parts(&results);
    assert_eq!(parts.len(), 12);
    assert_eq!(parts[2], "part 2");
    assert_eq!(parts[10], "part 10");
  }

  #[test]
  fn test_outline_parts_drop_empty_entries() {
    let results = vec![result(
      "r1",
      json!({ "0": "Intro", "1": "", "2": "   ", "3": null, "4": "End" }),
    )];

    assert_eq!(outline_parts(&results), vec!["Intro", "End"]);
  }

  #[test]
  fn test_outline_parts_use_first_result_only() {
    let results = vec![
      result("r1", json!({ "0": "A" })),
      result("r2", json!({ "0": "B", "1": "C" })),
    ];

    assert_eq!(outline_parts(&results), vec!["A"]);
  }

  #[test]
  fn test_outline_parts_are_idempotent() {
    let results = vec![result("r1", json!({ "b": "x", "a": "y", "0": "z" }))];

    let first = outline_parts(&results);
    assert_eq!(first, vec!["z", "y", "x"]);
    assert_eq!(outline_parts(&results), first);
  }

  #[test]
  fn test_outline_parts_without_results() {
    assert!(outline_parts(&[]).is_empty());
  }

  #[test]
  fn test_table_parts_are_cartesian_over_non_empty_labels() {
    let rows = vec![result("r", json!({ "0": "A", "1": "B" }))];
    let columns = vec![result("c", json!({ "0": "X", "1": "" }))];

    assert_eq!(
      table_parts(&rows, &columns),
      vec![
        Part::Cell {
          row: "A".to_string(),
          column: "X".to_string()
        },
        Part::Cell {
          row: "B".to_string(),
          column: "X".to_string()
        },
      ]
    );
  }

  #[test]
  fn test_table_parts_single_cell() {
    let rows = vec![result("r", json!({ "0": "A", "1": "" }))];
    let columns = vec![result("c", json!({ "0": "X", "1": "" }))];

    assert_eq!(
      table_parts(&rows, &columns),
      vec![Part::Cell {
        row: "A".to_string(),
        column: "X".to_string()
      }]
    );
  }

  #[test]
  fn test_table_parts_missing_axis() {
    let rows = vec![result("r", json!({ "0": "A" }))];
    assert!(table_parts(&rows, &[]).is_empty());
  }

  #[test]
  fn test_part_params() {
    let outline = Part::Outline("Intro".to_string());
    assert_eq!(
      outline.to_params(),
      Params::from([("topic".to_string(), "Intro".to_string())])
    );

    let cell = Part::Cell {
      row: "Paris".to_string(),
      column: "Food".to_string(),
    };
    let params = cell.to_params();
    assert_eq!(params["topic"], "Paris: Food");
    assert_eq!(params["row"], "Paris");
    assert_eq!(params["column"], "Food");
  }
}
