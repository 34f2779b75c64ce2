use crowdforge_model::{TaskResult, value_text};
use crowdforge_render::{RenderError, list_items};

/// The text of `field` in each result, in result order. Results without the
/// field are skipped; duplicates are kept.
pub fn collect_field(results: &[TaskResult], field: &str) -> Vec<String> {
  results
    .iter()
    .filter_map(|r| r.value.get(field).and_then(value_text))
    .collect()
}

/// `field` of every result as a `<li>` fragment, in result order.
pub fn list_fragment(results: &[TaskResult], field: &str) -> Result<String, RenderError> {
  list_items(&collect_field(results, field))
}
