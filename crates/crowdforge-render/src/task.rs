//! Template resolution for task instances.
//!
//! Template fields are minijinja templates rendered against the instance
//! parameters:
//! ```json
//! { "title": "Write a paragraph about {{ topic }}", "body": "<ul>{{ list }}</ul>" }
//! ```
//! Undefined parameters are an error rather than an empty string, so a
//! template wired to the wrong role fails before anything is posted.
//! Parameter values are inserted verbatim; fragments built by
//! [`list_items`](crate::list_items) are already escaped.

use crowdforge_model::{Params, TaskTemplate};
use minijinja::{Environment, UndefinedBehavior, Value};

use crate::error::RenderError;

/// Rendered content of a task instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTask {
  pub title: String,
  pub description: String,
  pub body: String,
}

/// Render `template` against `params`.
pub fn render_task(template: &TaskTemplate, params: &Params) -> Result<RenderedTask, RenderError> {
  let mut env = Environment::new();
  env.set_undefined_behavior(UndefinedBehavior::Strict);

  let ctx = Value::from_serialize(params);

  Ok(RenderedTask {
    title: render_field(&env, template, "title", &template.title, &ctx)?,
    description: render_field(&env, template, "description", &template.description, &ctx)?,
    body: render_field(&env, template, "body", &template.body, &ctx)?,
  })
}

fn render_field(
  env: &Environment,
  template: &TaskTemplate,
  field: &'static str,
  source: &str,
  ctx: &Value,
) -> Result<String, RenderError> {
  env
    .render_str(source, ctx.clone())
    .map_err(|e| RenderError::Template {
      template: template.name.clone(),
      field,
      message: e.to_string(),
    })
}
