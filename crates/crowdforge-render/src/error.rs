/// Errors produced while rendering worker-facing content.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
  /// A template field failed to render, e.g. it references a missing parameter.
  #[error("failed to render {field} of template '{template}': {message}")]
  Template {
    template: String,
    field: &'static str,
    message: String,
  },

  /// Built-in markup failed to render.
  #[error("failed to render markup: {0}")]
  Markup(#[from] minijinja::Error),
}
