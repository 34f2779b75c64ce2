//! Resolution of definitions into records with generated identifiers.

use std::collections::HashMap;

use crowdforge_config::{ForgeDef, ProblemDef};

use crate::error::ModelError;
use crate::new_id;
use crate::problem::{Problem, ProblemStatus, RoleBindings};
use crate::template::TaskTemplate;

/// Records produced from one definitions document.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
  pub templates: Vec<TaskTemplate>,
  pub problems: Vec<Problem>,
}

/// Validate `def` and assign identifiers to its templates and problems.
///
/// Problems come out active and not started. Template references are
/// rewritten from names to the generated template ids.
pub fn resolve(def: &ForgeDef) -> Result<Resolved, ModelError> {
  def.validate()?;

  let templates: Vec<TaskTemplate> = def
    .templates
    .iter()
    .map(|t| TaskTemplate {
      template_id: new_id(),
      name: t.name.clone(),
      title: t.title.clone(),
      description: t.description.clone(),
      body: t.body.clone(),
      keywords: t.keywords.clone(),
      max_assignments: t.max_assignments,
      payment_cents: t.payment_cents,
      duration_seconds: t.duration_seconds,
      approval_delay_seconds: t.approval_delay_seconds,
      lifetime_seconds: t.lifetime_seconds,
    })
    .collect();

  let ids: HashMap<&str, &str> = templates
    .iter()
    .map(|t| (t.name.as_str(), t.template_id.as_str()))
    .collect();

  let problems = def
    .problems
    .iter()
    .map(|p| resolve_problem(p, &ids))
    .collect();

  Ok(Resolved {
    templates,
    problems,
  })
}

fn resolve_problem(def: &ProblemDef, ids: &HashMap<&str, &str>) -> Problem {
  // validate() guarantees every reference is present
  let id = |name: &str| ids.get(name).map(|s| s.to_string()).unwrap_or_default();
  let optional = |name: &Option<String>| name.as_deref().map(id);

  Problem {
    problem_id: new_id(),
    name: def.name.clone(),
    flow: def.flow,
    current_stage: None,
    status: ProblemStatus::Active,
    stall_reason: None,
    roles: RoleBindings {
      partition: id(&def.partition),
      partition2: optional(&def.partition2),
      mapper: id(&def.mapper),
      reducer: id(&def.reducer),
      partition_verify: optional(&def.partition_verify),
      mapper_verify: optional(&def.mapper_verify),
      reducer_verify: optional(&def.reducer_verify),
    },
  }
}
