use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::flow::FlowKind;
use crate::problem::ProblemDef;
use crate::template::TaskTemplateDef;

/// A definitions file: task templates and the problems that use them.
///
/// ```json
/// {
///   "templates": [
///     { "name": "outline", "title": "Outline an article", "description": "...", "body": "..." }
///   ],
///   "problems": [
///     { "name": "article", "flow": "basic", "partition": "outline", "mapper": "facts", "reducer": "paragraph" }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgeDef {
  #[serde(default)]
  pub templates: Vec<TaskTemplateDef>,
  #[serde(default)]
  pub problems: Vec<ProblemDef>,
}

impl ForgeDef {
  /// Parse and validate a definitions document.
  pub fn from_json(content: &str) -> Result<Self, ConfigError> {
    let def: ForgeDef = serde_json::from_str(content)?;
    def.validate()?;
    Ok(def)
  }

  pub fn template(&self, name: &str) -> Option<&TaskTemplateDef> {
    self.templates.iter().find(|t| t.name == name)
  }

  /// Check names, references and the roles each flow kind requires.
  pub fn validate(&self) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for template in &self.templates {
      if !names.insert(template.name.as_str()) {
        return Err(ConfigError::DuplicateTemplate(template.name.clone()));
      }
      if template.max_assignments == 0 {
        return Err(ConfigError::ZeroCapacity(template.name.clone()));
      }
    }

    let mut problems = HashSet::new();
    for problem in &self.problems {
      if !problems.insert(problem.name.as_str()) {
        return Err(ConfigError::DuplicateProblem(problem.name.clone()));
      }

      for (_, template) in problem.template_refs() {
        if !names.contains(template) {
          return Err(ConfigError::UnknownTemplate {
            problem: problem.name.clone(),
            template: template.to_string(),
          });
        }
      }

      if problem.flow == FlowKind::VerifiedPartition && problem.partition_verify.is_none() {
        return Err(ConfigError::MissingRole {
          problem: problem.name.clone(),
          flow: problem.flow.to_string(),
          role: "partition_verify",
        });
      }

      if problem.flow != FlowKind::Basic && problem.partition2.is_some() {
        return Err(ConfigError::UnsupportedRole {
          problem: problem.name.clone(),
          flow: problem.flow.to_string(),
          role: "partition2",
        });
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn defs(flow: &str, extra: &str) -> String {
    format!(
      r#"{{
        "templates": [
          {{ "name": "p", "title": "Outline", "description": "d", "body": "b" }},
          {{ "name": "m", "title": "Facts about {{{{ topic }}}}", "description": "d", "body": "b", "max_assignments": 3 }},
          {{ "name": "r", "title": "Paragraph", "description": "d", "body": "{{{{ list }}}}" }},
          {{ "name": "v", "title": "Rate", "description": "d", "body": "{{{{ partitions }}}}" }}
        ],
        "problems": [
          {{ "name": "article", "flow": "{flow}", "partition": "p", "mapper": "m", "reducer": "r"{extra} }}
        ]
      }}"#
    )
  }

  #[test]
  fn test_parse_applies_template_defaults() {
    let def = ForgeDef::from_json(&defs("basic", "")).unwrap();

    let p = def.template("p").unwrap();
    assert_eq!(p.max_assignments, 1);
    assert_eq!(p.payment_cents, 5);
    assert_eq!(p.duration_seconds, 30);
    assert_eq!(p.approval_delay_seconds, 180);
    assert_eq!(p.lifetime_seconds, 1440);
    assert!(p.keywords.is_empty());

    assert_eq!(def.template("m").unwrap().max_assignments, 3);
    assert_eq!(def.template("m").unwrap().title, "Facts about {{ topic }}");
    assert_eq!(def.problems[0].flow, FlowKind::Basic);
  }

  #[test]
  fn test_verified_partition_requires_verify_template() {
    let err = ForgeDef::from_json(&defs("verified_partition", "")).unwrap_err();
    assert!(matches!(
      err,
      ConfigError::MissingRole {
        role: "partition_verify",
        ..
      }
    ));

    let ok = ForgeDef::from_json(&defs("verified_partition", r#", "partition_verify": "v""#));
    assert!(ok.is_ok());
  }

  #[test]
  fn test_partition2_only_on_basic() {
    let table = r#", "partition2": "p""#;
    assert!(ForgeDef::from_json(&defs("basic", table)).is_ok());

    let err = ForgeDef::from_json(&defs("partition_selection_experiment", table)).unwrap_err();
    assert!(matches!(
      err,
      ConfigError::UnsupportedRole {
        role: "partition2",
        ..
      }
    ));

    let verified = format!(r#"{table}, "partition_verify": "v""#);
    let err = ForgeDef::from_json(&defs("verified_partition", &verified)).unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedRole { .. }));
  }

  #[test]
  fn test_unknown_template_reference() {
    let err = ForgeDef::from_json(&defs("basic", r#", "partition2": "missing""#)).unwrap_err();
    assert!(matches!(
      err,
      ConfigError::UnknownTemplate { ref template, .. } if template == "missing"
    ));
  }

  #[test]
  fn test_duplicate_template_name() {
    let mut def = ForgeDef::from_json(&defs("basic", "")).unwrap();
    let copy = def.templates[0].clone();
    def.templates.push(copy);

    assert!(matches!(
      def.validate(),
      Err(ConfigError::DuplicateTemplate(name)) if name == "p"
    ));
  }

  #[test]
  fn test_zero_capacity_rejected() {
    let mut def = ForgeDef::from_json(&defs("basic", "")).unwrap();
    def.templates[1].max_assignments = 0;

    assert!(matches!(def.validate(), Err(ConfigError::ZeroCapacity(name)) if name == "m"));
  }
}
