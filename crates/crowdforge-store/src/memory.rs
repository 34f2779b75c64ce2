use std::collections::HashSet;

use async_trait::async_trait;
use crowdforge_model::{
  InstanceRecord, Problem, ProblemStatus, Role, TaskInstance, TaskResult, TaskTemplate,
};
use tokio::sync::RwLock;

use crate::{Error, Store};

#[derive(Default)]
struct Inner {
  templates: Vec<TaskTemplate>,
  problems: Vec<Problem>,
  tasks: Vec<TaskInstance>,
  results: Vec<TaskResult>,
  assignments: HashSet<String>,
}

impl Inner {
  fn problem_mut(&mut self, problem_id: &str) -> Result<&mut Problem, Error> {
    self
      .problems
      .iter_mut()
      .find(|p| p.problem_id == problem_id)
      .ok_or_else(|| Error::NotFound(format!("problem {}", problem_id)))
  }

  fn task_mut(&mut self, task_id: &str) -> Result<&mut TaskInstance, Error> {
    self
      .tasks
      .iter_mut()
      .find(|t| t.task_id == task_id)
      .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))
  }
}

/// In-process store. Records live as long as the store does.
///
/// Records keep insertion order, which is the creation order the engine
/// relies on.
#[derive(Default)]
pub struct MemoryStore {
  inner: RwLock<Inner>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn create_template(&self, template: &TaskTemplate) -> Result<(), Error> {
    self.inner.write().await.templates.push(template.clone());
    Ok(())
  }

  async fn get_template(&self, template_id: &str) -> Result<TaskTemplate, Error> {
    self
      .inner
      .read()
      .await
      .templates
      .iter()
      .find(|t| t.template_id == template_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("template {}", template_id)))
  }

  async fn list_templates(&self) -> Result<Vec<TaskTemplate>, Error> {
    Ok(self.inner.read().await.templates.clone())
  }

  async fn create_problem(&self, problem: &Problem) -> Result<(), Error> {
    self.inner.write().await.problems.push(problem.clone());
    Ok(())
  }

  async fn get_problem(&self, problem_id: &str) -> Result<Problem, Error> {
    self
      .inner
      .read()
      .await
      .problems
      .iter()
      .find(|p| p.problem_id == problem_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("problem {}", problem_id)))
  }

  async fn list_problems(&self) -> Result<Vec<Problem>, Error> {
    Ok(self.inner.read().await.problems.clone())
  }

  async fn list_active_problems(&self) -> Result<Vec<Problem>, Error> {
    let inner = self.inner.read().await;
    Ok(inner.problems.iter().filter(|p| p.is_active()).cloned().collect())
  }

  async fn advance_stage(
    &self,
    problem_id: &str,
    from: Option<Role>,
    to: Role,
    tasks: &[TaskInstance],
  ) -> Result<bool, Error> {
    let mut inner = self.inner.write().await;
    let problem = inner.problem_mut(problem_id)?;
    if !problem.is_active() || problem.current_stage != from {
      return Ok(false);
    }
    problem.current_stage = Some(to);
    inner.tasks.extend(tasks.iter().cloned());
    Ok(true)
  }

  async fn finish_problem(&self, problem_id: &str, stage: Role) -> Result<bool, Error> {
    let mut inner = self.inner.write().await;
    let problem = inner.problem_mut(problem_id)?;
    if !problem.is_active() || problem.current_stage != Some(stage) {
      return Ok(false);
    }
    problem.status = ProblemStatus::Finished;
    Ok(true)
  }

  async fn stall_problem(&self, problem_id: &str, reason: &str) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    let problem = inner.problem_mut(problem_id)?;
    problem.status = ProblemStatus::Stalled;
    problem.stall_reason = Some(reason.to_string());
    Ok(())
  }

  async fn get_task(&self, task_id: &str) -> Result<TaskInstance, Error> {
    self
      .inner
      .read()
      .await
      .tasks
      .iter()
      .find(|t| t.task_id == task_id)
      .cloned()
      .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))
  }

  async fn list_tasks(&self, problem_id: &str) -> Result<Vec<TaskInstance>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .tasks
        .iter()
        .filter(|t| t.problem_id == problem_id)
        .cloned()
        .collect(),
    )
  }

  async fn list_active_tasks(&self) -> Result<Vec<TaskInstance>, Error> {
    let inner = self.inner.read().await;
    Ok(inner.tasks.iter().filter(|t| t.is_active).cloned().collect())
  }

  async fn assign_external_id(&self, task_id: &str, external_id: &str) -> Result<(), Error> {
    let mut inner = self.inner.write().await;
    inner.task_mut(task_id)?.external_id = Some(external_id.to_string());
    Ok(())
  }

  async fn deactivate_task(&self, task_id: &str) -> Result<bool, Error> {
    let mut inner = self.inner.write().await;
    let task = inner.task_mut(task_id)?;
    let was_active = task.is_active;
    task.is_active = false;
    Ok(was_active)
  }

  async fn has_result(&self, assignment_id: &str) -> Result<bool, Error> {
    Ok(self.inner.read().await.assignments.contains(assignment_id))
  }

  async fn record_result(&self, result: &TaskResult) -> Result<bool, Error> {
    let mut inner = self.inner.write().await;
    if !inner.assignments.insert(result.assignment_id.clone()) {
      return Ok(false);
    }
    inner.results.push(result.clone());
    Ok(true)
  }

  async fn list_results(&self, task_id: &str) -> Result<Vec<TaskResult>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .results
        .iter()
        .filter(|r| r.task_id == task_id)
        .cloned()
        .collect(),
    )
  }

  async fn problem_history(&self, problem_id: &str) -> Result<Vec<InstanceRecord>, Error> {
    let inner = self.inner.read().await;
    Ok(
      inner
        .tasks
        .iter()
        .filter(|t| t.problem_id == problem_id)
        .map(|t| InstanceRecord {
          instance: t.clone(),
          results: inner
            .results
            .iter()
            .filter(|r| r.task_id == t.task_id)
            .cloned()
            .collect(),
        })
        .collect(),
    )
  }
}
