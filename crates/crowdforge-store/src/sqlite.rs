use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crowdforge_model::{
  FlowKind, InstanceRecord, Params, Problem, ProblemStatus, ResultValue, Role, RoleBindings,
  TaskInstance, TaskResult, TaskTemplate,
};
use sqlx::{FromRow, SqlitePool};

use crate::{Error, Store};

const TEMPLATE_COLUMNS: &str = "template_id, name, title, description, body, keywords, \
  max_assignments, payment_cents, duration_seconds, approval_delay_seconds, lifetime_seconds";

const PROBLEM_COLUMNS: &str = "problem_id, name, flow, current_stage, status, stall_reason, \
  partition_template, partition2_template, mapper_template, reducer_template, \
  partition_verify_template, mapper_verify_template, reducer_verify_template";

const TASK_COLUMNS: &str = "task_id, external_id, template_id, problem_id, role, params, \
  title, description, body, is_active, created_at";

const RESULT_COLUMNS: &str = "result_id, assignment_id, task_id, value, created_at";

/// SQLite-based store implementation.
pub struct SqliteStore {
  pool: SqlitePool,
}

impl SqliteStore {
  /// Create a new SQLite store with the given connection pool.
  pub fn new(pool: SqlitePool) -> Self {
    Self { pool }
  }

  /// Run database migrations.
  pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(&self.pool).await
  }
}

fn corrupt(what: &str, id: &str, err: impl std::fmt::Display) -> Error {
  Error::Corrupt(format!("{} {}: {}", what, id, err))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, Error> {
  serde_json::to_string(value).map_err(|e| Error::Corrupt(e.to_string()))
}

#[derive(FromRow)]
struct TemplateRow {
  template_id: String,
  name: String,
  title: String,
  description: String,
  body: String,
  keywords: String,
  max_assignments: i64,
  payment_cents: i64,
  duration_seconds: i64,
  approval_delay_seconds: i64,
  lifetime_seconds: i64,
}

impl TryFrom<TemplateRow> for TaskTemplate {
  type Error = Error;

  fn try_from(row: TemplateRow) -> Result<Self, Error> {
    let id = row.template_id.as_str();
    Ok(TaskTemplate {
      keywords: serde_json::from_str(&row.keywords).map_err(|e| corrupt("template", id, e))?,
      max_assignments: u32::try_from(row.max_assignments)
        .map_err(|e| corrupt("template", id, e))?,
      payment_cents: u32::try_from(row.payment_cents).map_err(|e| corrupt("template", id, e))?,
      duration_seconds: u64::try_from(row.duration_seconds)
        .map_err(|e| corrupt("template", id, e))?,
      approval_delay_seconds: u64::try_from(row.approval_delay_seconds)
        .map_err(|e| corrupt("template", id, e))?,
      lifetime_seconds: u64::try_from(row.lifetime_seconds)
        .map_err(|e| corrupt("template", id, e))?,
      template_id: row.template_id,
      name: row.name,
      title: row.title,
      description: row.description,
      body: row.body,
    })
  }
}

#[derive(FromRow)]
struct ProblemRow {
  problem_id: String,
  name: String,
  flow: String,
  current_stage: Option<String>,
  status: String,
  stall_reason: Option<String>,
  partition_template: String,
  partition2_template: Option<String>,
  mapper_template: String,
  reducer_template: String,
  partition_verify_template: Option<String>,
  mapper_verify_template: Option<String>,
  reducer_verify_template: Option<String>,
}

impl TryFrom<ProblemRow> for Problem {
  type Error = Error;

  fn try_from(row: ProblemRow) -> Result<Self, Error> {
    let id = row.problem_id.as_str();
    let flow = FlowKind::from_name(&row.flow)
      .ok_or_else(|| corrupt("problem", id, format!("unknown flow {}", row.flow)))?;
    let current_stage = row
      .current_stage
      .as_deref()
      .map(str::parse::<Role>)
      .transpose()
      .map_err(|e| corrupt("problem", id, e))?;
    let status: ProblemStatus = row.status.parse().map_err(|e| corrupt("problem", id, e))?;

    Ok(Problem {
      problem_id: row.problem_id,
      name: row.name,
      flow,
      current_stage,
      status,
      stall_reason: row.stall_reason,
      roles: RoleBindings {
        partition: row.partition_template,
        partition2: row.partition2_template,
        mapper: row.mapper_template,
        reducer: row.reducer_template,
        partition_verify: row.partition_verify_template,
        mapper_verify: row.mapper_verify_template,
        reducer_verify: row.reducer_verify_template,
      },
    })
  }
}

#[derive(FromRow)]
struct TaskRow {
  task_id: String,
  external_id: Option<String>,
  template_id: String,
  problem_id: String,
  role: String,
  params: String,
  title: String,
  description: String,
  body: String,
  is_active: bool,
  created_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for TaskInstance {
  type Error = Error;

  fn try_from(row: TaskRow) -> Result<Self, Error> {
    let id = row.task_id.as_str();
    let role: Role = row.role.parse().map_err(|e| corrupt("task", id, e))?;
    let params: Params = serde_json::from_str(&row.params).map_err(|e| corrupt("task", id, e))?;

    Ok(TaskInstance {
      task_id: row.task_id,
      external_id: row.external_id,
      template_id: row.template_id,
      problem_id: row.problem_id,
      role,
      params,
      title: row.title,
      description: row.description,
      body: row.body,
      is_active: row.is_active,
      created_at: row.created_at,
    })
  }
}

#[derive(FromRow)]
struct ResultRow {
  result_id: String,
  assignment_id: String,
  task_id: String,
  value: String,
  created_at: DateTime<Utc>,
}

impl TryFrom<ResultRow> for TaskResult {
  type Error = Error;

  fn try_from(row: ResultRow) -> Result<Self, Error> {
    let value: ResultValue =
      serde_json::from_str(&row.value).map_err(|e| corrupt("result", &row.result_id, e))?;

    Ok(TaskResult {
      result_id: row.result_id,
      assignment_id: row.assignment_id,
      task_id: row.task_id,
      value,
      created_at: row.created_at,
    })
  }
}

fn convert<R, T>(rows: Vec<R>) -> Result<Vec<T>, Error>
where
  T: TryFrom<R, Error = Error>,
{
  rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl Store for SqliteStore {
  async fn create_template(&self, template: &TaskTemplate) -> Result<(), Error> {
    sqlx::query(&format!(
      "INSERT INTO task_templates ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
      TEMPLATE_COLUMNS
    ))
    .bind(&template.template_id)
    .bind(&template.name)
    .bind(&template.title)
    .bind(&template.description)
    .bind(&template.body)
    .bind(to_json(&template.keywords)?)
    .bind(i64::from(template.max_assignments))
    .bind(i64::from(template.payment_cents))
    .bind(template.duration_seconds as i64)
    .bind(template.approval_delay_seconds as i64)
    .bind(template.lifetime_seconds as i64)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_template(&self, template_id: &str) -> Result<TaskTemplate, Error> {
    let row: Option<TemplateRow> = sqlx::query_as(&format!(
      "SELECT {} FROM task_templates WHERE template_id = ?",
      TEMPLATE_COLUMNS
    ))
    .bind(template_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .ok_or_else(|| Error::NotFound(format!("template {}", template_id)))?
      .try_into()
  }

  async fn list_templates(&self) -> Result<Vec<TaskTemplate>, Error> {
    let rows: Vec<TemplateRow> = sqlx::query_as(&format!(
      "SELECT {} FROM task_templates ORDER BY rowid",
      TEMPLATE_COLUMNS
    ))
    .fetch_all(&self.pool)
    .await?;

    convert(rows)
  }

  async fn create_problem(&self, problem: &Problem) -> Result<(), Error> {
    sqlx::query(&format!(
      "INSERT INTO problems ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
      PROBLEM_COLUMNS
    ))
    .bind(&problem.problem_id)
    .bind(&problem.name)
    .bind(problem.flow.as_str())
    .bind(problem.current_stage.map(|r| r.as_str()))
    .bind(problem.status.as_str())
    .bind(&problem.stall_reason)
    .bind(&problem.roles.partition)
    .bind(&problem.roles.partition2)
    .bind(&problem.roles.mapper)
    .bind(&problem.roles.reducer)
    .bind(&problem.roles.partition_verify)
    .bind(&problem.roles.mapper_verify)
    .bind(&problem.roles.reducer_verify)
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn get_problem(&self, problem_id: &str) -> Result<Problem, Error> {
    let row: Option<ProblemRow> = sqlx::query_as(&format!(
      "SELECT {} FROM problems WHERE problem_id = ?",
      PROBLEM_COLUMNS
    ))
    .bind(problem_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .ok_or_else(|| Error::NotFound(format!("problem {}", problem_id)))?
      .try_into()
  }

  async fn list_problems(&self) -> Result<Vec<Problem>, Error> {
    let rows: Vec<ProblemRow> =
      sqlx::query_as(&format!("SELECT {} FROM problems ORDER BY rowid", PROBLEM_COLUMNS))
        .fetch_all(&self.pool)
        .await?;

    convert(rows)
  }

  async fn list_active_problems(&self) -> Result<Vec<Problem>, Error> {
    let rows: Vec<ProblemRow> = sqlx::query_as(&format!(
      "SELECT {} FROM problems WHERE status = 'active' ORDER BY rowid",
      PROBLEM_COLUMNS
    ))
    .fetch_all(&self.pool)
    .await?;

    convert(rows)
  }

  async fn advance_stage(
    &self,
    problem_id: &str,
    from: Option<Role>,
    to: Role,
    tasks: &[TaskInstance],
  ) -> Result<bool, Error> {
    let mut tx = self.pool.begin().await?;

    let updated = sqlx::query(
      r#"
            UPDATE problems
            SET current_stage = ?
            WHERE problem_id = ? AND status = 'active' AND current_stage IS ?
            "#,
    )
    .bind(to.as_str())
    .bind(problem_id)
    .bind(from.map(|r| r.as_str()))
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
      tx.rollback().await?;
      return Ok(false);
    }

    for task in tasks {
      sqlx::query(&format!(
        "INSERT INTO task_instances ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        TASK_COLUMNS
      ))
      .bind(&task.task_id)
      .bind(&task.external_id)
      .bind(&task.template_id)
      .bind(&task.problem_id)
      .bind(task.role.as_str())
      .bind(to_json(&task.params)?)
      .bind(&task.title)
      .bind(&task.description)
      .bind(&task.body)
      .bind(task.is_active)
      .bind(task.created_at)
      .execute(&mut *tx)
      .await?;
    }

    tx.commit().await?;
    Ok(true)
  }

  async fn finish_problem(&self, problem_id: &str, stage: Role) -> Result<bool, Error> {
    let updated = sqlx::query(
      r#"
            UPDATE problems
            SET status = 'finished'
            WHERE problem_id = ? AND status = 'active' AND current_stage = ?
            "#,
    )
    .bind(problem_id)
    .bind(stage.as_str())
    .execute(&self.pool)
    .await?;

    Ok(updated.rows_affected() == 1)
  }

  async fn stall_problem(&self, problem_id: &str, reason: &str) -> Result<(), Error> {
    let updated = sqlx::query(
      r#"
            UPDATE problems
            SET status = 'stalled', stall_reason = ?
            WHERE problem_id = ?
            "#,
    )
    .bind(reason)
    .bind(problem_id)
    .execute(&self.pool)
    .await?;

    if updated.rows_affected() == 0 {
      return Err(Error::NotFound(format!("problem {}", problem_id)));
    }
    Ok(())
  }

  async fn get_task(&self, task_id: &str) -> Result<TaskInstance, Error> {
    let row: Option<TaskRow> = sqlx::query_as(&format!(
      "SELECT {} FROM task_instances WHERE task_id = ?",
      TASK_COLUMNS
    ))
    .bind(task_id)
    .fetch_optional(&self.pool)
    .await?;

    row
      .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?
      .try_into()
  }

  async fn list_tasks(&self, problem_id: &str) -> Result<Vec<TaskInstance>, Error> {
    let rows: Vec<TaskRow> = sqlx::query_as(&format!(
      "SELECT {} FROM task_instances WHERE problem_id = ? ORDER BY created_at ASC, rowid ASC",
      TASK_COLUMNS
    ))
    .bind(problem_id)
    .fetch_all(&self.pool)
    .await?;

    convert(rows)
  }

  async fn list_active_tasks(&self) -> Result<Vec<TaskInstance>, Error> {
    let rows: Vec<TaskRow> = sqlx::query_as(&format!(
      "SELECT {} FROM task_instances WHERE is_active = 1 ORDER BY created_at ASC, rowid ASC",
      TASK_COLUMNS
    ))
    .fetch_all(&self.pool)
    .await?;

    convert(rows)
  }

  async fn assign_external_id(&self, task_id: &str, external_id: &str) -> Result<(), Error> {
    let updated = sqlx::query("UPDATE task_instances SET external_id = ? WHERE task_id = ?")
      .bind(external_id)
      .bind(task_id)
      .execute(&self.pool)
      .await?;

    if updated.rows_affected() == 0 {
      return Err(Error::NotFound(format!("task {}", task_id)));
    }
    Ok(())
  }

  async fn deactivate_task(&self, task_id: &str) -> Result<bool, Error> {
    let updated =
      sqlx::query("UPDATE task_instances SET is_active = 0 WHERE task_id = ? AND is_active = 1")
        .bind(task_id)
        .execute(&self.pool)
        .await?;

    if updated.rows_affected() == 1 {
      return Ok(true);
    }
    // Distinguish "already resolved" from "no such task".
    self.get_task(task_id).await.map(|_| false)
  }

  async fn has_result(&self, assignment_id: &str) -> Result<bool, Error> {
    let found: Option<(String,)> =
      sqlx::query_as("SELECT result_id FROM task_results WHERE assignment_id = ?")
        .bind(assignment_id)
        .fetch_optional(&self.pool)
        .await?;

    Ok(found.is_some())
  }

  async fn record_result(&self, result: &TaskResult) -> Result<bool, Error> {
    let inserted = sqlx::query(&format!(
      "INSERT OR IGNORE INTO task_results ({}) VALUES (?, ?, ?, ?, ?)",
      RESULT_COLUMNS
    ))
    .bind(&result.result_id)
    .bind(&result.assignment_id)
    .bind(&result.task_id)
    .bind(to_json(&result.value)?)
    .bind(result.created_at)
    .execute(&self.pool)
    .await?;

    Ok(inserted.rows_affected() == 1)
  }

  async fn list_results(&self, task_id: &str) -> Result<Vec<TaskResult>, Error> {
    let rows: Vec<ResultRow> = sqlx::query_as(&format!(
      "SELECT {} FROM task_results WHERE task_id = ? ORDER BY created_at ASC, rowid ASC",
      RESULT_COLUMNS
    ))
    .bind(task_id)
    .fetch_all(&self.pool)
    .await?;

    convert(rows)
  }

  async fn problem_history(&self, problem_id: &str) -> Result<Vec<InstanceRecord>, Error> {
    let tasks = self.list_tasks(problem_id).await?;

    let rows: Vec<ResultRow> = sqlx::query_as(
      r#"
            SELECT r.result_id, r.assignment_id, r.task_id, r.value, r.created_at
            FROM task_results r
            JOIN task_instances t ON t.task_id = r.task_id
            WHERE t.problem_id = ?
            ORDER BY r.created_at ASC, r.rowid ASC
            "#,
    )
    .bind(problem_id)
    .fetch_all(&self.pool)
    .await?;

    let mut by_task: HashMap<String, Vec<TaskResult>> = HashMap::new();
    for row in rows {
      let result = TaskResult::try_from(row)?;
      by_task.entry(result.task_id.clone()).or_default().push(result);
    }

    Ok(
      tasks
        .into_iter()
        .map(|instance| InstanceRecord {
          results: by_task.remove(&instance.task_id).unwrap_or_default(),
          instance,
        })
        .collect(),
    )
  }
}
