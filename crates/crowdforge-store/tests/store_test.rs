use std::collections::BTreeMap;

use chrono::Utc;
use crowdforge_model::{
  FlowKind, Params, Problem, ProblemStatus, Role, RoleBindings, TaskInstance, TaskResult,
  TaskTemplate, new_id,
};
use crowdforge_store::{Error, MemoryStore, SqliteStore, Store};
use sqlx::sqlite::SqlitePoolOptions;

async fn sqlite_store() -> SqliteStore {
  let pool = SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .unwrap();
  let store = SqliteStore::new(pool);
  store.migrate().await.unwrap();
  store
}

fn template(name: &str) -> TaskTemplate {
  TaskTemplate {
    template_id: new_id(),
    name: name.to_string(),
    title: format!("{} {{{{ topic }}}}", name),
    description: "desc".to_string(),
    body: "<p>{{ topic }}</p>".to_string(),
    keywords: vec!["writing".to_string(), "outline".to_string()],
    max_assignments: 2,
    payment_cents: 5,
    duration_seconds: 30,
    approval_delay_seconds: 180,
    lifetime_seconds: 1440,
  }
}

/// Seed three templates and a basic problem bound to them.
async fn seed(store: &dyn Store) -> Problem {
  let partition = template("partition");
  let mapper = template("mapper");
  let reducer = template("reducer");
  for t in [&partition, &mapper, &reducer] {
    store.create_template(t).await.unwrap();
  }

  let problem = Problem {
    problem_id: new_id(),
    name: "article".to_string(),
    flow: FlowKind::Basic,
    current_stage: None,
    status: ProblemStatus::Active,
    stall_reason: None,
    roles: RoleBindings {
      partition: partition.template_id,
      partition2: None,
      mapper: mapper.template_id,
      reducer: reducer.template_id,
      partition_verify: None,
      mapper_verify: None,
      reducer_verify: None,
    },
  };
  store.create_problem(&problem).await.unwrap();
  problem
}

fn task(problem: &Problem, role: Role, topic: &str) -> TaskInstance {
  TaskInstance {
    task_id: new_id(),
    external_id: None,
    template_id: problem.roles.template_for(role).unwrap().to_string(),
    problem_id: problem.problem_id.clone(),
    role,
    params: Params::from([("topic".to_string(), topic.to_string())]),
    title: format!("title {}", topic),
    description: "desc".to_string(),
    body: "body".to_string(),
    is_active: true,
    created_at: Utc::now(),
  }
}

fn result(task: &TaskInstance, assignment_id: &str, fact: &str) -> TaskResult {
  let mut value = BTreeMap::new();
  value.insert("fact".to_string(), serde_json::json!(fact));
  TaskResult {
    result_id: new_id(),
    assignment_id: assignment_id.to_string(),
    task_id: task.task_id.clone(),
    value,
    created_at: Utc::now(),
  }
}

async fn check_round_trip(store: &dyn Store) {
  let problem = seed(store).await;

  let loaded = store.get_problem(&problem.problem_id).await.unwrap();
  assert_eq!(loaded, problem);

  let templates = store.list_templates().await.unwrap();
  assert_eq!(templates.len(), 3);
  let partition = store.get_template(&problem.roles.partition).await.unwrap();
  assert_eq!(partition.name, "partition");
  assert_eq!(partition.keywords, vec!["writing", "outline"]);
  assert_eq!(partition.max_assignments, 2);

  assert!(matches!(
    store.get_problem("missing").await,
    Err(Error::NotFound(_))
  ));
  assert!(matches!(
    store.get_template("missing").await,
    Err(Error::NotFound(_))
  ));
}

async fn check_advance_is_compare_and_set(store: &dyn Store) {
  let problem = seed(store).await;
  let id = problem.problem_id.as_str();

  let first = vec![task(&problem, Role::Partition, "root")];
  assert!(store.advance_stage(id, None, Role::Partition, &first).await.unwrap());

  // A second advance from the stale stage changes nothing.
  let stale = vec![task(&problem, Role::Partition, "again")];
  assert!(!store.advance_stage(id, None, Role::Partition, &stale).await.unwrap());
  assert_eq!(store.list_tasks(id).await.unwrap().len(), 1);

  let maps = vec![
    task(&problem, Role::Mapper, "Intro"),
    task(&problem, Role::Mapper, "Body"),
  ];
  assert!(
    store
      .advance_stage(id, Some(Role::Partition), Role::Mapper, &maps)
      .await
      .unwrap()
  );

  let loaded = store.get_problem(id).await.unwrap();
  assert_eq!(loaded.current_stage, Some(Role::Mapper));

  let tasks = store.list_tasks(id).await.unwrap();
  let topics: Vec<&str> = tasks.iter().map(|t| t.params["topic"].as_str()).collect();
  assert_eq!(topics, vec!["root", "Intro", "Body"]);
}

async fn check_finish_and_stall(store: &dyn Store) {
  let problem = seed(store).await;
  let id = problem.problem_id.as_str();
  store.advance_stage(id, None, Role::Partition, &[]).await.unwrap();

  assert!(!store.finish_problem(id, Role::Reducer).await.unwrap());
  assert!(store.finish_problem(id, Role::Partition).await.unwrap());
  assert!(!store.finish_problem(id, Role::Partition).await.unwrap());

  let finished = store.get_problem(id).await.unwrap();
  assert_eq!(finished.status, ProblemStatus::Finished);
  assert_eq!(finished.current_stage, Some(Role::Partition));
  assert!(store.list_active_problems().await.unwrap().is_empty());

  // Advancing a terminated problem is refused.
  assert!(
    !store
      .advance_stage(id, Some(Role::Partition), Role::Mapper, &[])
      .await
      .unwrap()
  );

  let other = seed(store).await;
  store
    .stall_problem(&other.problem_id, "posting rejected")
    .await
    .unwrap();
  let stalled = store.get_problem(&other.problem_id).await.unwrap();
  assert_eq!(stalled.status, ProblemStatus::Stalled);
  assert_eq!(stalled.stall_reason.as_deref(), Some("posting rejected"));
}

async fn check_task_lifecycle(store: &dyn Store) {
  let problem = seed(store).await;
  let id = problem.problem_id.as_str();
  let root = task(&problem, Role::Partition, "root");
  store
    .advance_stage(id, None, Role::Partition, std::slice::from_ref(&root))
    .await
    .unwrap();

  store.assign_external_id(&root.task_id, "HIT-1").await.unwrap();
  let posted = store.get_task(&root.task_id).await.unwrap();
  assert_eq!(posted.external_id.as_deref(), Some("HIT-1"));
  assert_eq!(posted.params, root.params);

  assert_eq!(store.list_active_tasks().await.unwrap().len(), 1);
  assert!(store.deactivate_task(&root.task_id).await.unwrap());
  assert!(!store.deactivate_task(&root.task_id).await.unwrap());
  assert!(store.list_active_tasks().await.unwrap().is_empty());
  assert!(store.get_task(&root.task_id).await.unwrap().is_resolved());

  assert!(matches!(
    store.deactivate_task("missing").await,
    Err(Error::NotFound(_))
  ));
}

async fn check_results_dedup_and_history(store: &dyn Store) {
  let problem = seed(store).await;
  let id = problem.problem_id.as_str();
  let a = task(&problem, Role::Mapper, "a");
  let b = task(&problem, Role::Mapper, "b");
  store
    .advance_stage(id, None, Role::Mapper, &[a.clone(), b.clone()])
    .await
    .unwrap();

  assert!(store.record_result(&result(&a, "A1", "f1")).await.unwrap());
  assert!(store.record_result(&result(&a, "A2", "f2")).await.unwrap());
  assert!(!store.record_result(&result(&a, "A1", "dup")).await.unwrap());
  assert!(store.has_result("A1").await.unwrap());
  assert!(!store.has_result("A3").await.unwrap());

  let results = store.list_results(&a.task_id).await.unwrap();
  let facts: Vec<_> = results.iter().map(|r| r.value["fact"].clone()).collect();
  assert_eq!(facts, vec![serde_json::json!("f1"), serde_json::json!("f2")]);

  let history = store.problem_history(id).await.unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].instance.task_id, a.task_id);
  assert_eq!(history[0].results.len(), 2);
  assert_eq!(history[1].instance.task_id, b.task_id);
  assert!(history[1].results.is_empty());
}

#[tokio::test]
async fn test_memory_round_trip() {
  check_round_trip(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_round_trip() {
  check_round_trip(&sqlite_store().await).await;
}

#[tokio::test]
async fn test_memory_advance_is_compare_and_set() {
  check_advance_is_compare_and_set(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_advance_is_compare_and_set() {
  check_advance_is_compare_and_set(&sqlite_store().await).await;
}

#[tokio::test]
async fn test_memory_finish_and_stall() {
  check_finish_and_stall(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_finish_and_stall() {
  check_finish_and_stall(&sqlite_store().await).await;
}

#[tokio::test]
async fn test_memory_task_lifecycle() {
  check_task_lifecycle(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_task_lifecycle() {
  check_task_lifecycle(&sqlite_store().await).await;
}

#[tokio::test]
async fn test_memory_results_dedup_and_history() {
  check_results_dedup_and_history(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_results_dedup_and_history() {
  check_results_dedup_and_history(&sqlite_store().await).await;
}
