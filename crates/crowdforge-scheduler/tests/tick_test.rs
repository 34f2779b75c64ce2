use std::sync::Arc;
use std::time::Duration;

use crowdforge_flow::FlowEngine;
use crowdforge_marketplace::{Assignment, PostedTask, SimulatedMarketplace};
use crowdforge_model::{
  FlowKind, Problem, ProblemStatus, ResultValue, Role, RoleBindings, TaskTemplate, new_id,
};
use crowdforge_scheduler::{Scheduler, TickReport};
use crowdforge_store::{MemoryStore, Store};
use serde_json::json;
use tokio_util::sync::CancellationToken;

struct Harness {
  scheduler: Scheduler<MemoryStore, SimulatedMarketplace>,
  store: Arc<MemoryStore>,
  market: Arc<SimulatedMarketplace>,
  problem_id: String,
}

fn template(name: &str, body: &str, max_assignments: u32) -> TaskTemplate {
  TaskTemplate {
    template_id: new_id(),
    name: name.to_string(),
    title: name.to_string(),
    description: String::new(),
    body: body.to_string(),
    keywords: vec!["writing, article".to_string()],
    max_assignments,
    payment_cents: 5,
    duration_seconds: 30,
    approval_delay_seconds: 180,
    lifetime_seconds: 1440,
  }
}

impl Harness {
  async fn new(max_assignments: u32) -> Self {
    let store = Arc::new(MemoryStore::new());
    let market = Arc::new(SimulatedMarketplace::new());

    let partition = template("partition", "Outline the article", max_assignments);
    let mapper = template("mapper", "A fact about {{ topic }}", max_assignments);
    let reducer = template("reducer", "{{ topic }}<ul>{{ list }}</ul>", max_assignments);
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

    let scheduler = Scheduler::new(FlowEngine::new(store.clone(), market.clone()));
    Self {
      scheduler,
      store,
      market,
      problem_id: problem.problem_id,
    }
  }

  async fn problem(&self) -> Problem {
    self.store.get_problem(&self.problem_id).await.unwrap()
  }

  async fn open(&self, role: Role) -> Vec<PostedTask> {
    self
      .market
      .open_tasks()
      .await
      .into_iter()
      .filter(|t| t.role == role)
      .collect()
  }
}

fn answers(value: serde_json::Value) -> ResultValue {
  serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_partition_map_reduce_through_ticks() {
  let h = Harness::new(1).await;

  let report = h.scheduler.tick().await;
  assert_eq!(report.problems_started, 1);
  assert_eq!(h.problem().await.current_stage, Some(Role::Partition));

  let partitions = h.open(Role::Partition).await;
  assert_eq!(partitions.len(), 1);
  assert_eq!(partitions[0].keywords, vec!["writing", "article"]);
  h.market
    .submit(
      &partitions[0].external_id,
      answers(json!({ "0": "Intro", "1": "Body" })),
    )
    .await
    .unwrap();

  let report = h.scheduler.tick().await;
  assert_eq!(report.results_recorded, 1);
  assert_eq!(report.tasks_closed, 1);
  assert_eq!(report.stages_advanced, 1);
  assert_eq!(h.problem().await.current_stage, Some(Role::Mapper));

  let maps = h.open(Role::Mapper).await;
  assert_eq!(maps.len(), 2);
  assert_eq!(maps[0].title, "mapper");
  for (i, map) in maps.iter().enumerate() {
    h.market
      .submit(&map.external_id, answers(json!({ "fact": format!("fact {}", i) })))
      .await
      .unwrap();
  }

  let report = h.scheduler.tick().await;
  assert_eq!(report.results_recorded, 2);
  assert_eq!(report.tasks_closed, 2);
  assert_eq!(report.stages_advanced, 1);
  assert_eq!(h.problem().await.current_stage, Some(Role::Reducer));

  let tasks = h.store.list_tasks(&h.problem_id).await.unwrap();
  let reduces: Vec<_> = tasks.iter().filter(|t| t.role == Role::Reducer).collect();
  assert_eq!(reduces.len(), 2);
  assert_eq!(reduces[0].params["topic"], "Intro");
  assert_eq!(reduces[0].params["list"], "<li>fact 0</li>");
  assert_eq!(reduces[1].body, "Body<ul><li>fact 1</li></ul>");

  for reduce in h.open(Role::Reducer).await {
    h.market
      .submit(&reduce.external_id, answers(json!({ "text": "done" })))
      .await
      .unwrap();
  }

  let report = h.scheduler.tick().await;
  assert_eq!(report.problems_finished, 1);
  assert!(report.failures.is_empty());

  let finished = h.problem().await;
  assert_eq!(finished.status, ProblemStatus::Finished);
  assert_eq!(finished.current_stage, Some(Role::Reducer));

  let idle = h.scheduler.tick().await;
  assert_eq!(idle, TickReport::default());
  assert!(!idle.made_progress());
}

#[tokio::test]
async fn test_duplicate_assignments_record_once() {
  let h = Harness::new(2).await;
  h.scheduler.tick().await;
  let partition = h.open(Role::Partition).await.remove(0);

  let assignment = Assignment {
    assignment_id: "A1".to_string(),
    answers: answers(json!({ "0": "Intro" })),
  };
  for _ in 0..2 {
    h.market
      .submit_assignment(&partition.external_id, assignment.clone())
      .await
      .unwrap();
  }

  let report = h.scheduler.tick().await;
  assert_eq!(report.results_recorded, 1);

  let report = h.scheduler.tick().await;
  assert_eq!(report.results_recorded, 0);

  let results = h.store.list_results(&partition.task_id).await.unwrap();
  assert_eq!(results.len(), 1);
  assert_eq!(results[0].assignment_id, "A1");
}

#[tokio::test]
async fn test_task_stays_open_below_capacity() {
  let h = Harness::new(2).await;
  h.scheduler.tick().await;
  let partition = h.open(Role::Partition).await.remove(0);

  h.market
    .submit(&partition.external_id, answers(json!({ "0": "Intro" })))
    .await
    .unwrap();
  let report = h.scheduler.tick().await;
  assert_eq!(report.results_recorded, 1);
  assert_eq!(report.tasks_closed, 0);
  assert!(h.store.get_task(&partition.task_id).await.unwrap().is_active);

  h.market
    .submit(&partition.external_id, answers(json!({ "0": "Overview" })))
    .await
    .unwrap();
  let report = h.scheduler.tick().await;
  assert_eq!(report.tasks_closed, 1);
  assert_eq!(report.stages_advanced, 1);

  // Outline aggregation uses the first submission only.
  let maps = h.open(Role::Mapper).await;
  assert_eq!(maps.len(), 1);
  assert_eq!(maps[0].title, "mapper");
  let task = h.store.get_task(&maps[0].task_id).await.unwrap();
  assert_eq!(task.params["topic"], "Intro");
}

#[tokio::test]
async fn test_expiry_without_results_resolves_task() {
  let h = Harness::new(1).await;
  h.scheduler.tick().await;
  let partition = h.open(Role::Partition).await.remove(0);
  h.market.expire(&partition.external_id).await.unwrap();

  let report = h.scheduler.tick().await;
  assert_eq!(report.results_recorded, 0);
  assert_eq!(report.tasks_closed, 1);
  // Nothing to map or reduce: every later stage is empty.
  assert_eq!(report.problems_finished, 1);
  assert_eq!(h.problem().await.status, ProblemStatus::Finished);
}

#[tokio::test]
async fn test_invalid_task_is_deactivated() {
  let h = Harness::new(1).await;
  h.scheduler.tick().await;
  let partition = h.open(Role::Partition).await.remove(0);
  h.market.forget(&partition.external_id).await;

  let report = h.scheduler.tick().await;
  assert_eq!(report.tasks_invalid, 1);
  assert!(report.failures.is_empty());
  assert!(!h.store.get_task(&partition.task_id).await.unwrap().is_active);
}

#[tokio::test]
async fn test_transient_poll_failure_is_retried() {
  let h = Harness::new(1).await;
  h.scheduler.tick().await;
  let partition = h.open(Role::Partition).await.remove(0);
  h.market
    .submit(&partition.external_id, answers(json!({ "0": "Intro" })))
    .await
    .unwrap();
  h.market.fail_next_poll("connection reset").await;

  let report = h.scheduler.tick().await;
  assert_eq!(report.results_recorded, 0);
  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].subject, partition.task_id);
  assert!(h.store.get_task(&partition.task_id).await.unwrap().is_active);
  assert_eq!(h.problem().await.current_stage, Some(Role::Partition));

  let report = h.scheduler.tick().await;
  assert_eq!(report.results_recorded, 1);
  assert_eq!(report.stages_advanced, 1);
}

#[tokio::test]
async fn test_posting_rejection_stalls_problem() {
  let h = Harness::new(1).await;
  h.market.reject_next_post("account suspended").await;

  let report = h.scheduler.tick().await;
  assert_eq!(report.problems_started, 0);
  assert_eq!(report.failures.len(), 1);
  assert_eq!(report.failures[0].subject, h.problem_id);

  let stalled = h.problem().await;
  assert_eq!(stalled.status, ProblemStatus::Stalled);
  assert!(stalled.stall_reason.unwrap().contains("account suspended"));

  // Stalled problems are left alone.
  assert_eq!(h.scheduler.tick().await, TickReport::default());
}

#[tokio::test]
async fn test_run_stops_on_cancel() {
  let h = Harness::new(1).await;
  let cancel = CancellationToken::new();

  let stopper = {
    let cancel = cancel.clone();
    async move {
      tokio::time::sleep(Duration::from_millis(50)).await;
      cancel.cancel();
    }
  };
  tokio::join!(
    h.scheduler.run(Duration::from_millis(5), cancel.clone()),
    stopper
  );

  assert!(cancel.is_cancelled());
  assert_eq!(h.problem().await.current_stage, Some(Role::Partition));
}
