//! Flow events and notifiers for observability.
//!
//! Events are emitted as problems move through their stages and as the
//! scheduler observes tasks. They never drive transitions.

use crowdforge_model::Role;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted by the flow engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlowEvent {
  /// A problem entered its first stage.
  ProblemStarted { problem_id: String },

  /// A problem moved to a new stage and issued `tasks` instances for it.
  StageAdvanced {
    problem_id: String,
    from: Option<Role>,
    to: Role,
    tasks: usize,
  },

  /// A problem completed its terminal stage.
  ProblemFinished { problem_id: String, stage: Role },

  /// A problem can make no further progress.
  ProblemStalled { problem_id: String, reason: String },

  /// A task reached its assignment capacity.
  HitComplete { problem_id: String, task_id: String },

  /// A task expired on the marketplace.
  HitExpired { problem_id: String, task_id: String },

  /// New results were recorded for a task.
  ResultsRetrieved {
    problem_id: String,
    task_id: String,
    count: usize,
  },

  /// The marketplace no longer knows a task.
  HitInvalid { problem_id: String, task_id: String },
}

/// Trait for receiving flow events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them.
pub trait FlowNotifier: Send + Sync {
  fn notify(&self, event: FlowEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl FlowNotifier for NoopNotifier {
  fn notify(&self, _event: FlowEvent) {}
}

/// A notifier that sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<FlowEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<FlowEvent>) -> Self {
    Self { sender }
  }
}

impl FlowNotifier for ChannelNotifier {
  fn notify(&self, event: FlowEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
