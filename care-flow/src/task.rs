use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{context::Context, error::Result, role::Role};

/// Result of a task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Text produced by the task
    pub response: Option<String>,
    /// Next action to take
    pub next_action: NextAction,
    /// Filled in by the pipeline with the id of the task that produced this result
    #[serde(default)]
    pub task_id: String,
}

impl TaskResult {
    pub fn new(response: Option<String>, next_action: NextAction) -> Self {
        Self {
            response,
            next_action,
            task_id: String::new(),
        }
    }
}

/// Defines what should happen after a task completes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Continue to the next task in the pipeline
    Continue,
    /// Stop the run here
    End,
}

/// Core trait that all pipeline steps implement
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique identifier for this task
    fn id(&self) -> &str;

    /// Execute the task with the given context
    async fn run(&self, context: Context) -> Result<TaskResult>;
}

/// Feeds the output of an earlier item into a later one under a field name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBinding {
    /// Key of the earlier work item
    pub from: String,
    /// Field name the output appears under in the later item's input record
    pub field: String,
}

/// One unit of delegated reasoning work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// Context key the output of this item is stored under
    pub key: String,
    pub description: String,
    pub expected_output: String,
    pub role: Arc<Role>,
    /// Outputs of earlier items this item consumes
    pub context_from: Vec<ContextBinding>,
    /// Fixed fields added to the input record, in insertion order
    pub inputs: Vec<(String, String)>,
}

impl WorkItem {
    pub fn new(
        key: impl Into<String>,
        role: Arc<Role>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            role,
            context_from: Vec::new(),
            inputs: Vec::new(),
        }
    }

    pub fn with_context_from(mut self, from: impl Into<String>, field: impl Into<String>) -> Self {
        self.context_from.push(ContextBinding {
            from: from.into(),
            field: field.into(),
        });
        self
    }

    pub fn with_input(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.inputs.push((field.into(), value.into()));
        self
    }

    pub fn role_name(&self) -> &str {
        &self.role.name
    }
}

/// Output of one finished work item, as stored in the run context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub key: String,
    pub role: String,
    pub text: String,
}
