//! PipelineRunner – executes every item of a [`Pipeline`] in order, each against the reasoning
//! engine of the current run, and returns the text of the last item.
//!
//! A runner is cheap to create and carries the capabilities of exactly one run: build a new one
//! per request with that request's engine, so credentials never outlive or cross runs.
//!
//! ```rust,ignore
//! let runner = PipelineRunner::new(engine, retriever);
//! let result = runner.run(&pipeline).await?;
//! println!("{}", result.raw);
//! ```

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::{
    agent::AgentTask,
    context::Context,
    engine::{ReasoningEngine, Retriever},
    error::{FlowError, Result},
    pipeline::Pipeline,
    task::{NextAction, Task, TaskOutput, TaskResult},
};

/// Terminal text of a completed run, with every intermediate output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    /// Output of the last item
    pub raw: String,
    pub outputs: Vec<TaskOutput>,
}

impl PipelineResult {
    pub fn output(&self, key: &str) -> Option<&TaskOutput> {
        self.outputs.iter().find(|output| output.key == key)
    }
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Executes pipelines against one run's capabilities
#[derive(Clone)]
pub struct PipelineRunner {
    engine: Arc<dyn ReasoningEngine>,
    retriever: Option<Arc<dyn Retriever>>,
}

impl PipelineRunner {
    pub fn new(engine: Arc<dyn ReasoningEngine>, retriever: Option<Arc<dyn Retriever>>) -> Self {
        Self { engine, retriever }
    }

    /// Runs every item of `pipeline` in order and returns the last item's output.
    ///
    /// The first failing item aborts the run; later items never start.
    pub async fn run(&self, pipeline: &Pipeline) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", run_id = %run_id, pipeline = %pipeline.id);

        self.execute(pipeline, run_id).instrument(span).await
    }

    async fn execute(&self, pipeline: &Pipeline, run_id: Uuid) -> Result<PipelineResult> {
        info!(items = pipeline.len(), "Starting pipeline run");
        let context = Context::new();

        let tasks: DashMap<String, Arc<dyn Task>> = DashMap::new();
        for item in pipeline.items() {
            let next_action = match pipeline.next_key(&item.key) {
                Some(_) => NextAction::Continue,
                None => NextAction::End,
            };
            let task = AgentTask::new(item.clone(), self.engine.clone(), self.retriever.clone())
                .with_next_action(next_action);
            tasks.insert(item.key.clone(), Arc::new(task));
        }

        let results = execute_chain(pipeline, &tasks, context.clone())
            .await
            .inspect_err(|e| error!("Pipeline run failed: {}", e))?;

        let mut outputs = Vec::with_capacity(results.len());
        for result in &results {
            let output: TaskOutput = context.get(&result.task_id).await.ok_or_else(|| {
                FlowError::ContextError(format!("output of '{}' missing", result.task_id))
            })?;
            outputs.push(output);
        }

        let raw = results
            .last()
            .and_then(|result| result.response.clone())
            .ok_or_else(|| {
                FlowError::TaskExecutionFailed("pipeline produced no output".to_string())
            })?;

        info!(outputs = outputs.len(), "Pipeline run completed");
        Ok(PipelineResult {
            run_id,
            raw,
            outputs,
        })
    }
}

/// Follows the pipeline from its first item until an item ends the run or no item is left
async fn execute_chain(
    pipeline: &Pipeline,
    tasks: &DashMap<String, Arc<dyn Task>>,
    context: Context,
) -> Result<Vec<TaskResult>> {
    let mut results = Vec::new();
    let mut current = pipeline
        .start_key()
        .map(str::to_string)
        .ok_or_else(|| FlowError::InvalidPipeline("pipeline has no work items".to_string()))?;

    loop {
        let task = tasks
            .get(&current)
            .map(|entry| entry.clone())
            .ok_or_else(|| FlowError::TaskNotFound(current.clone()))?;

        let mut result = task.run(context.clone()).await?;
        result.task_id = current.clone();
        let next_action = result.next_action;
        results.push(result);

        match next_action {
            NextAction::End => break,
            NextAction::Continue => match pipeline.next_key(&current) {
                Some(next) => current = next.to_string(),
                None => break,
            },
        }
    }

    Ok(results)
}
