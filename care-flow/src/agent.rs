use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    context::Context,
    engine::{CompletionRequest, ReasoningEngine, Retriever, SearchHit},
    error::{FlowError, Result},
    role::Capability,
    task::{NextAction, Task, TaskOutput, TaskResult, WorkItem},
};

const MAX_QUERY_CHARS: usize = 256;

/// Runs a single [`WorkItem`] against the reasoning engine on behalf of its role
pub struct AgentTask {
    item: WorkItem,
    engine: Arc<dyn ReasoningEngine>,
    retriever: Option<Arc<dyn Retriever>>,
    next_action: NextAction,
}

impl AgentTask {
    pub fn new(
        item: WorkItem,
        engine: Arc<dyn ReasoningEngine>,
        retriever: Option<Arc<dyn Retriever>>,
    ) -> Self {
        Self {
            item,
            engine,
            retriever,
            next_action: NextAction::Continue,
        }
    }

    /// What the run does after this item; the final item of a pipeline ends it
    pub fn with_next_action(mut self, next_action: NextAction) -> Self {
        self.next_action = next_action;
        self
    }

    /// Builds the structured input record from earlier outputs and fixed inputs
    async fn input_record(&self, context: &Context) -> Result<Option<Map<String, Value>>> {
        if self.item.context_from.is_empty() && self.item.inputs.is_empty() {
            return Ok(None);
        }

        let mut record = Map::new();
        for binding in &self.item.context_from {
            let output: TaskOutput = context.get(&binding.from).await.ok_or_else(|| {
                FlowError::ContextError(format!(
                    "output of '{}' not found for '{}'",
                    binding.from, self.item.key
                ))
            })?;
            record.insert(binding.field.clone(), Value::String(output.text));
        }
        for (field, value) in &self.item.inputs {
            record.insert(field.clone(), Value::String(value.clone()));
        }
        Ok(Some(record))
    }

    async fn search(&self) -> Result<Vec<SearchHit>> {
        let Some(retriever) = &self.retriever else {
            return Ok(Vec::new());
        };
        if !self.item.role.can(Capability::WebSearch) {
            return Ok(Vec::new());
        }

        let query: String = self.item.description.chars().take(MAX_QUERY_CHARS).collect();
        let hits = retriever.search(&query).await?;
        info!(task_id = %self.item.key, hits = hits.len(), "Web search completed");
        Ok(hits)
    }
}

/// Assembles the user prompt for one item
pub fn compose_prompt(
    item: &WorkItem,
    record: Option<&Map<String, Value>>,
    hits: &[SearchHit],
) -> String {
    let mut prompt = format!("Current Task: {}\n", item.description);

    if let Some(record) = record {
        let rendered = serde_json::to_string_pretty(record).unwrap_or_default();
        prompt.push_str("\nInput record:\n");
        prompt.push_str(&rendered);
        prompt.push('\n');
    }

    if !hits.is_empty() {
        prompt.push_str("\nWeb search results:\n");
        for hit in hits {
            prompt.push_str(&format!("- {} ({}): {}\n", hit.title, hit.link, hit.snippet));
        }
    }

    prompt.push_str(&format!(
        "\nThis is the expected criteria for your final answer: {}\nYou MUST return the actual complete content as the final answer, not a summary.",
        item.expected_output
    ));
    prompt
}

#[async_trait]
impl Task for AgentTask {
    fn id(&self) -> &str {
        &self.item.key
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!(
            task_id = %self.item.key,
            role = %self.item.role.name,
            "Starting work item"
        );

        let record = self.input_record(&context).await?;
        let hits = self.search().await?;

        let request = CompletionRequest {
            preamble: self.item.role.preamble(),
            prompt: compose_prompt(&self.item, record.as_ref(), &hits),
        };
        debug!(task_id = %self.item.key, prompt_chars = request.prompt.len(), "Prompt composed");

        let text = self.engine.complete(&request).await?;

        context
            .set(
                self.item.key.clone(),
                TaskOutput {
                    key: self.item.key.clone(),
                    role: self.item.role.name.clone(),
                    text: text.clone(),
                },
            )
            .await?;

        info!(task_id = %self.item.key, output_chars = text.len(), "Work item completed");
        Ok(TaskResult::new(Some(text), self.next_action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role::Role;

    fn item() -> WorkItem {
        let role = Arc::new(Role::new("Advisor", "Advise.", "Experienced."));
        WorkItem::new("treat", role, "Recommend treatment.", "A plan.")
            .with_context_from("diagnose", "diagnosis_text")
            .with_input("medical_history", "asthma")
    }

    #[test]
    fn prompt_contains_description_record_and_criteria() {
        let mut record = Map::new();
        record.insert("diagnosis_text".into(), Value::String("bronchitis".into()));

        let hits = vec![SearchHit {
            title: "Bronchitis".into(),
            link: "https://example.org".into(),
            snippet: "Inflammation".into(),
        }];
        let prompt = compose_prompt(&item(), Some(&record), &hits);

        assert!(prompt.starts_with("Current Task: Recommend treatment."));
        assert!(prompt.contains("\"diagnosis_text\": \"bronchitis\""));
        assert!(prompt.contains("- Bronchitis (https://example.org): Inflammation"));
        assert!(prompt.contains("expected criteria for your final answer: A plan."));
    }

    struct EchoEngine;

    #[async_trait]
    impl ReasoningEngine for EchoEngine {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            Ok(format!("{} chars", request.prompt.len()))
        }
    }

    #[tokio::test]
    async fn final_item_ends_the_run_and_stores_its_output() {
        let role = Arc::new(Role::new("Diagnostician", "Diagnose.", "Doctor."));
        let task = AgentTask::new(
            WorkItem::new("diagnose", role, "Analyze symptoms.", "A diagnosis."),
            Arc::new(EchoEngine),
            None,
        )
        .with_next_action(NextAction::End);
        let context = Context::new();

        let result = task.run(context.clone()).await.unwrap();

        assert_eq!(result.next_action, NextAction::End);
        let stored: TaskOutput = context.get("diagnose").await.unwrap();
        assert_eq!(stored.role, "Diagnostician");
        assert_eq!(Some(stored.text), result.response);
    }

    #[tokio::test]
    async fn missing_earlier_output_is_a_context_error() {
        let task = AgentTask::new(item(), Arc::new(EchoEngine), None);

        let error = task.run(Context::new()).await.unwrap_err();
        assert!(matches!(error, FlowError::ContextError(_)));
    }

    #[test]
    fn prompt_without_record_or_hits_has_no_extra_sections() {
        let prompt = compose_prompt(&item(), None, &[]);

        assert!(!prompt.contains("Input record"));
        assert!(!prompt.contains("Web search results"));
    }
}
