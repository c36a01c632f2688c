pub mod agent;
pub mod context;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod role;
pub mod runner;
pub mod task;

#[cfg(feature = "rig")]
pub mod llm;
#[cfg(feature = "search")]
pub mod search;

// Re-export commonly used types
pub use agent::AgentTask;
pub use context::Context;
pub use engine::{CompletionRequest, ModelSettings, ReasoningEngine, Retriever, SearchHit};
pub use error::{FlowError, Result};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use role::{Capability, Role};
pub use runner::{PipelineResult, PipelineRunner};
pub use task::{ContextBinding, NextAction, Task, TaskOutput, TaskResult, WorkItem};

#[cfg(feature = "rig")]
pub use llm::{LlmProvider, RigEngine};
#[cfg(feature = "search")]
pub use search::SerperSearch;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Answers with a numbered reply and remembers every request
    #[derive(Default)]
    struct RecordingEngine {
        requests: Mutex<Vec<CompletionRequest>>,
        fail_on_call: Option<usize>,
    }

    impl RecordingEngine {
        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReasoningEngine for RecordingEngine {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            let call = requests.len();
            if self.fail_on_call == Some(call) {
                return Err(FlowError::Upstream("model unavailable".to_string()));
            }
            Ok(format!("answer {}", call))
        }
    }

    struct FixedRetriever;

    #[async_trait]
    impl Retriever for FixedRetriever {
        async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
            Ok(vec![SearchHit {
                title: "Result".to_string(),
                link: "https://example.org".to_string(),
                snippet: format!("about {}", query),
            }])
        }
    }

    fn two_step_pipeline(searching: bool) -> Pipeline {
        let mut first_role = Role::new("First", "Go first.", "Opens runs.");
        if searching {
            first_role = first_role.with_capability(Capability::WebSearch);
        }
        let first_role = Arc::new(first_role);
        let second_role = Arc::new(Role::new("Second", "Go second.", "Closes runs."));

        PipelineBuilder::new("two_step")
            .add_item(WorkItem::new("first", first_role, "Do the first thing.", "A first answer."))
            .add_item(
                WorkItem::new("second", second_role, "Do the second thing.", "A final answer.")
                    .with_context_from("first", "first_text")
                    .with_input("note", "kept verbatim"),
            )
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn runs_items_in_order_and_returns_last_output() {
        let engine = Arc::new(RecordingEngine::default());
        let runner = PipelineRunner::new(engine.clone(), None);

        let result = runner.run(&two_step_pipeline(false)).await.unwrap();

        assert_eq!(result.raw, "answer 2");
        assert_eq!(result.to_string(), "answer 2");
        assert_eq!(result.outputs.len(), 2);
        assert_eq!(result.output("first").unwrap().role, "First");
        assert_eq!(result.output("second").unwrap().text, "answer 2");

        let requests = engine.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].preamble.starts_with("You are First."));
        assert!(requests[1].preamble.starts_with("You are Second."));
    }

    #[tokio::test]
    async fn later_items_receive_earlier_output_as_structured_input() {
        let engine = Arc::new(RecordingEngine::default());
        let runner = PipelineRunner::new(engine.clone(), None);

        runner.run(&two_step_pipeline(false)).await.unwrap();

        let requests = engine.requests();
        assert!(!requests[0].prompt.contains("Input record"));
        assert!(requests[1].prompt.contains("\"first_text\": \"answer 1\""));
        assert!(requests[1].prompt.contains("\"note\": \"kept verbatim\""));
    }

    #[tokio::test]
    async fn failure_aborts_the_run_before_later_items() {
        let engine = Arc::new(RecordingEngine {
            fail_on_call: Some(1),
            ..Default::default()
        });
        let runner = PipelineRunner::new(engine.clone(), None);

        let error = runner.run(&two_step_pipeline(false)).await.unwrap_err();

        assert!(matches!(error, FlowError::Upstream(_)));
        assert!(error.is_external());
        assert_eq!(engine.requests().len(), 1);
    }

    #[tokio::test]
    async fn search_results_only_reach_roles_allowed_to_search() {
        let engine = Arc::new(RecordingEngine::default());
        let runner = PipelineRunner::new(engine.clone(), Some(Arc::new(FixedRetriever)));

        runner.run(&two_step_pipeline(true)).await.unwrap();

        let requests = engine.requests();
        assert!(requests[0].prompt.contains("about Do the first thing."));
        assert!(!requests[1].prompt.contains("Web search results"));
    }

    #[tokio::test]
    async fn empty_pipeline_is_rejected() {
        let runner = PipelineRunner::new(Arc::new(RecordingEngine::default()), None);
        let pipeline = PipelineBuilder::new("empty").build().unwrap();

        let error = runner.run(&pipeline).await.unwrap_err();
        assert!(matches!(error, FlowError::InvalidPipeline(_)));
    }
}
