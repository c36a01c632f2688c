use serde::Serialize;

use crate::{
    error::{FlowError, Result},
    task::WorkItem,
};

/// An ordered chain of work items; each item runs after the one before it
#[derive(Debug, Clone, Serialize)]
pub struct Pipeline {
    pub id: String,
    items: Vec<WorkItem>,
}

impl Pipeline {
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Key of the first item, if any
    pub fn start_key(&self) -> Option<&str> {
        self.items.first().map(|item| item.key.as_str())
    }

    /// Key of the item that follows `key`
    pub fn next_key(&self, key: &str) -> Option<&str> {
        let position = self.items.iter().position(|item| item.key == key)?;
        self.items.get(position + 1).map(|item| item.key.as_str())
    }
}

/// Builder for creating pipelines
pub struct PipelineBuilder {
    id: String,
    items: Vec<WorkItem>,
}

impl PipelineBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            items: Vec::new(),
        }
    }

    /// Appends an item; it is chained to the previously added one
    pub fn add_item(mut self, item: WorkItem) -> Self {
        self.items.push(item);
        self
    }

    /// Checks keys are unique and every binding points at an earlier item
    pub fn build(self) -> Result<Pipeline> {
        for (index, item) in self.items.iter().enumerate() {
            let earlier = &self.items[..index];
            if earlier.iter().any(|other| other.key == item.key) {
                return Err(FlowError::InvalidPipeline(format!(
                    "duplicate work item key '{}'",
                    item.key
                )));
            }
            for binding in &item.context_from {
                if !earlier.iter().any(|other| other.key == binding.from) {
                    return Err(FlowError::InvalidPipeline(format!(
                        "'{}' consumes '{}', which does not run before it",
                        item.key, binding.from
                    )));
                }
            }
        }

        Ok(Pipeline {
            id: self.id,
            items: self.items,
        })
    }
}
