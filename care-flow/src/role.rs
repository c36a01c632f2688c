use serde::{Deserialize, Serialize};

/// Side capability a role may use while working on an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Query the configured web search retriever before reasoning
    WebSearch,
}

/// Static persona handed to the reasoning engine.
///
/// Roles are built once and shared read-only by every item assigned to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub goal: String,
    pub backstory: String,
    pub capabilities: Vec<Capability>,
    pub allow_delegation: bool,
}

impl Role {
    pub fn new(
        name: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            goal: goal.into(),
            backstory: backstory.into(),
            capabilities: Vec::new(),
            allow_delegation: false,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    /// System prompt describing who the engine should act as
    pub fn preamble(&self) -> String {
        format!(
            "You are {}. {}\nYour personal goal is: {}\nYou work alone and do not delegate to other agents.",
            self.name, self.backstory, self.goal
        )
    }
}
