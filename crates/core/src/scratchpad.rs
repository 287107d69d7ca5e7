//! Scratchpad — the L1 working memory, always present in the prompt.
//!
//! Holds the current goal, the generated plan, the last observation, and a
//! short ring of recently extracted facts. Mutated by the agent loop after
//! each cycle; rendered into its own context section by the context
//! builder. Size is capped by the L1 budget class — overruns are summarised
//! by the compressor, never silently truncated mid-fact.

use serde::{Deserialize, Serialize};

/// Maximum number of recent facts retained.
pub const MAX_RECENT_FACTS: usize = 8;

/// Observations are clipped to this many characters when recorded here.
const OBSERVATION_CLIP: usize = 200;

/// The agent's working memory for the current task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scratchpad {
    /// The user's current task.
    pub goal: String,

    /// Numbered plan generated at the start of the task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,

    /// Clipped summary of the most recent observation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_observation: Option<String>,

    /// Recently extracted facts, newest last, capped at [`MAX_RECENT_FACTS`].
    #[serde(default)]
    pub recent_facts: Vec<String>,
}

impl Scratchpad {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new task: set the goal, clear the plan and last observation,
    /// keep accumulated facts.
    pub fn begin_task(&mut self, goal: &str) {
        self.goal = goal.to_string();
        self.plan = None;
        self.last_observation = None;
    }

    /// Record the latest observation, clipped.
    pub fn record_observation(&mut self, observation: &str) {
        let clipped: String = observation.chars().take(OBSERVATION_CLIP).collect();
        self.last_observation = Some(clipped);
    }

    /// Append a fact, dropping the oldest when over the cap. Duplicate
    /// facts are ignored.
    pub fn push_fact(&mut self, fact: impl Into<String>) {
        let fact = fact.into();
        if fact.trim().is_empty() || self.recent_facts.contains(&fact) {
            return;
        }
        self.recent_facts.push(fact);
        if self.recent_facts.len() > MAX_RECENT_FACTS {
            self.recent_facts.remove(0);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.goal.is_empty()
            && self.plan.is_none()
            && self.last_observation.is_none()
            && self.recent_facts.is_empty()
    }

    /// Render the scratchpad as a context section.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if !self.goal.is_empty() {
            parts.push(format!("CURRENT TASK: {}", self.goal));
        }
        if let Some(plan) = &self.plan {
            parts.push(format!("CURRENT PLAN:\n{plan}"));
        }
        if let Some(obs) = &self.last_observation {
            parts.push(format!("LAST RESULT: {obs}"));
        }
        if !self.recent_facts.is_empty() {
            let facts = self
                .recent_facts
                .iter()
                .map(|f| format!("- {f}"))
                .collect::<Vec<_>>()
                .join("\n");
            parts.push(format!("RECENT FACTS:\n{facts}"));
        }
        parts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_task_resets_plan_keeps_facts() {
        let mut pad = Scratchpad::new();
        pad.plan = Some("old plan".into());
        pad.push_fact("URL: https://example.com");
        pad.begin_task("new goal");

        assert_eq!(pad.goal, "new goal");
        assert!(pad.plan.is_none());
        assert!(pad.last_observation.is_none());
        assert_eq!(pad.recent_facts.len(), 1);
    }

    #[test]
    fn observation_is_clipped() {
        let mut pad = Scratchpad::new();
        pad.record_observation(&"x".repeat(500));
        assert_eq!(pad.last_observation.as_ref().unwrap().len(), 200);
    }

    #[test]
    fn facts_are_capped_and_deduplicated() {
        let mut pad = Scratchpad::new();
        for i in 0..12 {
            pad.push_fact(format!("fact {i}"));
        }
        assert_eq!(pad.recent_facts.len(), MAX_RECENT_FACTS);
        // Oldest dropped first
        assert_eq!(pad.recent_facts[0], "fact 4");

        pad.push_fact("fact 11");
        assert_eq!(pad.recent_facts.len(), MAX_RECENT_FACTS);
    }

    #[test]
    fn render_contains_all_sections() {
        let mut pad = Scratchpad::new();
        pad.begin_task("write a report");
        pad.plan = Some("1. research\n2. write".into());
        pad.record_observation("found 3 sources");
        pad.push_fact("Files: report.md");

        let rendered = pad.render();
        assert!(rendered.contains("CURRENT TASK: write a report"));
        assert!(rendered.contains("CURRENT PLAN:"));
        assert!(rendered.contains("LAST RESULT: found 3 sources"));
        assert!(rendered.contains("- Files: report.md"));
    }

    #[test]
    fn serialization_roundtrip() {
        let mut pad = Scratchpad::new();
        pad.begin_task("goal");
        pad.push_fact("a fact");
        let json = serde_json::to_string(&pad).unwrap();
        let back: Scratchpad = serde_json::from_str(&json).unwrap();
        assert_eq!(back.goal, "goal");
        assert_eq!(back.recent_facts, vec!["a fact"]);
    }
}
