//! Context builder — assembles the token-bounded prompt for every model
//! call.
//!
//! Deterministic, priority-driven: the system prompt and scratchpad are
//! required; retrieved memory grows adaptively under its ceiling; history
//! fills greedily from the most recent message backwards and is
//! span-compressed when it would cross its ceiling; a single oversized
//! block is compressed in place rather than dropping the session. The
//! assembled prompt never exceeds `window − reserve`.
//!
//! Emission order: system, compressed-history…, retrieved-memory section,
//! scratchpad, current user turn.

use hearth_core::error::ContextError;
use hearth_core::memory::{MemoryScope, ScoredRecord};
use hearth_core::message::{History, Message};
use hearth_core::model::LanguageModel;
use hearth_core::scratchpad::Scratchpad;
use hearth_memory::MemoryManager;
use std::sync::Arc;
use tracing::{debug, warn};

use super::budget::ContextBudget;
use super::token::{message_tokens, message_tokens_uncached, text_tokens, MESSAGE_OVERHEAD};
use crate::compress::Compressor;

/// Per-scope retrieval bounds for dynamic k.
#[derive(Debug, Clone)]
pub struct RetrievalLimits {
    pub k_min_global: usize,
    pub k_max_global: usize,
    pub k_min_chat: usize,
    pub k_max_chat: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            k_min_global: 2,
            k_max_global: 5,
            k_min_chat: 3,
            k_max_chat: 7,
        }
    }
}

/// Everything the builder needs for one assembly.
pub struct BuildInput<'a> {
    pub system_prompt: &'a str,
    pub scratchpad: &'a Scratchpad,
    pub history: &'a mut History,
    pub scopes: &'a [MemoryScope],
    /// The current user/tool turn, emitted last.
    pub task: &'a str,
    /// Self-reflection directive injected after a tool failure.
    pub reflection: Option<&'a str>,
}

/// Assembly statistics, reported per build.
#[derive(Debug, Clone, Default)]
pub struct ContextStats {
    pub system_tokens: usize,
    pub scratchpad_tokens: usize,
    pub memory_tokens: usize,
    pub history_tokens: usize,
    pub task_tokens: usize,
    pub total_tokens: usize,
    pub window: usize,
    pub utilization_pct: f32,
    pub retrieved_records: usize,
    pub history_messages_included: usize,
    pub history_messages_compressed: usize,
    pub blocks_compressed: usize,
}

/// The assembled prompt plus metadata.
#[derive(Debug)]
pub struct BuiltPrompt {
    pub messages: Vec<Message>,
    pub stats: ContextStats,
    /// max_tokens for the completion, from the remaining window.
    pub completion_budget: u32,
    /// Facts extracted by span compression this build, for the scratchpad.
    pub facts: Vec<String>,
}

pub struct ContextBuilder {
    llm: Arc<dyn LanguageModel>,
    memory: Arc<MemoryManager>,
    compressor: Compressor,
    budget: ContextBudget,
    limits: RetrievalLimits,
    /// Dynamic-k growth stops when the next record's similarity falls
    /// below this (tunable; see DESIGN.md).
    min_similarity: f32,
    /// How many largest-block compressions to attempt before giving up.
    overflow_retries: usize,
}

impl ContextBuilder {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        memory: Arc<MemoryManager>,
        compressor: Compressor,
    ) -> Self {
        let budget = ContextBudget::new(llm.context_window());
        Self {
            llm,
            memory,
            compressor,
            budget,
            limits: RetrievalLimits::default(),
            min_similarity: 0.35,
            overflow_retries: 3,
        }
    }

    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub fn with_limits(mut self, limits: RetrievalLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn budget(&self) -> &ContextBudget {
        &self.budget
    }

    /// Assemble the prompt.
    pub async fn build(&self, input: BuildInput<'_>) -> Result<BuiltPrompt, ContextError> {
        let window = self.budget.window;
        let reserve = self.budget.reserve();
        let mut stats = ContextStats {
            window,
            ..Default::default()
        };
        let mut facts = Vec::new();

        // ── Step 1: required sections ──────────────────────────────────
        stats.system_tokens = text_tokens(&*self.llm, input.system_prompt) + MESSAGE_OVERHEAD;

        let mut scratchpad_text = input.scratchpad.render();
        let mut scratchpad_tokens = if scratchpad_text.is_empty() {
            0
        } else {
            text_tokens(&*self.llm, &scratchpad_text) + MESSAGE_OVERHEAD
        };
        // The scratchpad is required but still bounded: overruns are
        // summarised, never dropped.
        if scratchpad_tokens > self.budget.scratchpad_ceiling() {
            scratchpad_text = self
                .compressor
                .compress_block(&scratchpad_text, self.budget.scratchpad_ceiling())
                .await;
            scratchpad_tokens = text_tokens(&*self.llm, &scratchpad_text) + MESSAGE_OVERHEAD;
            stats.blocks_compressed += 1;
        }
        stats.scratchpad_tokens = scratchpad_tokens;

        let mut task_text = input.task.to_string();
        if let Some(reflection) = input.reflection {
            task_text = format!("{reflection}\n\n{task_text}");
        }
        stats.task_tokens = text_tokens(&*self.llm, &task_text) + MESSAGE_OVERHEAD;

        let required = stats.system_tokens + stats.scratchpad_tokens + stats.task_tokens;
        if required + reserve > window {
            return Err(ContextError::RequiredTooLarge {
                system_tokens: stats.system_tokens,
                scratchpad_tokens: stats.scratchpad_tokens,
                window,
            });
        }

        // ── Step 2: remaining budget ───────────────────────────────────
        let mut remaining = window - required - reserve;

        // ── Step 3: adaptive L3 retrieval ──────────────────────────────
        let query = if input.scratchpad.goal.is_empty() {
            input.task.to_string()
        } else {
            format!("{} {}", input.scratchpad.goal, input.task)
        };
        let memory_cap = self.budget.memory_ceiling().min(remaining);
        let (mut selected, mut memory_section, mut memory_tokens) =
            self.retrieve_memory(input.scopes, &query, memory_cap).await;
        remaining = remaining.saturating_sub(memory_tokens);

        // ── Step 4: greedy history fill with span compression ──────────
        let mut history_budget = self.budget.history_ceiling().min(remaining);
        if history_budget < self.budget.history_floor() && !selected.is_empty() {
            // Redistribute: give memory tokens back to history.
            let deficit = self.budget.history_floor() - history_budget;
            debug!(deficit, "history under floor, reclaiming from memory");
            while memory_tokens > 0
                && history_budget < self.budget.history_floor()
                && !selected.is_empty()
            {
                selected.pop();
                let (section, tokens) = self.render_memory_section(&selected);
                memory_section = section;
                remaining += memory_tokens - tokens;
                memory_tokens = tokens;
                history_budget = self.budget.history_ceiling().min(remaining);
            }
        }
        stats.memory_tokens = memory_tokens;
        stats.retrieved_records = selected.len();

        let mut included_from = self.greedy_fill(input.history, history_budget);
        if included_from > 0 {
            let outcome = self.compressor.compress_span(input.history, included_from).await;
            stats.history_messages_compressed = outcome.removed;
            self.store_facts(&outcome.facts, input.scopes).await;
            facts = outcome.facts;
            included_from = self.greedy_fill(input.history, history_budget);
        }
        let mut history_tokens = self.sum_history(input.history, included_from);
        stats.history_tokens = history_tokens;

        // ── Step 5: largest-block overflow compression ─────────────────
        let mut attempts = 0usize;
        loop {
            let total = stats.system_tokens
                + stats.scratchpad_tokens
                + memory_tokens
                + history_tokens
                + stats.task_tokens;
            if total + reserve <= window {
                break;
            }
            if attempts >= self.overflow_retries {
                warn!(total, window, attempts, "context overflow after compression retries");
                return Err(ContextError::Overflow {
                    tokens: total,
                    window,
                    attempts,
                });
            }
            attempts += 1;
            stats.blocks_compressed += 1;

            let largest = self.largest_history_block(input.history, included_from);
            match largest {
                Some((idx, tokens)) if tokens >= memory_tokens || selected.is_empty() => {
                    let target = (tokens / 4).max(128);
                    let content = input.history.messages()[idx].content.clone();
                    let compressed = self.compressor.compress_block(&content, target).await;
                    input.history.messages_mut()[idx].set_content(compressed);
                    input.history.messages_mut()[idx].compressed = true;
                    history_tokens = self.sum_history(input.history, included_from);
                    stats.history_tokens = history_tokens;
                }
                _ if !selected.is_empty() => {
                    // The memory section is the heaviest block: shed records.
                    selected.pop();
                    let (section, tokens) = self.render_memory_section(&selected);
                    memory_section = section;
                    memory_tokens = tokens;
                    stats.memory_tokens = memory_tokens;
                    stats.retrieved_records = selected.len();
                }
                _ => {
                    return Err(ContextError::Overflow {
                        tokens: stats.system_tokens
                            + stats.scratchpad_tokens
                            + memory_tokens
                            + history_tokens
                            + stats.task_tokens,
                        window,
                        attempts,
                    });
                }
            }
        }

        // ── Step 6: ordered emission ───────────────────────────────────
        let mut messages = Vec::new();
        messages.push(Message::system(input.system_prompt));
        messages.extend(input.history.messages()[included_from..].iter().cloned());
        if !memory_section.is_empty() {
            messages.push(Message::system(memory_section));
        }
        if !scratchpad_text.is_empty() {
            messages.push(Message::system(format!("[Working Memory]\n{scratchpad_text}")));
        }
        messages.push(Message::user(task_text));

        stats.history_messages_included = input.history.len() - included_from;
        stats.total_tokens = stats.system_tokens
            + stats.scratchpad_tokens
            + stats.memory_tokens
            + stats.history_tokens
            + stats.task_tokens;
        stats.utilization_pct = (stats.total_tokens as f32 / window as f32) * 100.0;

        let free = window.saturating_sub(stats.total_tokens);
        let completion_budget = free.clamp(256, 4096) as u32;

        debug!(
            total = stats.total_tokens,
            window,
            utilization = stats.utilization_pct,
            "context assembled"
        );

        Ok(BuiltPrompt {
            messages,
            stats,
            completion_budget,
            facts,
        })
    }

    /// Adaptive retrieval: take `k_min` per scope, then grow towards
    /// `k_max` by descending similarity while the rendered section stays
    /// under `cap` and similarity stays above the cutoff.
    async fn retrieve_memory(
        &self,
        scopes: &[MemoryScope],
        query: &str,
        cap: usize,
    ) -> (Vec<ScoredRecord>, String, usize) {
        let mut per_scope: Vec<Vec<ScoredRecord>> = Vec::new();
        for scope in scopes {
            let k_max = self.k_max(scope);
            per_scope.push(self.memory.search(std::slice::from_ref(scope), query, k_max).await);
        }

        let mut taken: Vec<usize> = scopes.iter().map(|s| self.k_min(s)).collect();
        for (i, candidates) in per_scope.iter().enumerate() {
            taken[i] = taken[i].min(candidates.len());
        }

        // Grow: repeatedly add the best next candidate across scopes.
        loop {
            let mut best: Option<(usize, f32)> = None;
            for (i, candidates) in per_scope.iter().enumerate() {
                if taken[i] >= candidates.len() || taken[i] >= self.k_max(&scopes[i]) {
                    continue;
                }
                let sim = candidates[taken[i]].similarity;
                if sim < self.min_similarity {
                    continue;
                }
                if best.map(|(_, b)| sim > b).unwrap_or(true) {
                    best = Some((i, sim));
                }
            }
            let Some((scope_idx, _)) = best else { break };

            taken[scope_idx] += 1;
            let selected = self.collect_selected(&per_scope, &taken);
            let (_, tokens) = self.render_memory_section(&selected);
            if tokens > cap {
                taken[scope_idx] -= 1;
                break;
            }
        }

        // Shrink below k_min if even that does not fit.
        let mut selected = self.collect_selected(&per_scope, &taken);
        let (mut section, mut tokens) = self.render_memory_section(&selected);
        while tokens > cap && !selected.is_empty() {
            selected.pop();
            let rendered = self.render_memory_section(&selected);
            section = rendered.0;
            tokens = rendered.1;
        }

        (selected, section, tokens)
    }

    fn collect_selected(
        &self,
        per_scope: &[Vec<ScoredRecord>],
        taken: &[usize],
    ) -> Vec<ScoredRecord> {
        let mut selected: Vec<ScoredRecord> = per_scope
            .iter()
            .zip(taken)
            .flat_map(|(candidates, &n)| candidates[..n].iter().cloned())
            .collect();
        selected.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        selected
    }

    fn render_memory_section(&self, selected: &[ScoredRecord]) -> (String, usize) {
        if selected.is_empty() {
            return (String::new(), 0);
        }
        let mut shared = Vec::new();
        let mut project = Vec::new();
        for hit in selected {
            let line = format!("- {}", clip(&hit.record.text, 200));
            match hit.record.scope {
                MemoryScope::Global => shared.push(line),
                MemoryScope::Chat(_) => project.push(line),
            }
        }
        let mut section = String::from("[Retrieved Memory]");
        if !shared.is_empty() {
            section.push_str("\nShared knowledge:\n");
            section.push_str(&shared.join("\n"));
        }
        if !project.is_empty() {
            section.push_str("\nProject context:\n");
            section.push_str(&project.join("\n"));
        }
        let tokens = text_tokens(&*self.llm, &section) + MESSAGE_OVERHEAD;
        (section, tokens)
    }

    /// First index of the newest suffix of history that fits `budget`.
    fn greedy_fill(&self, history: &mut History, budget: usize) -> usize {
        let len = history.len();
        let mut used = 0usize;
        let mut start = len;
        for idx in (0..len).rev() {
            let tokens = message_tokens(&*self.llm, &mut history.messages_mut()[idx]);
            if used + tokens > budget {
                break;
            }
            used += tokens;
            start = idx;
        }
        start
    }

    fn sum_history(&self, history: &mut History, from: usize) -> usize {
        (from..history.len())
            .map(|idx| message_tokens(&*self.llm, &mut history.messages_mut()[idx]))
            .sum()
    }

    fn largest_history_block(&self, history: &History, from: usize) -> Option<(usize, usize)> {
        history.messages()[from..]
            .iter()
            .enumerate()
            .map(|(offset, msg)| (from + offset, message_tokens_uncached(&*self.llm, msg)))
            .max_by_key(|&(_, tokens)| tokens)
    }

    async fn store_facts(&self, facts: &[String], scopes: &[MemoryScope]) {
        if facts.is_empty() {
            return;
        }
        let scope = scopes
            .iter()
            .find(|s| matches!(s, MemoryScope::Chat(_)))
            .or_else(|| scopes.first());
        let Some(scope) = scope else { return };

        let importance = self.compressor.config().fact_importance;
        for fact in facts {
            if let Err(e) = self.memory.add(scope, fact, importance).await {
                debug!(error = %e, "fact not stored during compression");
            }
        }
    }

    fn k_min(&self, scope: &MemoryScope) -> usize {
        match scope {
            MemoryScope::Global => self.limits.k_min_global,
            MemoryScope::Chat(_) => self.limits.k_min_chat,
        }
    }

    fn k_max(&self, scope: &MemoryScope) -> usize {
        match scope {
            MemoryScope::Global => self.limits.k_max_global,
            MemoryScope::Chat(_) => self.limits.k_max_chat,
        }
    }
}

fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(max).collect();
        format!("{clipped}…")
    }
}
