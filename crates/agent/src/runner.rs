//! The agent loop — ReAct cycles over a bounded context.
//!
//! One task runs as a sequence of cycles: build the prompt, call the
//! model, parse the step, guard against duplicate network calls, dispatch
//! the tool, fold the observation back into history and scratchpad. The
//! loop recovers locally from malformed output, tool failures, and
//! context overflow; `finish` terminates it with the final answer, and a
//! cycle cap bounds the whole task.
//!
//! The agent also anchors the chat lifecycle: exactly one chat is active,
//! and switching/loading chats swaps the live history, scratchpad, and
//! memory scope together.

use hearth_core::error::{ContextError, Error, StoreError};
use hearth_core::memory::MemoryScope;
use hearth_core::message::{History, Message};
use hearth_core::model::{GenerateRequest, LanguageModel};
use hearth_core::scratchpad::Scratchpad;
use hearth_core::step::Observation;
use hearth_core::tool::{SideEffectClass, ToolRegistry};
use hearth_memory::MemoryManager;
use hearth_store::{ChatMetadata, ChatStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::compress::{extract_key_facts, CompressionConfig, Compressor};
use crate::context::{BuildInput, ContextBuilder};
use crate::parser::parse_response;
use crate::protect::DuplicateGuard;

/// Name of the chat that exists from startup.
pub const DEFAULT_CHAT: &str = "default";

/// Configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum ReAct cycles per task.
    pub max_cycles: usize,

    /// Consecutive parse failures tolerated before the task aborts.
    pub parse_failure_limit: usize,

    /// Sampling temperature for reasoning calls.
    pub temperature: f32,

    /// Output budget for the planning call.
    pub plan_max_tokens: u32,

    /// Tools whose successful results are fact-extracted into L3.
    pub remember_tools: Vec<String>,

    /// Importance assigned to memorised tool facts.
    pub tool_fact_importance: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_cycles: 50,
            parse_failure_limit: 3,
            temperature: 0.5,
            plan_max_tokens: 1024,
            remember_tools: [
                "read_file",
                "list_directory",
                "run_shell_command",
                "web_fetch",
                "replace_in_file",
                "create_file",
                "analyze_code",
                "edit_file_at_line",
                "internet_search",
                "web_search_in_page",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            tool_fact_importance: 0.55,
        }
    }
}

/// How a task ended.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// The model called `finish`.
    Finished { answer: String, cycles: usize },

    /// MAX_CYCLES exhausted without `finish`.
    CycleLimit {
        last_thought: String,
        last_observation: String,
    },

    /// Unrecoverable condition (model endpoint down, format-error budget
    /// spent). Live state is preserved.
    Aborted { reason: String },
}

struct ChatState {
    history: History,
    scratchpad: Scratchpad,
}

impl ChatState {
    fn new() -> Self {
        Self {
            history: History::new(),
            scratchpad: Scratchpad::new(),
        }
    }
}

/// The agent: one model handle, one memory manager, one tool registry,
/// one active chat.
pub struct Agent {
    llm: Arc<dyn LanguageModel>,
    memory: Arc<MemoryManager>,
    tools: Arc<ToolRegistry>,
    store: ChatStore,
    builder: ContextBuilder,
    compressor: Compressor,
    config: AgentConfig,
    system_prompt: String,
    chats: HashMap<String, ChatState>,
    current: String,
    /// Shared with the memory tools so they always address the active
    /// chat's scope.
    active_chat: Arc<RwLock<String>>,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        memory: Arc<MemoryManager>,
        tools: Arc<ToolRegistry>,
        store: ChatStore,
        active_chat: Arc<RwLock<String>>,
        config: AgentConfig,
    ) -> Self {
        let compressor = Compressor::new(llm.clone(), CompressionConfig::default());
        let builder = ContextBuilder::new(llm.clone(), memory.clone(), compressor.clone());
        let system_prompt = build_system_prompt(&tools);

        let mut chats = HashMap::new();
        chats.insert(DEFAULT_CHAT.to_string(), ChatState::new());

        Self {
            llm,
            memory,
            tools,
            store,
            builder,
            compressor,
            config,
            system_prompt,
            chats,
            current: DEFAULT_CHAT.to_string(),
            active_chat,
        }
    }

    /// Replace the context builder (tuning knobs).
    pub fn with_builder(mut self, builder: ContextBuilder) -> Self {
        self.builder = builder;
        self
    }

    // ── Task execution ────────────────────────────────────────────────

    /// Run one user task through the ReAct loop.
    ///
    /// Never panics and never returns an error: every recoverable failure
    /// is folded back into the loop, and the unrecoverable ones surface as
    /// [`TaskOutcome::Aborted`] with live state intact.
    pub async fn run_task(&mut self, input: &str) -> TaskOutcome {
        info!(task = input, chat = %self.current, "task started");

        let scopes = vec![
            MemoryScope::Global,
            MemoryScope::Chat(self.current.clone()),
        ];
        let chat_scope = scopes[1].clone();

        // L1: new goal, keep accumulated facts.
        self.state_mut().scratchpad.begin_task(input);

        // Plan first; a failed planning call is not fatal.
        match self.generate_plan(input).await {
            Ok(plan) => {
                debug!(plan = %plan, "plan generated");
                self.state_mut().scratchpad.plan = Some(plan);
            }
            Err(e) => warn!(error = %e, "planning call failed, continuing without a plan"),
        }

        let mut guard = DuplicateGuard::new();
        let mut parse_failures = 0usize;
        let mut reflection: Option<String> = None;
        let mut failed_tools: HashSet<String> = HashSet::new();
        let mut last_thought = String::new();
        let mut last_observation = String::new();

        for cycle in 1..=self.config.max_cycles {
            debug!(cycle, max = self.config.max_cycles, "cycle start");

            let mut task_text = format!("TASK: {input}");
            if cycle >= 4 {
                task_text.push_str(
                    "\n\nREMINDER: reply STRICTLY as <THOUGHT>...<TOOL>...<PARAMS>{...}<END>",
                );
            }

            // ── Build the prompt ──
            let built = {
                let system_prompt = self.system_prompt.clone();
                let reflection_text = reflection.take();
                let state = self
                    .chats
                    .get_mut(&self.current)
                    .expect("active chat state exists");
                self.builder
                    .build(BuildInput {
                        system_prompt: &system_prompt,
                        scratchpad: &state.scratchpad,
                        history: &mut state.history,
                        scopes: &scopes,
                        task: &task_text,
                        reflection: reflection_text.as_deref(),
                    })
                    .await
            };

            let built = match built {
                Ok(b) => b,
                Err(e @ ContextError::Overflow { .. }) => {
                    // Surfaced as an observation; continue with a reduced
                    // history ceiling by force-compressing the older half.
                    warn!(error = %e, "context overflow, compressing history");
                    let compressor = self.compressor.clone();
                    let state = self
                        .chats
                        .get_mut(&self.current)
                        .expect("active chat state exists");
                    let half = state.history.len() / 2;
                    compressor.compress_span(&mut state.history, half).await;
                    let note =
                        format!("Observation: context overflow ({e}); older history was compressed");
                    state.history.push(Message::tool(note.clone()));
                    last_observation = note;
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "context assembly failed");
                    return TaskOutcome::Aborted {
                        reason: format!("context assembly failed: {e}"),
                    };
                }
            };

            for fact in &built.facts {
                self.state_mut().scratchpad.push_fact(fact.clone());
            }

            // ── Call the model ──
            let request = GenerateRequest::new(
                built.messages,
                built.completion_budget,
                self.config.temperature,
            );
            let response = match self.llm.generate(request).await {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    error!(error = %e, "model call failed");
                    return TaskOutcome::Aborted {
                        reason: format!("model call failed: {e}"),
                    };
                }
            };

            // ── Parse ──
            let step = match parse_response(&response) {
                Ok(step) => {
                    parse_failures = 0;
                    step
                }
                Err(e) => {
                    parse_failures += 1;
                    warn!(error = %e, attempt = parse_failures, "parse failure");
                    if parse_failures >= self.config.parse_failure_limit {
                        return TaskOutcome::Aborted {
                            reason: format!(
                                "the model could not produce a valid tool call after {} format errors",
                                parse_failures
                            ),
                        };
                    }
                    self.state_mut()
                        .history
                        .push(Message::tool(format_error_observation(cycle)));
                    continue;
                }
            };

            // The raw response joins history only after a successful parse.
            self.state_mut().history.push(Message::assistant(response));
            last_thought = step.thought.clone();
            let params = step.dispatch_params();

            // ── Finish? ──
            if step.tool == "finish"
                || self.tools.side_effect(&step.tool) == Some(SideEffectClass::Finish)
            {
                let answer = params["final_answer"].as_str().unwrap_or_default().to_string();
                info!(cycles = cycle, "task finished");
                self.auto_save();
                return TaskOutcome::Finished {
                    answer,
                    cycles: cycle,
                };
            }

            // ── Loop protection ──
            if self.tools.side_effect(&step.tool) == Some(SideEffectClass::Network) {
                if let Some(guidance) = guard.check(&step.tool, &params, cycle) {
                    warn!(tool = %step.tool, "duplicate network call short-circuited");
                    let obs = Observation::fail(guidance);
                    self.record_observation(&step.tool, &obs, &mut last_observation);
                    continue;
                }
            }

            // ── Dispatch ──
            let obs = self.tools.dispatch(&step.tool, &params).await;
            self.record_observation(&step.tool, &obs, &mut last_observation);

            if !obs.ok {
                // First failure of this tool in the task: ask the model to
                // change approach in the next prompt.
                if failed_tools.insert(step.tool.clone()) {
                    reflection = Some(format!(
                        "The previous tool call ('{}') failed with: {}. Analyse the cause and propose a different approach.",
                        step.tool,
                        clip(&obs.summary, 200)
                    ));
                }
                continue;
            }

            // ── Memorise configured tool results ──
            if self.config.remember_tools.contains(&step.tool) {
                self.memorise_tool_result(&step.tool, &obs.summary, &chat_scope)
                    .await;
            }
        }

        warn!(max = self.config.max_cycles, "cycle limit reached");
        self.auto_save();
        TaskOutcome::CycleLimit {
            last_thought,
            last_observation,
        }
    }

    fn record_observation(
        &mut self,
        tool: &str,
        obs: &Observation,
        last_observation: &mut String,
    ) {
        let rendered = obs.render(tool);
        self.state_mut().history.push(Message::tool(rendered));
        self.state_mut().scratchpad.record_observation(&obs.summary);
        *last_observation = obs.summary.clone();
    }

    async fn memorise_tool_result(&mut self, tool: &str, summary: &str, chat_scope: &MemoryScope) {
        let Some(facts) = extract_key_facts(summary) else {
            return;
        };
        if facts.len() < 20 {
            return;
        }

        let entry = format!("[{tool}] {facts}");
        if let Err(e) = self
            .memory
            .add(chat_scope, &entry, self.config.tool_fact_importance)
            .await
        {
            debug!(error = %e, "tool fact not stored");
            return;
        }
        self.state_mut().scratchpad.push_fact(facts);

        // Broadly useful reads are mirrored into global memory, clipped.
        if tool == "read_file" || tool == "web_fetch" {
            let global_entry = clip(&entry, 200);
            if let Err(e) = self
                .memory
                .add(&MemoryScope::Global, &global_entry, self.config.tool_fact_importance)
                .await
            {
                debug!(error = %e, "global mirror not stored");
            }
        }
    }

    async fn generate_plan(&self, input: &str) -> Result<String, Error> {
        let prompt = format!(
            "You are a planning assistant. Produce a short numbered step-by-step plan \
for the task below. Answer with the numbered list only.\n\nTASK: {input}"
        );
        let request = GenerateRequest::new(
            vec![Message::user(prompt)],
            self.config.plan_max_tokens,
            0.5,
        );
        let plan = self.llm.generate(request).await.map_err(Error::Model)?;
        Ok(plan.trim().to_string())
    }

    fn state_mut(&mut self) -> &mut ChatState {
        self.chats
            .get_mut(&self.current)
            .expect("active chat state exists")
    }

    fn state(&self) -> &ChatState {
        self.chats.get(&self.current).expect("active chat state exists")
    }

    /// Best-effort save of the active chat; a failed save never discards
    /// live state.
    fn auto_save(&self) {
        let state = self.state();
        if let Err(e) = self
            .store
            .save(&self.current, &state.history, &state.scratchpad, None)
        {
            warn!(error = %e, chat = %self.current, "auto-save failed");
        }
    }

    // ── Chat lifecycle ────────────────────────────────────────────────

    pub fn current_chat(&self) -> &str {
        &self.current
    }

    pub fn history(&self) -> &History {
        &self.state().history
    }

    pub fn scratchpad(&self) -> &Scratchpad {
        &self.state().scratchpad
    }

    /// Create a new in-memory chat and make it active.
    pub async fn new_chat(&mut self, name: &str) -> Result<(), Error> {
        if self.chats.contains_key(name) {
            return Err(Error::Internal(format!("chat '{name}' already exists")));
        }
        self.chats.insert(name.to_string(), ChatState::new());
        self.set_active(name).await;
        info!(chat = name, "chat created");
        Ok(())
    }

    /// Switch to a chat: live if loaded, otherwise pulled from disk.
    pub async fn switch_chat(&mut self, name: &str) -> Result<(), StoreError> {
        if self.chats.contains_key(name) {
            self.set_active(name).await;
            return Ok(());
        }
        let snapshot = self.store.load(name)?;
        self.chats.insert(
            name.to_string(),
            ChatState {
                history: snapshot.history,
                scratchpad: snapshot.scratchpad,
            },
        );
        self.set_active(name).await;
        info!(chat = name, "chat loaded from disk");
        Ok(())
    }

    /// Save the active chat (history, scratchpad, metadata).
    pub fn save_current(&self, description: Option<&str>) -> Result<(), StoreError> {
        let state = self.state();
        self.store
            .save(&self.current, &state.history, &state.scratchpad, description)
    }

    /// Load a chat from disk, replacing any live state under that name,
    /// and make it active.
    pub async fn load_chat(&mut self, name: &str) -> Result<usize, StoreError> {
        let snapshot = self.store.load(name)?;
        let messages = snapshot.history.len();
        self.chats.insert(
            name.to_string(),
            ChatState {
                history: snapshot.history,
                scratchpad: snapshot.scratchpad,
            },
        );
        self.set_active(name).await;
        Ok(messages)
    }

    /// Delete a saved chat. Refuses the active chat; deleting a chat that
    /// does not exist is a no-op.
    pub async fn delete_chat(&mut self, name: &str) -> Result<(), StoreError> {
        if name == self.current {
            return Err(StoreError::ChatActive(name.to_string()));
        }
        self.store.delete(name)?;
        self.chats.remove(name);
        Ok(())
    }

    /// Names and sizes of chats live in memory; the active one is flagged.
    pub fn list_active(&self) -> Vec<(String, usize, bool)> {
        let mut chats: Vec<(String, usize, bool)> = self
            .chats
            .iter()
            .map(|(name, state)| (name.clone(), state.history.len(), name == &self.current))
            .collect();
        chats.sort_by(|a, b| a.0.cmp(&b.0));
        chats
    }

    /// Saved chats on disk, most recent first.
    pub fn list_saved(&self) -> Vec<ChatMetadata> {
        self.store.list()
    }

    async fn set_active(&mut self, name: &str) {
        self.current = name.to_string();
        *self.active_chat.write().await = name.to_string();
    }
}

fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_list = tools.descriptions_block();
    format!(
        "You are a ReAct agent (Thought → Action → Observation loop).\n\n\
RESPONSE FORMAT — MANDATORY:\n\
<THOUGHT>your reasoning<TOOL>tool_name<PARAMS>{{\"param\": \"value\"}}<END>\n\n\
RULES:\n\
1. EVERY reply uses the flag format above, nothing else.\n\
2. <PARAMS> is a one-line JSON object.\n\
3. Multi-line payloads (file contents, code) go in a <CONTENT> block before <END>.\n\
4. To finish: <TOOL>finish<PARAMS>{{\"final_answer\": \"your answer\"}}<END>\n\n\
SEARCH WORKFLOW:\n\
internet_search → web_fetch(url) → web_search_in_page(url, query) → create_file → finish\n\
Never repeat web_fetch on a URL you already fetched — the page is in an earlier observation.\n\n\
AVAILABLE TOOLS:\n{tool_list}"
    )
}

fn format_error_observation(cycle: usize) -> String {
    format!(
        "Observation: FORMAT ERROR (cycle {cycle}): your reply does not match the required format.\n\
Required: <THOUGHT>your reasoning<TOOL>tool_name<PARAMS>{{\"param\": \"value\"}}<END>\n\
Example: <THOUGHT>Read the file<TOOL>read_file<PARAMS>{{\"file_path\": \"test.py\"}}<END>\n\
Fix your reply NOW."
    )
}

fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingTool, FailingTool, ScriptedModel};
    use hearth_memory::HashingEmbedder;

    struct Fixture {
        agent: Agent,
        llm: Arc<ScriptedModel>,
        _dir: tempfile::TempDir,
    }

    fn fixture(responses: Vec<&str>, tools: Vec<Arc<dyn hearth_core::Tool>>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedModel::new(responses));
        let memory = Arc::new(MemoryManager::new(
            dir.path().to_path_buf(),
            Arc::new(HashingEmbedder::default()),
        ));
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        let store = ChatStore::new(dir.path().join("chats"));
        let agent = Agent::new(
            llm.clone(),
            memory,
            Arc::new(registry),
            store,
            Arc::new(RwLock::new(DEFAULT_CHAT.to_string())),
            AgentConfig::default(),
        );
        Fixture {
            agent,
            llm,
            _dir: dir,
        }
    }

    const PLAN: &str = "1. do the step\n2. finish";

    fn flag(tool: &str, params: &str) -> String {
        format!("<THOUGHT>\nnext step\n<TOOL>\n{tool}\n<PARAMS>\n{params}\n<END>")
    }

    fn finish(answer: &str) -> String {
        flag("finish", &format!("{{\"final_answer\": \"{answer}\"}}"))
    }

    #[tokio::test]
    async fn file_creation_scenario() {
        // Scenario S1: create_file with file_path + content, then finish.
        let create = Arc::new(CountingTool::write("create_file", "file created"));
        let search = Arc::new(CountingTool::network("internet_search", "results"));
        let response = "<THOUGHT>\ncreate the file\n<TOOL>\ncreate_file\n<PARAMS>\n{\"file_path\": \"hello.py\"}\n<CONTENT>\ndef greet(name):\n    return f\"hello {name}\"\n<END>";

        let mut fx = fixture(
            vec![PLAN, response, &finish("created hello.py")],
            vec![create.clone(), search.clone()],
        );
        let outcome = fx.agent.run_task("create file hello.py with a greet function").await;

        match outcome {
            TaskOutcome::Finished { answer, cycles } => {
                assert_eq!(answer, "created hello.py");
                assert_eq!(cycles, 2);
            }
            other => panic!("expected Finished, got {other:?}"),
        }

        assert_eq!(create.executions(), 1);
        let params = &create.recorded_params()[0];
        assert_eq!(params["file_path"], "hello.py");
        assert!(params["content"].as_str().unwrap().contains("def greet"));
        // No network tools invoked
        assert_eq!(search.executions(), 0);
    }

    #[tokio::test]
    async fn search_scenario_with_duplicate_fetch_blocked() {
        // Scenario S2 + property 6: the repeated web_fetch is
        // short-circuited; only one real fetch happens.
        let search = Arc::new(CountingTool::network(
            "internet_search",
            "1. https://example.com/python313",
        ));
        let fetch = Arc::new(CountingTool::network("web_fetch", "<html>python news</html>"));
        let in_page = Arc::new(CountingTool::network("web_search_in_page", "Python 3.13 adds JIT"));
        let create = Arc::new(CountingTool::write("create_file", "saved"));

        let fetch_call = flag("web_fetch", "{\"url\": \"https://example.com/python313\"}");
        let mut fx = fixture(
            vec![
                PLAN,
                &flag("internet_search", "{\"query\": \"Python 3.13\"}"),
                &fetch_call,
                &fetch_call, // duplicate — must be refused
                &flag(
                    "web_search_in_page",
                    "{\"url\": \"https://example.com/python313\", \"query\": \"what's new\"}",
                ),
                &flag("create_file", "{\"file_path\": \"python313.md\"}"),
                &finish("saved the findings"),
            ],
            vec![search.clone(), fetch.clone(), in_page.clone(), create.clone()],
        );

        let outcome = fx.agent.run_task("find info about Python 3.13 and save it").await;
        assert!(matches!(outcome, TaskOutcome::Finished { .. }));

        assert_eq!(search.executions(), 1);
        assert_eq!(fetch.executions(), 1, "second fetch must not hit the network");
        assert_eq!(in_page.executions(), 1);
        assert_eq!(create.executions(), 1);

        // The guidance observation landed in history
        assert!(fx
            .agent
            .history()
            .iter()
            .any(|m| m.content.contains("duplicate call refused")));
    }

    #[tokio::test]
    async fn parse_error_injects_correction_then_recovers() {
        let read = Arc::new(CountingTool::read("read_file", "contents"));
        let mut fx = fixture(
            vec![
                PLAN,
                "I will just chat instead of using the format.",
                &flag("read_file", "{\"file_path\": \"a.txt\"}"),
                &finish("done"),
            ],
            vec![read.clone()],
        );

        let outcome = fx.agent.run_task("read a.txt").await;
        assert!(matches!(outcome, TaskOutcome::Finished { .. }));
        assert_eq!(read.executions(), 1);
        assert!(fx
            .agent
            .history()
            .iter()
            .any(|m| m.content.contains("FORMAT ERROR")));
    }

    #[tokio::test]
    async fn parse_failure_budget_aborts() {
        let mut fx = fixture(
            vec![PLAN, "nope", "still nope", "never a tool call"],
            vec![],
        );
        let outcome = fx.agent.run_task("anything").await;
        match outcome {
            TaskOutcome::Aborted { reason } => assert!(reason.contains("format errors")),
            other => panic!("expected Aborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn tool_failure_triggers_reflection_directive() {
        let failing = Arc::new(FailingTool::new("run_shell_command"));
        let mut fx = fixture(
            vec![
                PLAN,
                &flag("run_shell_command", "{\"command\": \"explode\"}"),
                &finish("gave up"),
            ],
            vec![failing],
        );

        let outcome = fx.agent.run_task("run something").await;
        assert!(matches!(outcome, TaskOutcome::Finished { .. }));

        // The cycle after the failure carries the self-reflection directive.
        let requests = fx.llm.requests();
        let after_failure = &requests[requests.len() - 1];
        let last_msg = &after_failure.messages.last().unwrap().content;
        assert!(
            last_msg.contains("failed with"),
            "expected reflection directive, got: {last_msg}"
        );
        assert!(last_msg.contains("different approach"));
    }

    #[tokio::test]
    async fn cycle_limit_returns_last_state() {
        let read = Arc::new(CountingTool::read("read_file", "same contents"));
        let call = flag("read_file", "{\"file_path\": \"a.txt\"}");
        let mut responses = vec![PLAN.to_string()];
        for _ in 0..10 {
            responses.push(call.clone());
        }

        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedModel::new(
            responses.iter().map(String::as_str).collect(),
        ));
        let memory = Arc::new(MemoryManager::new(
            dir.path().to_path_buf(),
            Arc::new(HashingEmbedder::default()),
        ));
        let mut registry = ToolRegistry::new();
        registry.register(read.clone());
        let mut agent = Agent::new(
            llm,
            memory,
            Arc::new(registry),
            ChatStore::new(dir.path().join("chats")),
            Arc::new(RwLock::new(DEFAULT_CHAT.to_string())),
            AgentConfig {
                max_cycles: 5,
                ..AgentConfig::default()
            },
        );

        let outcome = agent.run_task("loop forever").await;
        match outcome {
            TaskOutcome::CycleLimit {
                last_thought,
                last_observation,
            } => {
                assert_eq!(last_thought, "next step");
                assert!(last_observation.contains("same contents"));
            }
            other => panic!("expected CycleLimit, got {other:?}"),
        }
        assert_eq!(read.executions(), 5);
    }

    #[tokio::test]
    async fn model_failure_aborts_without_panic() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(ScriptedModel::failing());
        let memory = Arc::new(MemoryManager::new(
            dir.path().to_path_buf(),
            Arc::new(HashingEmbedder::default()),
        ));
        let mut agent = Agent::new(
            llm,
            memory,
            Arc::new(ToolRegistry::new()),
            ChatStore::new(dir.path().join("chats")),
            Arc::new(RwLock::new(DEFAULT_CHAT.to_string())),
            AgentConfig::default(),
        );

        let outcome = agent.run_task("anything").await;
        assert!(matches!(outcome, TaskOutcome::Aborted { .. }));
    }

    #[tokio::test]
    async fn finish_auto_saves_chat() {
        let mut fx = fixture(vec![PLAN, &finish("done")], vec![]);
        let outcome = fx.agent.run_task("trivial").await;
        assert!(matches!(outcome, TaskOutcome::Finished { .. }));

        let saved = fx.agent.list_saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].name, DEFAULT_CHAT);
        assert!(saved[0].messages_count > 0);
    }

    #[tokio::test]
    async fn successful_remembered_tool_feeds_memory_and_scratchpad() {
        let fetch = Arc::new(CountingTool::network(
            "web_fetch",
            "page at https://docs.python.org/3.13/whatsnew lists version 3.13.0",
        ));
        let mut fx = fixture(
            vec![
                PLAN,
                &flag("web_fetch", "{\"url\": \"https://docs.python.org/3.13/whatsnew\"}"),
                &finish("done"),
            ],
            vec![fetch],
        );

        let outcome = fx.agent.run_task("look up python news").await;
        assert!(matches!(outcome, TaskOutcome::Finished { .. }));

        // The fact reached the scratchpad…
        assert!(fx
            .agent
            .scratchpad()
            .recent_facts
            .iter()
            .any(|f| f.contains("docs.python.org")));
        // …and the chat scope of L3.
        let records = fx
            .agent
            .memory
            .list(&MemoryScope::Chat(DEFAULT_CHAT.into()))
            .await
            .unwrap();
        assert!(records.iter().any(|r| r.text.contains("docs.python.org")));
    }

    #[tokio::test]
    async fn chat_lifecycle_roundtrip() {
        // Scenario S6 core: save, "restart", load — same history; memory
        // query finds the record inserted during the task.
        let create = Arc::new(CountingTool::write(
            "create_file",
            "created hello.py and greeter.py for the greeting module",
        ));
        let response = "<THOUGHT>\ngo\n<TOOL>\ncreate_file\n<PARAMS>\n{\"file_path\": \"hello.py\"}\n<CONTENT>\ndef greet():\n    return \"hello\"\n<END>";
        let mut fx = fixture(
            vec![PLAN, response, &finish("done")],
            vec![create],
        );

        fx.agent.new_chat("demo").await.unwrap();
        let outcome = fx.agent.run_task("create file hello.py").await;
        assert!(matches!(outcome, TaskOutcome::Finished { .. }));
        fx.agent.save_current(Some("demo chat")).unwrap();

        let saved_len = fx.agent.history().len();

        // "Restart": switch away, drop live state, load from disk.
        fx.agent.switch_chat(DEFAULT_CHAT).await.unwrap();
        fx.agent.chats.remove("demo");
        fx.agent.load_chat("demo").await.unwrap();

        assert_eq!(fx.agent.current_chat(), "demo");
        assert_eq!(fx.agent.history().len(), saved_len);

        let hits = fx
            .agent
            .memory
            .search(
                &[MemoryScope::Chat("demo".into())],
                "hello.py",
                3,
            )
            .await;
        assert!(hits.iter().any(|h| h.record.text.contains("hello.py")));
    }

    #[tokio::test]
    async fn delete_refuses_active_chat() {
        let mut fx = fixture(vec![], vec![]);
        fx.agent.new_chat("doomed").await.unwrap();
        let err = fx.agent.delete_chat("doomed").await.unwrap_err();
        assert!(matches!(err, StoreError::ChatActive(_)));

        fx.agent.switch_chat(DEFAULT_CHAT).await.unwrap();
        fx.agent.delete_chat("doomed").await.unwrap();
        // Idempotent
        fx.agent.delete_chat("doomed").await.unwrap();
    }
}
