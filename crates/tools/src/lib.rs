//! Built-in tool implementations for Hearth.
//!
//! Tools give the agent the ability to act in the world: read and write
//! files, edit code, run shell commands, search the web, and manage its
//! own long-term memory. Each tool declares a JSON schema and a
//! side-effect class; the agent loop uses the latter for loop-protection
//! and finish detection.

pub mod analyze_code;
pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod finish;
pub mod list_directory;
pub mod memory_tools;
pub mod shell;
pub mod web_fetch;
pub mod web_page;
pub mod web_search;

pub use memory_tools::ActiveChat;

use hearth_core::model::Embedder;
use hearth_core::tool::ToolRegistry;
use hearth_memory::MemoryManager;
use std::sync::Arc;

/// Create the default tool registry.
///
/// Shell defaults to an allowlist of common safe commands; memory tools
/// are bound to the given manager and active-chat handle; in-page search
/// shares the process embedder.
pub fn default_registry(
    memory: Arc<MemoryManager>,
    active_chat: ActiveChat,
    embedder: Arc<dyn Embedder>,
) -> ToolRegistry {
    let safe_commands: Vec<String> = [
        "ls", "cat", "head", "tail", "echo", "pwd", "date", "whoami", "wc", "grep", "find",
        "which", "git", "cargo", "rustc", "python", "python3", "pip",
    ]
    .into_iter()
    .map(String::from)
    .collect();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(file_read::ReadFileTool));
    registry.register(Arc::new(file_write::CreateFileTool));
    registry.register(Arc::new(file_write::WriteFileTool));
    registry.register(Arc::new(file_edit::ReplaceInFileTool));
    registry.register(Arc::new(file_edit::EditFileAtLineTool));
    registry.register(Arc::new(list_directory::ListDirectoryTool));
    registry.register(Arc::new(analyze_code::AnalyzeCodeTool));
    registry.register(Arc::new(shell::ShellTool::new(safe_commands)));
    registry.register(Arc::new(web_search::InternetSearchTool::new()));
    registry.register(Arc::new(web_fetch::WebFetchTool::new()));
    registry.register(Arc::new(web_page::WebGetStructureTool::new()));
    registry.register(Arc::new(web_page::WebSearchInPageTool::new(embedder)));
    registry.register(Arc::new(memory_tools::ListMemoriesTool::new(
        memory.clone(),
        active_chat.clone(),
    )));
    registry.register(Arc::new(memory_tools::AddMemoryTool::new(
        memory.clone(),
        active_chat.clone(),
    )));
    registry.register(Arc::new(memory_tools::DeleteMemoryTool::new(
        memory,
        active_chat,
    )));
    registry.register(Arc::new(finish::FinishTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_memory::HashingEmbedder;
    use tokio::sync::RwLock;

    #[test]
    fn default_registry_has_full_tool_set() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        let memory = Arc::new(MemoryManager::new(
            dir.path().to_path_buf(),
            embedder.clone(),
        ));
        let active: ActiveChat = Arc::new(RwLock::new("default".into()));

        let registry = default_registry(memory, active, embedder);
        let names = registry.names();

        for expected in [
            "add_memory",
            "analyze_code",
            "create_file",
            "delete_memory",
            "edit_file_at_line",
            "finish",
            "internet_search",
            "list_directory",
            "list_memories",
            "read_file",
            "replace_in_file",
            "run_shell_command",
            "web_fetch",
            "web_get_structure",
            "web_search_in_page",
            "write_file",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
    }
}
