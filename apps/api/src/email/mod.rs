// Email generation: template table, upload intake, prompt assembly, handlers.
// All LLM calls go through llm_client via the TextGenerator in AppState.

pub mod extract;
pub mod handlers;
pub mod prompts;
pub mod templates;
pub mod upload;
