/// Default base URL for the chat-completions endpoint. Any OpenAI-compatible
/// server works; override with `pasteup config --set-base-url`.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Instruction prepended to the user's pasted content when asking the model
/// to merge it into an existing file.
pub const REFACTORING_INSTRUCTION: &str = "User requested refactor of a file. \
In your response send the full updated file, without explanations or any \
other text. Never abbreviate unchanged fragments.";
