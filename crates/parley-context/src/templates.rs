/// Instructions for rolling summary generation
///
/// Placeholders: `<rules>`, `<previous_summaries>`, `<glimpses>`, `<recent_messages>`
pub const DEFAULT_SUMMARIZATION_PROMPT: &str = r#"You maintain a running summary of a chat between a user and a character.

Character rules:
<rules>

Previous summaries (oldest first):
<previous_summaries>

Moments sampled across the whole conversation:
<glimpses>

Most recent messages:
<recent_messages>

Write one compact paragraph that carries forward facts, names, preferences and open threads from the previous summaries and adds what is new. Do not invent details. Do not address the user."#;

/// The turn message sent alongside the summarization prompt
pub const SUMMARY_INSTRUCTION: &str = "Write the updated summary now.";

pub(crate) const NONE_YET: &str = "None yet.";
