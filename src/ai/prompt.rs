//! The assistant's system prompt.
//!
//! The prompt is a fixed set of behavior rules plus two static
//! reference blocks the assistant answers from. The blocks live as
//! text assets under `prompts/` so the content can be revised without
//! touching code, and are compiled in with `include_str!`.

const INSTRUCTIONS: &str = include_str!("../../prompts/system.md");

const COST_OPTIMIZATION: &str = include_str!("../../prompts/cost_optimization.md");

const ACTIVITY_STATS: &str = include_str!("../../prompts/activity_stats.md");

/// Assemble the full system prompt: behavior rules followed by the
/// reference blocks
pub fn system_prompt() -> String {
    format!("{INSTRUCTIONS}\n{COST_OPTIMIZATION}\n{ACTIVITY_STATS}")
}
