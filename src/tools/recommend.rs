//! MCP `recommend` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `recommend` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RecommendParams {
    /// Free-text mood label, e.g. `"feliz"` or `"nostalgic"`.
    #[schemars(description = "How the user feels right now, as free text (e.g. 'feliz', 'tired')")]
    pub mood: String,

    /// What the user is in the mood for.
    #[schemars(description = "A free-text phrase describing what the user wants to watch, read or play")]
    pub phrase: String,
}
