use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ClassifyMoodParams {
    #[schemars(description = "Text to classify into one of the trained mood labels")]
    pub text: String,
}
