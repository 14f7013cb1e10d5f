pub mod classify_mood;
pub mod recommend;

use classify_mood::ClassifyMoodParams;
use recommend::RecommendParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use serde::Serialize;
use std::sync::Arc;

use crate::mood::MoodClassifier;
use crate::recommend::{Recommendation, Recommender};

/// JSON body returned by the `recommend` tool.
#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<Recommendation>,
}

/// The mediarec MCP tool handler. Holds the loaded recommender and mood
/// classifier and exposes them via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct MediaTools {
    tool_router: ToolRouter<Self>,
    recommender: Arc<Recommender>,
    classifier: Arc<MoodClassifier>,
}

#[tool_router]
impl MediaTools {
    pub fn new(recommender: Arc<Recommender>, classifier: Arc<MoodClassifier>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            recommender,
            classifier,
        }
    }

    /// Recommend games, books and movies for a mood and a phrase.
    #[tool(description = "Recommend board games, books and movies. Returns the nearest catalog entries to the mood and phrase, closest first, with media type ('juego', 'libro', 'pelicula') and distance.")]
    async fn recommend(
        &self,
        Parameters(params): Parameters<RecommendParams>,
    ) -> Result<String, String> {
        tracing::info!(
            mood_len = params.mood.len(),
            phrase_len = params.phrase.len(),
            "recommend called"
        );

        // Embedding + search are CPU-bound → spawn_blocking
        let recommender = Arc::clone(&self.recommender);
        let recommendations = tokio::task::spawn_blocking(move || {
            recommender.recommend(&params.mood, &params.phrase)
        })
        .await
        .map_err(|e| format!("recommend task failed: {e}"))?
        .map_err(|e| format!("recommend failed: {e}"))?;

        serde_json::to_string(&RecommendResponse { recommendations })
            .map_err(|e| format!("serialization failed: {e}"))
    }

    /// Predict a mood label for free text.
    #[tool(description = "Classify free text into a mood label using the trained mood model.")]
    async fn classify_mood(
        &self,
        Parameters(params): Parameters<ClassifyMoodParams>,
    ) -> Result<String, String> {
        let label = self.classifier.classify(&params.text);
        tracing::info!(label, "classify_mood called");
        Ok(serde_json::json!({ "label": label }).to_string())
    }
}

#[tool_handler]
impl ServerHandler for MediaTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "mediarec recommends board games, books and movies. Use recommend with a mood \
                 and a phrase; use classify_mood to label free text with a mood."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
