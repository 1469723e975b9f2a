use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tower_sessions::Session;

use crate::api::middleware::{auth::current_actor, session::AppState};
use crate::error::Result;
use crate::services::image_analysis::{AnalysisError, AnalysisReport};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeBody {
    #[serde(default)]
    image_url: String,
    context: Option<String>,
}

/// Runs the vision analysis on one image
async fn analyze_drone_image(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<AnalysisReport>> {
    current_actor(&state, &session).await?;

    if body.image_url.trim().is_empty() {
        return Err(AnalysisError::MissingImageUrl.into());
    }

    let report = state
        .analyzer
        .analyze(&body.image_url, body.context.as_deref())
        .await?;

    Ok(Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/functions/analyze-drone-image", post(analyze_drone_image))
}
