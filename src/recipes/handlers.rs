use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::clients::recipes::Recipe;
use crate::clients::upstream_error;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/recipes", get(search_recipes))
}

#[derive(Debug, Deserialize)]
pub struct RecipeQuery {
    /// Comma-separated ingredient names.
    pub ingredients: Option<String>,
}

fn split_ingredients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// GET /recipes?ingredients=a,b
///
/// Without explicit ingredients, suggests recipes for whatever is about to
/// expire. Nothing to search for means an empty list.
#[instrument(skip(state))]
pub async fn search_recipes(
    State(state): State<AppState>,
    Query(q): Query<RecipeQuery>,
) -> Result<Json<Vec<Recipe>>, (StatusCode, String)> {
    let mut ingredients = q.ingredients.as_deref().map(split_ingredients).unwrap_or_default();
    if ingredients.is_empty() {
        ingredients = state
            .inventory
            .read()
            .await
            .expiring_names(OffsetDateTime::now_utc());
        debug!(count = ingredients.len(), "suggesting from expiring items");
    }
    if ingredients.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let recipes = state.recipes.search(&ingredients).await.map_err(upstream_error)?;
    info!(ingredients = ?ingredients, count = recipes.len(), "recipes found");
    Ok(Json(recipes))
}
