use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{http_client, send_json, ClientError};
use crate::config::RecipesConfig;

/// Page size requested from the search API.
const PAGE: &str = "10";

/// A recipe as returned by the search service. Pass-through data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub uri: String,
    pub label: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "yield")]
    pub servings: Option<f64>,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default, alias = "dietLabels")]
    pub diet_labels: Vec<String>,
    #[serde(default, alias = "healthLabels")]
    pub health_labels: Vec<String>,
    #[serde(default, alias = "ingredientLines")]
    pub ingredient_lines: Vec<String>,
    #[serde(default, alias = "cuisineType")]
    pub cuisine_type: Vec<String>,
    #[serde(default, alias = "mealType")]
    pub meal_type: Vec<String>,
    #[serde(default, alias = "dishType")]
    pub dish_type: Vec<String>,
}

#[async_trait]
pub trait RecipeSearch: Send + Sync {
    async fn search(&self, ingredients: &[String]) -> Result<Vec<Recipe>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    recipe: Recipe,
}

/// Joins ingredient names the way the search API expects (`a,b,c`).
pub fn join_ingredients(ingredients: &[String]) -> String {
    ingredients
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Edamam recipe search.
pub struct EdamamClient {
    http: reqwest::Client,
    base_url: String,
    app_id: String,
    app_key: String,
    timeout: Duration,
}

impl EdamamClient {
    pub fn new(cfg: &RecipesConfig, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: cfg.url.trim_end_matches('/').to_string(),
            app_id: cfg.app_id.clone(),
            app_key: cfg.app_key.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl RecipeSearch for EdamamClient {
    #[instrument(skip(self))]
    async fn search(&self, ingredients: &[String]) -> Result<Vec<Recipe>, ClientError> {
        if self.app_id.is_empty() || self.app_key.is_empty() {
            return Err(ClientError::Unconfigured("RECIPES_APP_ID/RECIPES_APP_KEY"));
        }
        let q = join_ingredients(ingredients);
        let req = self.http.get(format!("{}/search", self.base_url)).query(&[
            ("q", q.as_str()),
            ("app_id", self.app_id.as_str()),
            ("app_key", self.app_key.as_str()),
            ("from", "0"),
            ("to", PAGE),
        ]);
        let resp: SearchResponse = send_json(req, self.timeout).await?;
        let recipes: Vec<Recipe> = resp.hits.into_iter().map(|h| h.recipe).collect();
        debug!(count = recipes.len(), "recipe search finished");
        Ok(recipes)
    }
}
