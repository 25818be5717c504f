//! In-process stand-ins for the upstream services, used by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::generative::TextGenerator;
use super::products::{ProductInfo, ProductLookup};
use super::recipes::{Recipe, RecipeSearch};
use super::recognition::{FoodCandidate, FoodRecognizer};
use super::ClientError;

/// A scripted upstream answer.
#[derive(Debug, Clone)]
pub enum Canned<T> {
    Ok(T),
    /// Succeeds after sleeping.
    Slow(Duration, T),
    Status(u16),
    Timeout,
}

impl<T: Clone> Canned<T> {
    async fn produce(&self) -> Result<T, ClientError> {
        match self {
            Canned::Ok(v) => Ok(v.clone()),
            Canned::Slow(d, v) => {
                tokio::time::sleep(*d).await;
                Ok(v.clone())
            }
            Canned::Status(status) => Err(ClientError::InvalidResponse {
                status: *status,
                message: "scripted failure".into(),
            }),
            Canned::Timeout => Err(ClientError::Timeout(Duration::from_secs(20))),
        }
    }
}

pub struct FakeRecognizer {
    pub canned: Canned<Vec<FoodCandidate>>,
    pub calls: AtomicUsize,
}

impl FakeRecognizer {
    pub fn new(canned: Canned<Vec<FoodCandidate>>) -> Self {
        Self {
            canned,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn labels(labels: &[(&str, f64)]) -> Self {
        Self::new(Canned::Ok(
            labels
                .iter()
                .map(|(l, c)| FoodCandidate {
                    label: l.to_string(),
                    confidence: *c,
                })
                .collect(),
        ))
    }
}

#[async_trait]
impl FoodRecognizer for FakeRecognizer {
    async fn recognize(&self, _jpeg: Bytes) -> Result<Vec<FoodCandidate>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.canned.produce().await
    }
}

pub struct FakeGenerator {
    pub canned: Canned<String>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeGenerator {
    pub fn new(canned: Canned<String>) -> Self {
        Self {
            canned,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(text: &str) -> Self {
        Self::new(Canned::Ok(text.to_string()))
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ClientError> {
        self.prompts.lock().push(prompt.to_string());
        self.canned.produce().await
    }
}

#[derive(Default)]
pub struct FakeProducts {
    pub products: HashMap<String, ProductInfo>,
}

impl FakeProducts {
    pub fn with(mut self, info: ProductInfo) -> Self {
        self.products.insert(info.barcode.clone(), info);
        self
    }
}

#[async_trait]
impl ProductLookup for FakeProducts {
    async fn lookup(&self, barcode: &str) -> Result<ProductInfo, ClientError> {
        self.products
            .get(barcode)
            .cloned()
            .ok_or(ClientError::NotFound)
    }
}

pub struct FakeRecipes {
    pub canned: Canned<Vec<Recipe>>,
    pub queries: Mutex<Vec<Vec<String>>>,
}

impl FakeRecipes {
    pub fn new(canned: Canned<Vec<Recipe>>) -> Self {
        Self {
            canned,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RecipeSearch for FakeRecipes {
    async fn search(&self, ingredients: &[String]) -> Result<Vec<Recipe>, ClientError> {
        self.queries.lock().push(ingredients.to_vec());
        self.canned.produce().await
    }
}

pub fn recipe(label: &str) -> Recipe {
    Recipe {
        uri: format!("urn:recipe:{}", label.to_lowercase().replace(' ', "-")),
        label: label.to_string(),
        image: None,
        source: Some("Test Kitchen".into()),
        url: None,
        servings: Some(2.0),
        calories: Some(420.0),
        diet_labels: vec![],
        health_labels: vec![],
        ingredient_lines: vec![],
        cuisine_type: vec![],
        meal_type: vec![],
        dish_type: vec![],
    }
}
