use crate::clients::generative::{GeminiClient, TextGenerator};
use crate::clients::products::{OpenFoodFactsClient, ProductLookup};
use crate::clients::recipes::{EdamamClient, RecipeSearch};
use crate::clients::recognition::{FoodRecognizer, FoodvisorClient};
use crate::config::AppConfig;
use crate::inventory::{fixtures, repo::Inventory};
use crate::scan::{pipeline::Pipeline, registry::ScanRegistry};
use anyhow::Context;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub inventory: Arc<RwLock<Inventory>>,
    pub pipeline: Arc<Pipeline>,
    pub scans: Arc<ScanRegistry>,
    pub products: Arc<dyn ProductLookup>,
    pub recipes: Arc<dyn RecipeSearch>,
}

impl AppState {
    pub fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let timeout = config.remote_timeout();

        let recognizer = Arc::new(
            FoodvisorClient::new(&config.recognition, timeout).context("build recognition client")?,
        ) as Arc<dyn FoodRecognizer>;
        let generator = Arc::new(
            GeminiClient::new(&config.generative, timeout).context("build generative client")?,
        ) as Arc<dyn TextGenerator>;
        let products = Arc::new(
            OpenFoodFactsClient::new(&config.products_url, timeout)
                .context("build product lookup client")?,
        ) as Arc<dyn ProductLookup>;
        let recipes = Arc::new(
            EdamamClient::new(&config.recipes, timeout).context("build recipe client")?,
        ) as Arc<dyn RecipeSearch>;

        let window = config.expiring_soon_window();
        let inventory = if config.seed_demo_items {
            Inventory::with_items(window, fixtures::demo(OffsetDateTime::now_utc()))
                .context("seed demo items")?
        } else {
            Inventory::new(window)
        };
        tracing::info!(items = inventory.len(), "inventory ready");

        Ok(Self::from_parts(config, inventory, recognizer, generator, products, recipes))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        inventory: Inventory,
        recognizer: Arc<dyn FoodRecognizer>,
        generator: Arc<dyn TextGenerator>,
        products: Arc<dyn ProductLookup>,
        recipes: Arc<dyn RecipeSearch>,
    ) -> Self {
        let pipeline = Pipeline::new(
            recognizer,
            generator,
            config.max_image_bytes,
            config.remote_timeout(),
        );
        let scans = ScanRegistry::with_limits(config.scan_ttl(), config.max_pending_scans);
        Self {
            config,
            inventory: Arc::new(RwLock::new(inventory)),
            pipeline: Arc::new(pipeline),
            scans: Arc::new(scans),
            products,
            recipes,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::clients::fakes::{
            recipe, Canned, FakeGenerator, FakeProducts, FakeRecipes, FakeRecognizer,
        };
        use crate::clients::products::ProductInfo;

        let config = Arc::new(crate::config::test_config());
        let products = FakeProducts::default().with(ProductInfo {
            barcode: "3017620422003".into(),
            name: Some("Hazelnut Spread".into()),
            brand: Some("Ferrero".into()),
            image_url: None,
        });
        Self::from_parts(
            config,
            Inventory::default(),
            Arc::new(FakeRecognizer::labels(&[("Banana", 0.93)])),
            Arc::new(FakeGenerator::reply(
                "{\"storage_type\": \"counter\", \"duration\": 432000}",
            )),
            Arc::new(products),
            Arc::new(FakeRecipes::new(Canned::Ok(vec![recipe("Banana Bread")]))),
        )
    }
}
