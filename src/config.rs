use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_RECOGNITION_URL: &str = "https://vision.foodvisor.io/api/1.0/en/analysis/";
pub const DEFAULT_GENERATIVE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";
pub const DEFAULT_PRODUCTS_URL: &str = "https://world.openfoodfacts.org";
pub const DEFAULT_RECIPES_URL: &str = "https://api.edamam.com";

/// Largest accepted `EXPIRING_SOON_DAYS` (ten years).
pub const MAX_EXPIRING_SOON_DAYS: i64 = 3650;

/// Food recognition upstream (image → label + confidence).
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    pub url: String,
    pub api_key: String,
}

/// Generative text upstream used for shelf-life estimates.
#[derive(Debug, Clone)]
pub struct GenerativeConfig {
    pub url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct RecipesConfig {
    pub url: String,
    pub app_id: String,
    pub app_key: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub recognition: RecognitionConfig,
    pub generative: GenerativeConfig,
    pub products_url: String,
    pub recipes: RecipesConfig,
    pub remote_timeout_secs: u64,
    pub max_image_bytes: usize,
    pub expiring_soon_days: i64,
    pub seed_demo_items: bool,
    pub scan_ttl_secs: u64,
    pub max_pending_scans: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let recognition = RecognitionConfig {
            url: env_or("RECOGNITION_URL", DEFAULT_RECOGNITION_URL),
            api_key: env_or("RECOGNITION_API_KEY", ""),
        };
        let generative = GenerativeConfig {
            url: env_or("GENERATIVE_URL", DEFAULT_GENERATIVE_URL),
            api_key: env_or("GENERATIVE_API_KEY", ""),
        };
        let recipes = RecipesConfig {
            url: env_or("RECIPES_URL", DEFAULT_RECIPES_URL),
            app_id: env_or("RECIPES_APP_ID", ""),
            app_key: env_or("RECIPES_APP_KEY", ""),
        };
        let cfg = Self {
            host: env_or("APP_HOST", "0.0.0.0"),
            port: env_parse("APP_PORT").unwrap_or(8080),
            recognition,
            generative,
            products_url: env_or("PRODUCTS_URL", DEFAULT_PRODUCTS_URL),
            recipes,
            remote_timeout_secs: env_parse("REMOTE_TIMEOUT_SECS").unwrap_or(20),
            max_image_bytes: env_parse("MAX_IMAGE_BYTES").unwrap_or(2 * 1024 * 1024),
            expiring_soon_days: env_parse("EXPIRING_SOON_DAYS").unwrap_or(5),
            seed_demo_items: env_parse("SEED_DEMO_ITEMS").unwrap_or(false),
            scan_ttl_secs: env_parse("SCAN_TTL_SECS").unwrap_or(60 * 60),
            max_pending_scans: env_parse("MAX_PENDING_SCANS").unwrap_or(256),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.remote_timeout_secs > 0, "REMOTE_TIMEOUT_SECS must be positive");
        anyhow::ensure!(self.max_image_bytes > 0, "MAX_IMAGE_BYTES must be positive");
        anyhow::ensure!(
            (0..=MAX_EXPIRING_SOON_DAYS).contains(&self.expiring_soon_days),
            "EXPIRING_SOON_DAYS must be between 0 and {MAX_EXPIRING_SOON_DAYS}"
        );
        anyhow::ensure!(self.max_pending_scans > 0, "MAX_PENDING_SCANS must be positive");
        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn scan_ttl(&self) -> Duration {
        Duration::from_secs(self.scan_ttl_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }

    pub fn expiring_soon_window(&self) -> time::Duration {
        time::Duration::days(self.expiring_soon_days)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        recognition: RecognitionConfig {
            url: "http://recognition.test".into(),
            api_key: "test".into(),
        },
        generative: GenerativeConfig {
            url: "http://generative.test".into(),
            api_key: "test".into(),
        },
        products_url: "http://products.test".into(),
        recipes: RecipesConfig {
            url: "http://recipes.test".into(),
            app_id: "test".into(),
            app_key: "test".into(),
        },
        remote_timeout_secs: 5,
        max_image_bytes: 2 * 1024 * 1024,
        expiring_soon_days: 5,
        seed_demo_items: false,
        scan_ttl_secs: 60 * 60,
        max_pending_scans: 256,
    }
}
