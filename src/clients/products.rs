use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{http_client, non_blank, send_json, ClientError};

/// What a barcode lookup knows about a product. `None` means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub barcode: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
}

#[async_trait]
pub trait ProductLookup: Send + Sync {
    async fn lookup(&self, barcode: &str) -> Result<ProductInfo, ClientError>;
}

/// EAN-8, UPC-A, EAN-13 and GTIN-14 are all 8 to 14 digits.
pub fn is_valid_barcode(barcode: &str) -> bool {
    lazy_static! {
        static ref BARCODE_RE: Regex = Regex::new(r"^[0-9]{8,14}$").unwrap();
    }
    BARCODE_RE.is_match(barcode)
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    product: Option<ProductWire>,
}

#[derive(Debug, Deserialize)]
struct ProductWire {
    product_name: Option<String>,
    brands: Option<String>,
    image_front_small_url: Option<String>,
}

fn into_info(barcode: &str, resp: ProductResponse) -> Result<ProductInfo, ClientError> {
    let p = resp.product.ok_or(ClientError::NotFound)?;
    Ok(ProductInfo {
        barcode: barcode.to_string(),
        name: non_blank(p.product_name),
        brand: non_blank(p.brands),
        image_url: non_blank(p.image_front_small_url),
    })
}

/// Open Food Facts v2 product endpoint.
pub struct OpenFoodFactsClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OpenFoodFactsClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl ProductLookup for OpenFoodFactsClient {
    #[instrument(skip(self))]
    async fn lookup(&self, barcode: &str) -> Result<ProductInfo, ClientError> {
        let url = format!("{}/api/v2/product/{}.json", self.base_url, barcode);
        let resp: ProductResponse = match send_json(self.http.get(url), self.timeout).await {
            Ok(r) => r,
            Err(ClientError::InvalidResponse { status: 404, .. }) => {
                return Err(ClientError::NotFound)
            }
            Err(e) => return Err(e),
        };
        let info = into_info(barcode, resp)?;
        debug!(found_name = info.name.is_some(), "product lookup finished");
        Ok(info)
    }
}
