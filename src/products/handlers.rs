use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::clients::products::{is_valid_barcode, ProductInfo};
use crate::clients::upstream_error;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/products/:barcode", get(lookup_product))
}

/// GET /products/:barcode
#[instrument(skip(state))]
pub async fn lookup_product(
    State(state): State<AppState>,
    Path(barcode): Path<String>,
) -> Result<Json<ProductInfo>, (StatusCode, String)> {
    let barcode = barcode.trim();
    if !is_valid_barcode(barcode) {
        warn!(%barcode, "invalid barcode");
        return Err((
            StatusCode::BAD_REQUEST,
            "barcode must be 8 to 14 digits".into(),
        ));
    }
    let info = state.products.lookup(barcode).await.map_err(upstream_error)?;
    info!(%barcode, name = ?info.name, "product found");
    Ok(Json(info))
}
