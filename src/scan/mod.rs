//! Photo scanning: capture, JPEG preparation, food recognition and
//! shelf-life estimation, then confirmation into the inventory.

pub mod capture;
mod dto;
pub mod estimate;
pub mod handlers;
pub mod image;
pub mod pipeline;
pub mod registry;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
