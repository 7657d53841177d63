pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;

pub use state::RegistryState;

pub fn build_router(state: RegistryState) -> Router {
    Router::new()
        .route("/default_registry", post(handlers::register).get(handlers::lookup))
        .with_state(state)
}
