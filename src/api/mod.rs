// API module - HTTP endpoints

use axum::{routing::get_service, Router};
use std::path::Path;
use tower_http::{cors::CorsLayer, services::ServeDir};

pub mod admin;
pub mod alerts;
pub mod auth;
pub mod drones;
pub mod functions;
pub mod health;
pub mod middleware;
pub mod pages;
pub mod promo_codes;
pub mod reservations;
pub mod subscriptions;

use middleware::session::AppState;

/// Every route of the service, without the session layer
pub fn app(state: AppState) -> Router {
    let static_routes = Router::new().nest_service(
        "/static",
        get_service(ServeDir::new(Path::new("static"))),
    );

    Router::new()
        .merge(pages::router())
        .merge(health::router())
        .merge(auth::router())
        .merge(reservations::router())
        .merge(alerts::router())
        .merge(drones::router())
        .merge(promo_codes::router())
        .merge(subscriptions::router())
        .merge(admin::router())
        .merge(functions::router())
        .merge(static_routes)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
