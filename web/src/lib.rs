/*
 * SPDX-FileCopyrightText: 2025 Wavelens UG <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

pub mod endpoints;
pub mod error;

#[cfg(test)]
mod tests;

use axum::Router;
use axum::routing::{get, post};
use beanaries_core::input::url_to_addr;
use beanaries_core::types::ServerState;
use scraper::scheduler::ConfigScheduler;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct WebState {
    pub server: Arc<ServerState>,
    pub scheduler: ConfigScheduler,
}

pub fn create_router(state: WebState) -> Router {
    Router::new()
        .route("/api/health", get(endpoints::get_health))
        .route(
            "/api/scheduler/status",
            get(endpoints::scheduler::get_status),
        )
        .route(
            "/api/scheduler/trigger",
            post(endpoints::scheduler::post_trigger),
        )
        .fallback(endpoints::handle_404)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve_web(server: Arc<ServerState>, scheduler: ConfigScheduler) -> std::io::Result<()> {
    let addr = url_to_addr(&server.cli.ip, server.cli.port.into())
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let app = create_router(WebState { server, scheduler });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Serving HTTP API");
    axum::serve(listener, app).await
}
