mod auth;
mod context;
mod docs;
mod errors;
mod gateway;
mod rooms;
mod schemas;
mod serialized;

use axum::routing::get;
use cuevote_collab::Collab;
use log::info;
use std::{
    env, io,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub use context::*;
pub use errors::*;
pub use gateway::*;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8080;

pub type Router = axum::Router<ServerContext>;

/// Builds the full application router
pub fn app(collab: Arc<Collab>) -> axum::Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .merge(auth::router())
        .merge(gateway::router())
        .nest("/rooms", rooms::router());

    Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(ServerContext::new(collab))
}

/// Starts the cuevote server
pub async fn run_server(collab: Arc<Collab>) -> io::Result<()> {
    let port = match env::var("CUEVOTE_SERVER_PORT") {
        Ok(port) => port.parse::<u16>().map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "Port must be a number")
        })?,
        Err(_) => DEFAULT_PORT,
    };

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();
    let listener = TcpListener::bind(&addr).await?;

    info!("Listening on port {}", port);
    axum::serve(listener, app(collab).into_make_service()).await
}
