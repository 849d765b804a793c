mod handlers;
mod session;
mod state;

use std::net::SocketAddr;

use anyhow::Result;
use axum::http::Method;
use axum::routing::get;
use axum::Router;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{info, Level};

use crate::rooms::Rooms;

use self::state::ServerState;

pub struct Server {
  port: u16,
  rooms: Rooms,
}

impl Server {
  pub fn new(port: u16, rooms: Rooms) -> Self {
    Self { port, rooms }
  }

  pub async fn listen(self) -> Result<()> {
    info!("starting server: {}", self.port);
    let addr = SocketAddr::new([0, 0, 0, 0].into(), self.port);
    axum::Server::bind(&addr)
      .serve(app(self.rooms).into_make_service_with_connect_info::<SocketAddr>())
      .await?;

    Ok(())
  }
}

pub fn app(rooms: Rooms) -> Router {
  let state = ServerState::new(rooms);
  Router::new()
    .route("/", get(handlers::sync))
    .route("/info", get(handlers::info))
    .layer(cors())
    .layer(trace())
    .with_state(state)
}

fn cors() -> CorsLayer {
  CorsLayer::new().allow_methods([Method::GET]).allow_origin(Any)
}

fn trace() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
  TraceLayer::new_for_http()
    .on_response(DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Micros))
}
