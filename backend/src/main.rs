use std::net::SocketAddr;

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, Level};

mod db;
mod domain;
mod rest;

use rest::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Setting up database");
    let db = db::DbConnection::init().await?;
    let state = AppState::new(db);

    // Background sweep: expire membership votes whose deadline passed
    // without resolving.
    let vote_sweeper = state.votes.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            match vote_sweeper.expire_due().await {
                Ok(0) => {}
                Ok(n) => info!("Expired {} overdue membership votes", n),
                Err(e) => tracing::error!("Vote expiry sweep failed: {:?}", e),
            }
        }
    });

    // CORS setup to allow the web client to make requests
    let cors = CorsLayer::new()
        .allow_origin("http://localhost:8080".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(rest::health))
        .route("/users", post(rest::register_user))
        .route("/auth/me", get(rest::get_me))
        .route("/auth/link-mavapay", post(rest::link_mavapay))
        .route("/trust/score", get(rest::get_trust_score))
        .route("/trust/history", get(rest::get_trust_history))
        .route("/groups", get(rest::list_groups).post(rest::create_group))
        .route("/groups/:id", get(rest::get_group))
        .route("/groups/:id/join", post(rest::join_group))
        .route("/groups/:id/status", put(rest::set_group_status))
        .route("/groups/:id/advance", post(rest::advance_cycle))
        .route("/votes", get(rest::list_votes))
        .route("/votes/:id", post(rest::cast_vote).put(rest::edit_vote))
        .route("/payments", get(rest::list_payments))
        .route("/payments/invoice", post(rest::create_invoice))
        .route("/payments/verify", post(rest::verify_payment))
        .route("/payouts", get(rest::list_payouts))
        .route("/payouts/queue", get(rest::payout_queue))
        .route("/payouts/request", post(rest::request_payout));

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(state);

    // Start the server
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
