//! Gitvault Service: a transactional document store on top of a Git
//! repository's object graph, with an in-memory fallback.
//!
//! Default: http://127.0.0.1:9110/

mod attributes;
mod codec;
mod commit;
mod config;
mod domains;
mod error;
mod event_log;
mod fallback;
mod game;
mod graph;
mod http;
mod index;
mod remote;
mod retry;
mod routes;
mod vault;

use config::{Config, RemoteConfig};
use graph::GithubGraph;
use routes::AppState;
use std::sync::Arc;
use std::time::Instant;
use vault::Vault;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = Config::from_env();

    let vault = match &config.remote {
        RemoteConfig::Configured(settings) => {
            log::info!("Using repository {}", settings.full_name());
            let graph = GithubGraph::new(http::shared_client().clone(), settings.clone());
            Some(Arc::new(Vault::remote(Arc::new(graph), &config.store)))
        }
        RemoteConfig::Absent => {
            log::warn!("GITHUB_REPO/GITHUB_TOKEN not set, using the in-memory fallback store");
            Some(Arc::new(Vault::fallback()))
        }
        RemoteConfig::Invalid(msg) => {
            log::error!("Remote store misconfigured: {}", msg);
            None
        }
    };

    let port = config.port;
    let state = Arc::new(AppState {
        config,
        vault,
        start_time: Instant::now(),
    });

    let cors = tower_http::cors::CorsLayer::permissive();

    let app = axum::Router::new()
        // Ideas
        .route("/rpc/ideas/capture", axum::routing::post(routes::ideas_capture))
        .route("/rpc/ideas/list", axum::routing::get(routes::ideas_list))
        .route("/rpc/ideas/read", axum::routing::post(routes::ideas_read))
        .route("/rpc/ideas/save", axum::routing::post(routes::ideas_save))
        .route("/rpc/ideas/delete", axum::routing::post(routes::ideas_delete))
        // Projects
        .route(
            "/rpc/projects/create",
            axum::routing::post(routes::projects_create),
        )
        .route("/rpc/projects/list", axum::routing::get(routes::projects_list))
        .route("/rpc/projects/read", axum::routing::post(routes::projects_read))
        .route("/rpc/projects/save", axum::routing::post(routes::projects_save))
        .route(
            "/rpc/projects/delete",
            axum::routing::post(routes::projects_delete),
        )
        // Tasks
        .route("/rpc/tasks/create", axum::routing::post(routes::tasks_create))
        .route("/rpc/tasks/list", axum::routing::post(routes::tasks_list))
        .route("/rpc/tasks/read", axum::routing::post(routes::tasks_read))
        .route("/rpc/tasks/save", axum::routing::post(routes::tasks_save))
        .route("/rpc/tasks/delete", axum::routing::post(routes::tasks_delete))
        .route("/rpc/tasks/seed-daily", axum::routing::post(routes::tasks_seed_daily))
        // Journal
        .route("/rpc/journal/get", axum::routing::get(routes::journal_get))
        .route("/rpc/journal/save", axum::routing::post(routes::journal_save))
        .route("/rpc/journal/stats", axum::routing::get(routes::journal_stats))
        // XP & focus
        .route("/rpc/xp/award", axum::routing::post(routes::xp_award))
        .route("/rpc/xp/history", axum::routing::get(routes::xp_history))
        .route("/rpc/xp/profile", axum::routing::get(routes::xp_profile))
        .route(
            "/rpc/focus/complete",
            axum::routing::post(routes::focus_complete),
        )
        .route("/rpc/focus/stats", axum::routing::get(routes::focus_stats))
        // Service
        .route("/rpc/commit", axum::routing::post(routes::commit))
        .route("/rpc/status", axum::routing::get(routes::status))
        .with_state(state)
        .layer(cors);

    let addr = format!("127.0.0.1:{}", port);
    log::info!("Gitvault Service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}
