//! Axum route handlers for the gitvault RPC API.

use crate::config::{Config, RemoteConfig};
use crate::domains::today_local;
use crate::error::StoreError;
use crate::game;
use crate::vault::Vault;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use chrono::Utc;
use gitvault_types::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub config: Config,
    /// `None` when the remote configuration is invalid
    pub vault: Option<Arc<Vault>>,
    pub start_time: Instant,
}

impl AppState {
    fn vault(&self) -> Result<&Vault, StoreError> {
        match (&self.vault, &self.config.remote) {
            (Some(vault), _) => Ok(vault),
            (None, RemoteConfig::Invalid(msg)) => Err(StoreError::Config(msg.clone())),
            (None, _) => Err(StoreError::Config("store is not initialised".to_string())),
        }
    }
}

type Reply<T> = (StatusCode, Json<RpcResponse<T>>);

fn status_for(err: &StoreError) -> StatusCode {
    match err {
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Config(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Parse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reply<T: Serialize>(result: Result<T, StoreError>) -> Reply<T> {
    match result {
        Ok(data) => (StatusCode::OK, Json(RpcResponse::ok(data))),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                log::error!("[RPC] {}", e);
            }
            (status, Json(RpcResponse::err(e.to_string())))
        }
    }
}

/// Like `reply`, with `None` reported as 404.
fn found<T: Serialize>(result: Result<Option<T>, StoreError>, what: &str, id: &str) -> Reply<T> {
    reply(result.and_then(|item| item.ok_or_else(|| StoreError::NotFound(format!("{} {} not found", what, id)))))
}

fn view<I, F>(result: Result<Option<(I, RecordFile<F>)>, StoreError>) -> Result<Option<RecordView<I, F>>, StoreError> {
    result.map(|found| found.map(|(item, file)| RecordView { item, file }))
}

// =====================================================
// Idea Endpoints
// =====================================================

// POST /rpc/ideas/capture
pub async fn ideas_capture(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CaptureIdeaRequest>,
) -> Reply<CreatedRecord> {
    let result = match state.vault() {
        Ok(vault) => vault.capture_idea(req, Utc::now()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// GET /rpc/ideas/list
pub async fn ideas_list(State(state): State<Arc<AppState>>) -> Reply<Vec<IdeaIndexRecord>> {
    let result = match state.vault() {
        Ok(vault) => vault.list_ideas().await,
        Err(e) => Err(e),
    };
    reply(result)
}

// POST /rpc/ideas/read
pub async fn ideas_read(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Reply<RecordView<IdeaIndexRecord, IdeaFrontmatter>> {
    let result = match state.vault() {
        Ok(vault) => view(vault.ideas.read(&req.id).await),
        Err(e) => Err(e),
    };
    found(result, "idea", &req.id)
}

// POST /rpc/ideas/save
pub async fn ideas_save(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateIdeaRequest>,
) -> Reply<IdeaFile> {
    let result = match state.vault() {
        Ok(vault) => vault.save_idea(&req, Utc::now()).await,
        Err(e) => Err(e),
    };
    found(result, "idea", &req.id)
}

// POST /rpc/ideas/delete
pub async fn ideas_delete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Reply<IdeaIndexRecord> {
    let result = match state.vault() {
        Ok(vault) => vault.ideas.delete(&req.id).await,
        Err(e) => Err(e),
    };
    found(result, "idea", &req.id)
}

// =====================================================
// Project Endpoints
// =====================================================

// POST /rpc/projects/create
pub async fn projects_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> Reply<CreatedRecord> {
    let result = match state.vault() {
        Ok(vault) => vault.create_project(req, Utc::now()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// GET /rpc/projects/list
pub async fn projects_list(State(state): State<Arc<AppState>>) -> Reply<Vec<ProjectIndexRecord>> {
    let result = match state.vault() {
        Ok(vault) => vault.projects.list().await,
        Err(e) => Err(e),
    };
    reply(result)
}

// POST /rpc/projects/read
pub async fn projects_read(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Reply<RecordView<ProjectIndexRecord, ProjectFrontmatter>> {
    let result = match state.vault() {
        Ok(vault) => view(vault.projects.read(&req.id).await),
        Err(e) => Err(e),
    };
    found(result, "project", &req.id)
}

// POST /rpc/projects/save
pub async fn projects_save(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateProjectRequest>,
) -> Reply<ProjectFile> {
    let result = match state.vault() {
        Ok(vault) => vault.save_project(&req, Utc::now()).await,
        Err(e) => Err(e),
    };
    found(result, "project", &req.id)
}

// POST /rpc/projects/delete
pub async fn projects_delete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Reply<ProjectIndexRecord> {
    let result = match state.vault() {
        Ok(vault) => vault.projects.delete(&req.id).await,
        Err(e) => Err(e),
    };
    found(result, "project", &req.id)
}

// =====================================================
// Task Endpoints
// =====================================================

// POST /rpc/tasks/create
pub async fn tasks_create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Reply<CreatedRecord> {
    let result = match state.vault() {
        Ok(vault) => vault.create_task(req, Utc::now()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// POST /rpc/tasks/list
pub async fn tasks_list(
    State(state): State<Arc<AppState>>,
    Json(filter): Json<TaskFilter>,
) -> Reply<Vec<TaskIndexRecord>> {
    let result = match state.vault() {
        Ok(vault) => vault.list_tasks(&filter, Utc::now().date_naive()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// POST /rpc/tasks/read
pub async fn tasks_read(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Reply<RecordView<TaskIndexRecord, TaskFrontmatter>> {
    let result = match state.vault() {
        Ok(vault) => view(vault.tasks.read(&req.id).await),
        Err(e) => Err(e),
    };
    found(result, "task", &req.id)
}

// POST /rpc/tasks/save
pub async fn tasks_save(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateTaskRequest>,
) -> Reply<TaskFile> {
    let result = match state.vault() {
        Ok(vault) => vault.save_task(&req, Utc::now()).await,
        Err(e) => Err(e),
    };
    found(result, "task", &req.id)
}

// POST /rpc/tasks/delete
pub async fn tasks_delete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<IdRequest>,
) -> Reply<TaskIndexRecord> {
    let result = match state.vault() {
        Ok(vault) => vault.tasks.delete(&req.id).await,
        Err(e) => Err(e),
    };
    found(result, "task", &req.id)
}

// POST /rpc/tasks/seed-daily
pub async fn tasks_seed_daily(State(state): State<Arc<AppState>>) -> Reply<SeedOutcome> {
    let result = match state.vault() {
        Ok(vault) => vault.seed_daily(Utc::now()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// =====================================================
// Journal Endpoints
// =====================================================

// GET /rpc/journal/get
pub async fn journal_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JournalQuery>,
) -> Reply<JournalFrontmatter> {
    let result = match state.vault() {
        Ok(vault) => vault.get_journal(query.date.as_deref(), today_local()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// POST /rpc/journal/save
pub async fn journal_save(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaveJournalRequest>,
) -> Reply<JournalSaved> {
    let result = match state.vault() {
        Ok(vault) => vault.save_journal(req, today_local(), Utc::now()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// GET /rpc/journal/stats
pub async fn journal_stats(State(state): State<Arc<AppState>>) -> Reply<JournalStats> {
    let result = match state.vault() {
        Ok(vault) => vault.journal_stats(today_local()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// =====================================================
// XP & Focus Endpoints
// =====================================================

// POST /rpc/xp/award
pub async fn xp_award(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AwardXpRequest>,
) -> Reply<AwardOutcome> {
    let result = match state.vault() {
        Ok(vault) => game::award_xp(&vault.xp, req, today_local(), Utc::now()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// GET /rpc/xp/history
pub async fn xp_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Reply<Vec<XpEntry>> {
    let result = match state.vault() {
        Ok(vault) => game::xp_history(&vault.xp, &query).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// GET /rpc/xp/profile
pub async fn xp_profile(State(state): State<Arc<AppState>>) -> Reply<XpProfile> {
    let result = match state.vault() {
        Ok(vault) => game::xp_profile(&vault.xp, today_local()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// POST /rpc/focus/complete
pub async fn focus_complete(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompleteFocusRequest>,
) -> Reply<FocusOutcome> {
    let result = match state.vault() {
        Ok(vault) => game::complete_focus(&vault.focus, req, today_local()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// GET /rpc/focus/stats
pub async fn focus_stats(State(state): State<Arc<AppState>>) -> Reply<FocusStats> {
    let result = match state.vault() {
        Ok(vault) => game::focus_stats(&vault.focus, today_local()).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// =====================================================
// Service Endpoints
// =====================================================

// POST /rpc/commit
pub async fn commit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CommitRequest>,
) -> Reply<CommitResponse> {
    let result = match state.vault() {
        Ok(vault) => vault.commit_raw(req).await,
        Err(e) => Err(e),
    };
    reply(result)
}

// GET /rpc/status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<RpcResponse<ServiceStatus>> {
    let (mode, repository, branch) = match &state.vault {
        Some(vault) => (
            vault.mode().to_string(),
            vault.describe(),
            vault.branch().map(String::from),
        ),
        None => ("misconfigured".to_string(), None, None),
    };
    Json(RpcResponse::ok(ServiceStatus {
        running: true,
        mode,
        repository,
        branch,
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}
