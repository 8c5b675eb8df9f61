// crates/todo-tracks-server/src/web/api.rs
// REST API handlers

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use todo_tracks_types::{Alias, BranchStatus, MarkerDetails, MarkerId, MarkerLine, RepoSummary};
use tracing::error;

use crate::error::TrackError;
use crate::repository::Repository;
use crate::web::state::AppState;

/// Request parameters shared by every endpoint; each handler requires its subset
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoQuery {
    pub repo: Option<String>,
    pub revision: Option<String>,
    pub file_name: Option<String>,
    pub line_number: Option<String>,
}

impl RepoQuery {
    fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, TrackError> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TrackError::InvalidInput(format!("missing required parameter '{}'", name)))
    }

    fn revision(&self) -> Result<&str, TrackError> {
        Self::required(&self.revision, "revision")
    }

    fn file_name(&self) -> Result<&str, TrackError> {
        Self::required(&self.file_name, "fileName")
    }

    fn line_number(&self) -> Result<usize, TrackError> {
        let raw = Self::required(&self.line_number, "lineNumber")?;
        raw.parse()
            .map_err(|_| TrackError::InvalidInput(format!("invalid lineNumber '{}'", raw)))
    }
}

/// Handler error: validation failures are 400, everything else 500
pub struct ApiError(TrackError);

impl From<TrackError> for ApiError {
    fn from(err: TrackError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_validation() {
            (StatusCode::BAD_REQUEST, self.0.to_user_string()).into_response()
        } else {
            error!(error = %self.0, "Request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_user_string()).into_response()
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn marker_id(repo: &Repository, query: &RepoQuery) -> Result<MarkerId, TrackError> {
    repo.validate_marker(query.revision()?, query.file_name()?, query.line_number()?)
        .await
}

// ═══════════════════════════════════════
// HEALTH & REPOSITORIES
// ═══════════════════════════════════════

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

pub async fn list_repos(State(state): State<AppState>) -> Json<Vec<RepoSummary>> {
    Json(state.summaries())
}

pub async fn list_aliases(
    State(state): State<AppState>,
    Query(query): Query<RepoQuery>,
) -> ApiResult<Json<Vec<Alias>>> {
    let repo = state.repo(query.repo.as_deref())?;
    Ok(Json(repo.list_aliases().await?))
}

// ═══════════════════════════════════════
// MARKERS
// ═══════════════════════════════════════

pub async fn revision_markers(
    State(state): State<AppState>,
    Query(query): Query<RepoQuery>,
) -> ApiResult<Json<Vec<MarkerLine>>> {
    let repo = state.repo(query.repo.as_deref())?;
    let revision = repo.validate_revision(query.revision()?).await?;
    let markers = repo.revision_markers(&revision).await?;
    Ok(Json(markers.to_vec()))
}

pub async fn file_markers(
    State(state): State<AppState>,
    Query(query): Query<RepoQuery>,
) -> ApiResult<Json<Vec<MarkerLine>>> {
    let repo = state.repo(query.repo.as_deref())?;
    let revision = repo.validate_revision(query.revision()?).await?;
    let path = query.file_name()?;
    repo.validate_path(&revision, path).await?;
    let markers = repo.file_markers(&revision, path).await?;
    Ok(Json(markers.to_vec()))
}

pub async fn marker_details(
    State(state): State<AppState>,
    Query(query): Query<RepoQuery>,
) -> ApiResult<Json<MarkerDetails>> {
    let repo = state.repo(query.repo.as_deref())?;
    let id = marker_id(&repo, &query).await?;
    Ok(Json(repo.marker_details(&id).await?))
}

pub async fn marker_status(
    State(state): State<AppState>,
    Query(query): Query<RepoQuery>,
) -> ApiResult<Json<BranchStatus>> {
    let repo = state.repo(query.repo.as_deref())?;
    let id = marker_id(&repo, &query).await?;
    Ok(Json(repo.marker_status(&id).await?))
}

// ═══════════════════════════════════════
// FILES
// ═══════════════════════════════════════

/// Redirect to a view of the file line; `lineNumber` defaults to 1
pub async fn browse(
    State(state): State<AppState>,
    Query(query): Query<RepoQuery>,
) -> ApiResult<Response> {
    let repo = state.repo(query.repo.as_deref())?;
    let revision = repo.validate_revision(query.revision()?).await?;
    let path = query.file_name()?;
    repo.validate_path(&revision, path).await?;
    let line = match query.line_number {
        Some(_) => query.line_number()?,
        None => 1,
    };

    let url = repo.browse_url(&revision, path, line).await;
    Ok((StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, url)]).into_response())
}

pub async fn raw_file(
    State(state): State<AppState>,
    Query(query): Query<RepoQuery>,
) -> ApiResult<Response> {
    let repo = state.repo(query.repo.as_deref())?;
    let revision = repo.validate_revision(query.revision()?).await?;
    let path = query.file_name()?;
    repo.validate_path(&revision, path).await?;
    let contents = repo.file_contents(&revision, path).await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], contents).into_response())
}
