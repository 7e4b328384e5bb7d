//! HTTP endpoint handlers

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use imcite_core::export::{to_csv_bytes, to_xlsx_bytes};
use imcite_core::identifiers::IdentifierSet;
use imcite_core::input::{identifiers_from_text, identifiers_from_upload};
use imcite_core::sources::crossref::CrossrefSource;

use crate::run::{execute_run, Run};
use crate::AppState;

/// Rows shown in the on-page preview.
const PREVIEW_ROWS: usize = 5;

// ===== Web Form =====

pub async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

// ===== Runs =====

#[derive(Debug, Serialize)]
pub struct RunCreated {
    pub run_id: String,
    pub session_id: String,
    pub total: usize,
    pub identifiers: Vec<String>,
    pub notices: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: String,
}

/// Start a fetch run from a multipart form.
///
/// Accepts an optional `file` part (CSV or XLSX), an optional `text`
/// part with one DOI per line, and an optional `session` part naming
/// an existing session. An unreadable upload only produces a warning;
/// the request fails only when no usable identifier remains.
pub async fn create_run(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<RunCreated>, (StatusCode, String)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut text = String::new();
    let mut session_id: Option<Uuid> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                if !bytes.is_empty() {
                    file = Some((file_name, bytes.to_vec()));
                }
            }
            "text" => {
                text = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
            }
            "session" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                if !raw.trim().is_empty() {
                    let parsed = Uuid::parse_str(raw.trim())
                        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
                    session_id = Some(parsed);
                }
            }
            _ => {}
        }
    }

    let mut notices = Vec::new();
    let mut warnings = Vec::new();
    let mut file_ids: Vec<String> = Vec::new();

    if let Some((file_name, bytes)) = &file {
        match identifiers_from_upload(file_name, bytes) {
            Ok(ids) => {
                notices.push(format!("Found {} DOIs in the uploaded file.", ids.len()));
                file_ids = ids;
            }
            // A bad upload is a warning; pasted text may still carry DOIs
            Err(err) => warnings.push(err.to_string()),
        }
    }

    let manual_ids = identifiers_from_text(&text);
    let identifiers = IdentifierSet::from_sources(&file_ids, &manual_ids);

    if identifiers.is_empty() {
        warnings.push("Please provide at least one DOI.".to_string());
        return Err((StatusCode::BAD_REQUEST, warnings.join(" ")));
    }

    let session = match session_id {
        Some(id) => state
            .session(id)
            .await
            .ok_or((StatusCode::NOT_FOUND, format!("Session not found: {}", id)))?,
        None => state.create_session().await,
    };

    let run = Arc::new(Run::new(
        session.id,
        identifiers.into_vec(),
        warnings.clone(),
    ));
    session.runs.write().await.insert(run.id, run.clone());
    state.register_run(run.clone()).await;

    tokio::spawn(execute_run(
        state.source.clone(),
        session.clone(),
        run.clone(),
    ));

    Ok(Json(RunCreated {
        run_id: run.id.to_string(),
        session_id: session.id.to_string(),
        total: run.total(),
        identifiers: run.identifiers.clone(),
        notices,
        warnings,
        started_at: run.started_at.to_rfc3339(),
    }))
}

#[derive(Debug, Serialize)]
pub struct RunStatus {
    pub id: String,
    pub session_id: String,
    pub state: String,
    pub completed: usize,
    pub total: usize,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub columns: Option<Vec<String>>,
    pub preview: Option<Vec<Vec<String>>>,
    pub row_count: Option<usize>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunStatus>, (StatusCode, String)> {
    let run = resolve_run(&state, &id).await?;
    let outcome = run.outcome().await;

    let status = match outcome.as_ref() {
        Some(outcome) => RunStatus {
            id: run.id.to_string(),
            session_id: run.session_id.to_string(),
            state: "complete".to_string(),
            completed: run.completed(),
            total: run.total(),
            warnings: outcome.warnings.clone(),
            error: outcome.error.clone(),
            columns: Some(outcome.table.columns().to_vec()),
            preview: Some(outcome.table.preview(PREVIEW_ROWS).to_vec()),
            row_count: Some(outcome.table.row_count()),
            started_at: run.started_at.to_rfc3339(),
            finished_at: Some(outcome.finished_at.to_rfc3339()),
        },
        None => RunStatus {
            id: run.id.to_string(),
            session_id: run.session_id.to_string(),
            state: "running".to_string(),
            completed: run.completed(),
            total: run.total(),
            warnings: run.upload_warnings.clone(),
            error: None,
            columns: None,
            preview: None,
            row_count: None,
            started_at: run.started_at.to_rfc3339(),
            finished_at: None,
        },
    };

    Ok(Json(status))
}

// ===== Downloads =====

pub async fn download_csv(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let run = resolve_run(&state, &id).await?;
    let outcome = run.outcome().await;
    let outcome = outcome
        .as_ref()
        .ok_or((StatusCode::CONFLICT, "Run is still in progress".to_string()))?;

    let bytes = to_csv_bytes(&outcome.table)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(download_response("text/csv", "metadata.csv", bytes))
}

pub async fn download_xlsx(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, (StatusCode, String)> {
    let run = resolve_run(&state, &id).await?;
    let outcome = run.outcome().await;
    let outcome = outcome
        .as_ref()
        .ok_or((StatusCode::CONFLICT, "Run is still in progress".to_string()))?;

    let bytes = to_xlsx_bytes(&outcome.table)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(download_response(
        "application/vnd.ms-excel",
        "metadata.xlsx",
        bytes,
    ))
}

fn download_response(content_type: &'static str, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

// ===== Sessions =====

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let session_id =
        Uuid::parse_str(&id).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    state
        .remove_session(session_id)
        .await
        .ok_or((StatusCode::NOT_FOUND, format!("Session not found: {}", id)))?;

    Ok(Json(json!({
        "success": true,
        "session_id": id,
    })))
}

// ===== System =====

pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let sessions = state.sessions.read().await.len();
    let runs = state.runs.read().await.len();
    let source = CrossrefSource::metadata();

    Json(json!({
        "sessions": sessions,
        "runs": runs,
        "source": {
            "id": source.id,
            "name": source.name,
            "description": source.description,
            "base_url": source.base_url,
            "rate_limit_per_second": source.rate_limit_per_second,
            "requires_api_key": source.requires_api_key,
        },
    }))
}

// ===== Helpers =====

async fn resolve_run(state: &AppState, id: &str) -> Result<Arc<Run>, (StatusCode, String)> {
    let run_id = Uuid::parse_str(id).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    state
        .run(run_id)
        .await
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Run not found: {}", id)))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::FromRequest;
    use axum::http::Request;

    use crate::run::execute_run;

    use super::*;

    const BOUNDARY: &str = "imcite-form-boundary";

    /// State whose source points at the discard port, so any spawned
    /// fetch fails fast instead of reaching the network.
    fn unroutable_state() -> Arc<AppState> {
        Arc::new(AppState::with_source(
            CrossrefSource::new().with_base_url("http://127.0.0.1:9"),
        ))
    }

    /// Build the multipart payload a browser submit would carry.
    /// Each part is (field name, optional file name, contents).
    async fn form(parts: &[(&str, Option<&str>, &str)]) -> Multipart {
        let mut body = String::new();
        for (name, file_name, contents) in parts {
            body.push_str(&format!("--{}\r\n", BOUNDARY));
            match file_name {
                Some(file_name) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\r\n",
                    name, file_name
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                    name
                )),
            }
            body.push_str(contents);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{}--\r\n", BOUNDARY));

        let request = Request::builder()
            .method("POST")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    #[tokio::test]
    async fn create_run_without_identifiers_is_rejected() {
        let state = unroutable_state();
        let multipart = form(&[("text", None, "doi:\n   \n")]).await;

        let (status, body) = create_run(State(state.clone()), multipart)
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Please provide at least one DOI.");
        // A rejected request creates no session
        assert!(state.sessions.read().await.is_empty());
    }

    #[tokio::test]
    async fn create_run_joins_the_upload_error_into_the_rejection() {
        let state = unroutable_state();
        let multipart = form(&[
            ("file", Some("refs.csv"), "title,identifier\nSome Paper,10.1/x\n"),
            ("text", None, ""),
        ])
        .await;

        let (status, body) = create_run(State(state), multipart).await.unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            "No 'doi' column found in the uploaded file. Please provide at least one DOI."
        );
    }

    #[tokio::test]
    async fn create_run_with_unknown_session_is_not_found() {
        let state = unroutable_state();
        let multipart = form(&[
            ("text", None, "10.1/aaa"),
            ("session", None, "00000000-0000-0000-0000-000000000000"),
        ])
        .await;

        let (status, _) = create_run(State(state), multipart).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn create_run_reports_the_upload_notice_and_reuses_the_session() {
        let state = unroutable_state();
        let existing = state.create_session().await;
        let session_field = existing.id.to_string();

        let multipart = form(&[
            ("file", Some("refs.csv"), "doi\n10.1/aaa\n10.1/aaa\n"),
            ("text", None, "10.1/bbb"),
            ("session", None, &session_field),
        ])
        .await;

        let Json(created) = create_run(State(state.clone()), multipart).await.unwrap();
        assert_eq!(created.session_id, session_field);
        assert_eq!(created.total, 2);
        assert_eq!(created.identifiers, ["10.1/aaa", "10.1/bbb"]);
        assert_eq!(created.notices, ["Found 2 DOIs in the uploaded file."]);
        assert!(created.warnings.is_empty());
        assert_eq!(state.runs.read().await.len(), 1);
        assert_eq!(state.sessions.read().await.len(), 1);
    }

    #[tokio::test]
    async fn run_status_reports_running_then_complete() {
        let state = unroutable_state();
        let session = state.create_session().await;
        let run = Arc::new(Run::new(
            session.id,
            vec!["10.1/aaa".to_string()],
            vec!["Could not read the uploaded file: bad archive".to_string()],
        ));
        session.runs.write().await.insert(run.id, run.clone());
        state.register_run(run.clone()).await;

        let Json(status) = get_run(State(state.clone()), Path(run.id.to_string()))
            .await
            .unwrap();
        assert_eq!(status.state, "running");
        assert_eq!(status.completed, 0);
        assert_eq!(status.total, 1);
        assert_eq!(
            status.warnings,
            ["Could not read the uploaded file: bad archive"]
        );
        assert!(status.columns.is_none());
        assert!(status.preview.is_none());
        assert!(status.finished_at.is_none());

        execute_run(state.source.clone(), session.clone(), run.clone()).await;

        let Json(status) = get_run(State(state.clone()), Path(run.id.to_string()))
            .await
            .unwrap();
        assert_eq!(status.state, "complete");
        assert_eq!(status.completed, 1);
        assert_eq!(
            status.error.as_deref(),
            Some("No metadata retrieved. Please check the DOIs and try again.")
        );
        assert_eq!(status.row_count, Some(1));
        assert_eq!(status.warnings.len(), 2);
        assert!(status.finished_at.is_some());
    }

    #[tokio::test]
    async fn unknown_and_malformed_run_ids_map_to_404_and_400() {
        let state = unroutable_state();

        let (status, _) = get_run(State(state.clone()), Path(Uuid::new_v4().to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get_run(State(state), Path("not-a-uuid".to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn downloads_conflict_until_the_run_completes() {
        let state = unroutable_state();
        let session = state.create_session().await;
        let run = Arc::new(Run::new(
            session.id,
            vec!["10.1/aaa".to_string()],
            Vec::new(),
        ));
        session.runs.write().await.insert(run.id, run.clone());
        state.register_run(run.clone()).await;

        let (status, body) = download_csv(State(state.clone()), Path(run.id.to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body, "Run is still in progress");

        let (status, _) = download_xlsx(State(state.clone()), Path(run.id.to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);

        execute_run(state.source.clone(), session.clone(), run.clone()).await;

        let response = download_xlsx(State(state.clone()), Path(run.id.to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/vnd.ms-excel"
        );
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"metadata.xlsx\""
        );
    }

    #[tokio::test]
    async fn deleting_a_session_drops_its_runs() {
        let state = unroutable_state();
        let session = state.create_session().await;
        let run = Arc::new(Run::new(
            session.id,
            vec!["10.1/aaa".to_string()],
            Vec::new(),
        ));
        session.runs.write().await.insert(run.id, run.clone());
        state.register_run(run.clone()).await;

        let Json(ack) = delete_session(State(state.clone()), Path(session.id.to_string()))
            .await
            .unwrap();
        assert_eq!(ack["success"], true);

        let (status, _) = get_run(State(state.clone()), Path(run.id.to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = delete_session(State(state), Path(session.id.to_string()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_reports_counts_and_the_full_source_card() {
        let state = unroutable_state();
        state.create_session().await;

        let Json(status) = get_status(State(state)).await;
        assert_eq!(status["sessions"], 1);
        assert_eq!(status["runs"], 0);
        assert_eq!(status["source"]["id"], "crossref");
        assert_eq!(status["source"]["name"], "Crossref");
        assert_eq!(status["source"]["base_url"], "https://api.crossref.org");
        assert_eq!(status["source"]["rate_limit_per_second"], 50.0);
        assert_eq!(status["source"]["requires_api_key"], false);
        assert!(status["source"]["description"]
            .as_str()
            .unwrap()
            .contains("DOI"));
    }
}
