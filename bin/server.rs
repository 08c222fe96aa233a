// Company Directory - Web Server
// REST API with Axum: bulk imports, template download, company CRUD

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use company_directory::entities::company::{
    self, CompanyFilter, EditOutcome, COMPANY_HEADERS,
};
use company_directory::tabular::write_template;
use company_directory::{
    logging, open_database, CompanyDataset, Config, Dataset, ImportError, ImportMode,
    ImportReport, Importer, PclDataset, RawRow, RawValue, UploadedFile,
};

const TEMPLATE_FILE_NAME: &str = "template direktori perusahaan.csv";

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<Config>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    fn rejected(data: T) -> Self {
        Self {
            success: false,
            data,
            error: None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

enum ApiError {
    BadRequest(String),
    NotFound,
    Import(ImportError),
    Internal(String),
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        ApiError::Import(err)
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Import(ImportError::Store(err))
    }
}

fn import_error_status(err: &ImportError) -> StatusCode {
    match err {
        ImportError::UnsupportedFileType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ImportError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        ImportError::EmptyFile | ImportError::Unreadable(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            ApiError::Import(err) if err.is_precondition() => {
                (import_error_status(&err), err.to_string())
            }
            ApiError::Import(err) => {
                error!(error = %err, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            ApiError::Internal(detail) => {
                error!(error = %detail, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = ApiResponse {
            success: false,
            data: Value::Null,
            error: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

fn lock_db(state: &AppState) -> Result<MutexGuard<'_, Connection>, ApiError> {
    state
        .db
        .lock()
        .map_err(|_| ApiError::Internal("database mutex poisoned".to_string()))
}

fn report_response(report: ImportReport) -> Response {
    if report.is_success() {
        (StatusCode::OK, Json(ApiResponse::ok(report))).into_response()
    } else if matches!(report, ImportReport::NoData) {
        (StatusCode::BAD_REQUEST, Json(ApiResponse::rejected(report))).into_response()
    } else {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(ApiResponse::rejected(report))).into_response()
    }
}

fn edit_response(outcome: EditOutcome, created: bool) -> Response {
    match outcome {
        EditOutcome::Saved { .. } if created => {
            (StatusCode::CREATED, Json(ApiResponse::ok(outcome))).into_response()
        }
        EditOutcome::Saved { .. } => (StatusCode::OK, Json(ApiResponse::ok(outcome))).into_response(),
        EditOutcome::NotFound => ApiError::NotFound.into_response(),
        EditOutcome::Conflict { .. } => {
            (StatusCode::CONFLICT, Json(ApiResponse::rejected(outcome))).into_response()
        }
        EditOutcome::Rejected { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(ApiResponse::rejected(outcome))).into_response()
        }
    }
}

// ============================================================================
// Request decoding
// ============================================================================

/// Multipart body: a `file` part plus an optional `mode` part.
async fn read_upload(mut multipart: Multipart) -> Result<(UploadedFile, ImportMode), ApiError> {
    let mut file = None;
    let mut mode = ImportMode::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                file = Some(UploadedFile::new(file_name, content_type, bytes.to_vec()));
            }
            Some("mode") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                mode = text.parse().map_err(ApiError::BadRequest)?;
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::BadRequest("No file uploaded".to_string()))?;
    Ok((file, mode))
}

/// JSON object keyed by template headers → the same raw row a spreadsheet gives.
fn json_to_row(body: serde_json::Map<String, Value>) -> RawRow {
    body.into_iter()
        .map(|(header, value)| {
            let raw = match value {
                Value::Null => RawValue::Empty,
                Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Empty),
                Value::String(s) => RawValue::from_text(&s),
                Value::Bool(b) => RawValue::Text(b.to_string()),
                // years may come as [2023, 2024]
                Value::Array(items) => RawValue::from_text(
                    &items
                        .iter()
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                ),
                Value::Object(_) => RawValue::Empty,
            };
            (header, raw)
        })
        .collect()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

async fn run_import<D: Dataset>(
    state: &AppState,
    dataset: &D,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    // Body is fully read before the store is locked
    let (file, mode) = read_upload(multipart).await?;
    info!(dataset = dataset.name(), %mode, file = %file.file_name, bytes = file.bytes.len(), "upload received");

    let importer = Importer::from_config(&state.config).with_actor("api");
    let mut conn = lock_db(state)?;
    let report = importer.import_upload(&mut conn, dataset, &file, mode)?;

    Ok(report_response(report))
}

/// POST /api/import/companies - Bulk company import
async fn import_companies(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    run_import(&state, &CompanyDataset, multipart).await
}

/// POST /api/import/pcl - Bulk field officer import
async fn import_pcl(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    run_import(&state, &PclDataset, multipart).await
}

/// GET /api/import/companies/template - Empty CSV with every required header
async fn download_template() -> Result<Response, ApiError> {
    let bytes = write_template(&COMPANY_HEADERS)?;
    let disposition = format!(
        "attachment; filename*=UTF-8''{}",
        urlencoding::encode(TEMPLATE_FILE_NAME)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/companies?district_id=&year=
async fn list_companies(
    State(state): State<AppState>,
    Query(filter): Query<CompanyFilter>,
) -> Result<Response, ApiError> {
    let conn = lock_db(&state)?;
    let companies = company::list_companies(&conn, &filter)?;
    Ok(Json(ApiResponse::ok(companies)).into_response())
}

/// GET /api/companies/map - Markers for the map view
async fn company_markers(State(state): State<AppState>) -> Result<Response, ApiError> {
    let conn = lock_db(&state)?;
    let markers = company::map_markers(&conn)?;
    Ok(Json(ApiResponse::ok(markers)).into_response())
}

/// GET /api/companies/:id
async fn get_company(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let conn = lock_db(&state)?;
    match company::get_company(&conn, id)? {
        Some(found) => Ok(Json(ApiResponse::ok(found)).into_response()),
        None => Err(ApiError::NotFound),
    }
}

/// POST /api/companies
async fn create_company(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Map<String, Value>>,
) -> Result<Response, ApiError> {
    let row = json_to_row(body);
    let mut conn = lock_db(&state)?;
    let outcome = company::create_company(&mut conn, &row, "api")?;
    Ok(edit_response(outcome, true))
}

/// PUT /api/companies/:id
async fn update_company(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<serde_json::Map<String, Value>>,
) -> Result<Response, ApiError> {
    let row = json_to_row(body);
    let mut conn = lock_db(&state)?;
    let outcome = company::update_company(&mut conn, id, &row, "api")?;
    Ok(edit_response(outcome, false))
}

/// DELETE /api/companies/:id
async fn delete_company(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    let mut conn = lock_db(&state)?;
    if company::delete_company(&mut conn, id, "api")? {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Err(ApiError::NotFound)
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[derive(Parser)]
#[clap(author, version, about = "Company directory API server")]
struct Args {
    /// TOML config file
    #[clap(short, long)]
    config: Option<PathBuf>,
}

fn router(state: AppState) -> Router {
    // Multipart framing adds a little on top of the file itself
    let body_limit = state.config.max_upload_bytes + 64 * 1024;

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/import/companies", post(import_companies))
        .route("/import/pcl", post(import_pcl))
        .route("/import/companies/template", get(download_template))
        .route("/companies", get(list_companies).post(create_company))
        .route("/companies/map", get(company_markers))
        .route(
            "/companies/:id",
            get(get_company).put(update_company).delete(delete_company),
        )
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(DefaultBodyLimit::max(body_limit)),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;
    logging::init(&config.log_level);

    println!("🌐 Company Directory - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = open_database(&config.database_path)?;
    println!("✓ Database opened: {:?}", config.database_path);

    let addr = config.bind_address.clone();
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/companies", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state))
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let conn = Connection::open_in_memory().unwrap();
        company_directory::setup_database(&conn).unwrap();
        AppState {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(Config::default()),
        }
    }

    #[tokio::test]
    async fn test_health_through_router() {
        let response = router(test_state())
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_template_download_is_csv() {
        let response = router(test_state())
            .oneshot(
                Request::builder()
                    .uri("/api/import/companies/template")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/csv; charset=utf-8"
        );
    }

    #[test]
    fn test_json_row_keeps_numbers_and_joins_year_lists() {
        let body = json!({
            "KIP": "1000000001",
            "Badan Usaha": 2,
            "Catatan": null,
            "Tahun Direktori": [2023, 2024]
        });

        let row = match body {
            Value::Object(map) => json_to_row(map),
            _ => unreachable!(),
        };

        assert_eq!(row.get("KIP"), Some(&RawValue::Text("1000000001".to_string())));
        assert_eq!(row.get("Badan Usaha"), Some(&RawValue::Number(2.0)));
        assert_eq!(row.get("Catatan"), Some(&RawValue::Empty));
        assert_eq!(row.get("Tahun Direktori"), Some(&RawValue::Text("2023,2024".to_string())));
    }

    #[test]
    fn test_precondition_status_codes() {
        assert_eq!(
            import_error_status(&ImportError::FileTooLarge { size: 2, limit: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            import_error_status(&ImportError::UnsupportedFileType { content_type: "image/png".into() }),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(import_error_status(&ImportError::EmptyFile), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_business_reports_are_unprocessable() {
        let report = ImportReport::NothingToImport { total_rows: 3 };
        assert_eq!(report_response(report).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(report_response(ImportReport::NoData).status(), StatusCode::BAD_REQUEST);
    }
}
