use crate::{
    auth::{self, Claims, SessionKeys},
    config::Config,
    db::{self, DbPool},
    documents,
    embed::ui_router,
    error::AppError,
    files, housekeeping, images, markdown,
    model::User,
    policy, users,
};
use anyhow::{Context, Result};
use axum::{
    async_trait,
    body::StreamBody,
    extract::{
        rejection::JsonRejection, DefaultBodyLimit, Extension, FromRequest, Multipart, Path,
        State,
    },
    http::{header, HeaderMap, Request},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use notelite_api::{
    DocumentPatch, DocumentView, LoginRequest, MessageResponse, NewDocument, TokenResponse,
    UploadResponse, UserInfo,
};
use rusqlite::Connection;
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use time::Duration;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// Extra body allowance on the upload route for multipart framing.
const MULTIPART_HEADROOM: u64 = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub upload_dir: PathBuf,
    pub config: Config,
    pub keys: Arc<SessionKeys>,
}

impl AppState {
    /// Migrate the database, create the bootstrap account if configured and
    /// load the token signing secret.
    pub async fn new(config: Config) -> Result<Self> {
        let upload_dir = config.upload_dir();
        tokio::fs::create_dir_all(&upload_dir)
            .await
            .with_context(|| format!("creating {}", upload_dir.display()))?;
        let db_path = config.db_path();
        let bootstrap = config.bootstrap.clone();
        let secret = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let conn = db::init_db(&db_path)
                .with_context(|| format!("opening {}", db_path.display()))?;
            if let Some(b) = bootstrap {
                let user = users::ensure_user(&conn, &b.email, b.name.as_deref(), &b.password)?;
                info!(email = %user.email, "bootstrap account ready");
            }
            auth::load_or_create_secret(&conn)
        })
        .await??;
        let pool = db::open_pool(config.db_path())?;
        Ok(Self {
            pool,
            upload_dir,
            config,
            keys: Arc::new(SessionKeys::new(&secret)),
        })
    }

    /// Run blocking database work on the blocking thread pool.
    pub async fn with_conn<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, AppError> {
            let conn = pool.get()?;
            f(&*conn)
        })
        .await
        .map_err(|e| AppError::Internal(e.into()))?
    }

    fn issue_token(&self, user: &User) -> Result<TokenResponse, AppError> {
        let ttl = Duration::hours(self.config.token_ttl_hours);
        let token = self.keys.issue(&user.id, ttl)?;
        Ok(TokenResponse {
            token,
            user: user.info(),
        })
    }
}

/// Build the HTTP application router.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = (state.config.max_upload_bytes() + MULTIPART_HEADROOM) as usize;
    let protected = Router::new()
        .route("/documents", get(list_documents).post(create_document))
        .route(
            "/documents/:id",
            get(get_document)
                .put(update_document)
                .delete(delete_document),
        )
        .route("/documents/:id/html", get(render_document))
        .route(
            "/images/upload",
            post(upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/auth/me", get(me))
        .route("/auth/refresh", post(refresh_token))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));
    let ui: Router<AppState> = ui_router().with_state(());
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(login))
        .route("/images/:filename", get(serve_image))
        .merge(protected)
        .merge(ui)
        .with_state(state)
}

/// JSON request body whose rejections answer in the `{"error": ..}` shape.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, B, T> FromRequest<S, B> for JsonBody<T>
where
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
    S: Send + Sync,
    B: Send + 'static,
{
    type Rejection = AppError;

    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                debug!(error = %rejection, "rejected request body");
                Err(AppError::InvalidInput("Invalid request body".into()))
            }
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn auth_middleware<B>(
    State(state): State<AppState>,
    mut req: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(auth::bearer_token)
        .ok_or(AppError::Unauthorized)?;
    let claims = state.keys.verify(token).map_err(|_| AppError::Unauthorized)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Resolve the acting user for this request from its token claims.
async fn current_user(state: &AppState, claims: &Claims) -> Result<User, AppError> {
    let id = claims.sub.clone();
    state
        .with_conn(move |conn| users::find_by_id(conn, &id)?.ok_or(AppError::UserNotFound))
        .await
}

async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = state
        .with_conn(move |conn| {
            users::authenticate(conn, &req.email, &req.password)?
                .ok_or(AppError::InvalidCredentials)
        })
        .await?;
    info!(user = %user.id, "login");
    Ok(Json(state.issue_token(&user)?))
}

async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserInfo>, AppError> {
    let user = current_user(&state, &claims).await?;
    Ok(Json(user.info()))
}

async fn refresh_token(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<TokenResponse>, AppError> {
    let user = current_user(&state, &claims).await?;
    Ok(Json(state.issue_token(&user)?))
}

async fn list_documents(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<DocumentView>>, AppError> {
    let actor = current_user(&state, &claims).await?;
    let docs = state
        .with_conn(move |conn| documents::list_documents(conn, &actor))
        .await?;
    Ok(Json(docs))
}

async fn create_document(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    JsonBody(req): JsonBody<NewDocument>,
) -> Result<Json<DocumentView>, AppError> {
    let actor = current_user(&state, &claims).await?;
    let doc = state
        .with_conn(move |conn| documents::create_document(conn, &actor, req))
        .await?;
    info!(document = %doc.id, owner = %doc.created_by_id, "document created");
    Ok(Json(doc))
}

async fn get_document(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>, AppError> {
    let actor = current_user(&state, &claims).await?;
    let doc = state
        .with_conn(move |conn| documents::get_document(conn, &id, &actor))
        .await?;
    Ok(Json(doc))
}

async fn render_document(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let actor = current_user(&state, &claims).await?;
    let doc = state
        .with_conn(move |conn| documents::get_document(conn, &id, &actor))
        .await?;
    Ok(Html(markdown::render(&doc.content)))
}

async fn update_document(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
    JsonBody(patch): JsonBody<DocumentPatch>,
) -> Result<Json<DocumentView>, AppError> {
    let actor = current_user(&state, &claims).await?;
    let doc = state
        .with_conn(move |conn| documents::update_document(conn, &id, &actor, patch))
        .await?;
    Ok(Json(doc))
}

async fn delete_document(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let actor = current_user(&state, &claims).await?;
    let actor_id = actor.id.clone();
    let doc_id = id.clone();
    state
        .with_conn(move |conn| documents::delete_document(conn, &doc_id, &actor))
        .await?;
    info!(document = %id, actor = %actor_id, "document deleted");
    Ok(Json(MessageResponse {
        message: "Document deleted successfully".into(),
    }))
}

struct UploadedFile {
    original_name: String,
    mime_type: String,
    data: Bytes,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    debug!(error = %e, "unreadable multipart body");
    AppError::InvalidInput("Invalid upload".into())
}

async fn upload_image(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let actor = current_user(&state, &claims).await?;
    let max_bytes = state.config.max_upload_bytes();
    let declared_len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared_len.is_some_and(|len| len > max_bytes + MULTIPART_HEADROOM) {
        return Err(AppError::TooLarge);
    }

    let mut file: Option<UploadedFile> = None;
    let mut document_id: Option<String> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let original_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "file".into());
                let mime_type = field.content_type().map(str::to_string).unwrap_or_default();
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some(UploadedFile {
                    original_name,
                    mime_type,
                    data,
                });
            }
            Some("documentId") => {
                let value = field.text().await.map_err(multipart_error)?;
                let value = value.trim();
                document_id = (!value.is_empty()).then(|| value.to_string());
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::InvalidInput("No file provided".into()))?;
    images::validate_upload(&file.mime_type, file.data.len() as u64, max_bytes)?;

    if let Some(doc_id) = document_id.clone() {
        let actor = actor.clone();
        state
            .with_conn(move |conn| {
                let doc =
                    documents::find_document(conn, &doc_id)?.ok_or(AppError::DocumentNotFound)?;
                policy::check_edit(&doc, &actor)
            })
            .await?;
    }

    // file first, then the metadata row
    let filename = files::storage_filename(&file.original_name, db::now_millis());
    let path = files::save_file(&state.upload_dir, &filename, &file.data).await?;
    let size = file.data.len() as i64;
    let original_name = file.original_name.clone();
    let inserted = {
        let filename = filename.clone();
        let actor = actor.clone();
        state
            .with_conn(move |conn| {
                let new = images::NewImage {
                    filename: &filename,
                    original_name: &file.original_name,
                    mime_type: &file.mime_type,
                    size,
                    document_id: document_id.as_deref(),
                };
                images::insert_image(conn, &actor, &new)
            })
            .await
    };
    let image = match inserted {
        Ok(image) => image,
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&path).await {
                warn!(error = %rm, file = %filename, "could not remove file of failed upload");
            }
            return Err(e);
        }
    };
    info!(
        image = %image.id,
        file = %image.filename,
        size = image.size,
        uploader = %actor.id,
        "image uploaded"
    );
    Ok(Json(UploadResponse {
        id: image.id.clone(),
        url: image.url(),
        filename: image.filename,
        original_name,
    }))
}

async fn serve_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    if !files::is_storage_filename(&filename) {
        debug!(%filename, "image request for a name that is never generated");
        return Err(AppError::ImageNotFound);
    }
    let lookup = filename.clone();
    let image = state
        .with_conn(move |conn| images::find_by_filename(conn, &lookup))
        .await?;
    let Some(image) = image else {
        debug!(%filename, "image request without metadata row");
        return Err(AppError::ImageNotFound);
    };
    let path = files::file_path(&state.upload_dir, &image.filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(%filename, "image metadata present but file missing on disk");
            return Err(AppError::ImageFileMissing);
        }
        Err(e) => return Err(e.into()),
    };
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_str(&image.mime_type)
            .unwrap_or_else(|_| header::HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        header::HeaderValue::from(image.size.max(0) as u64),
    );
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    let body = StreamBody::new(ReaderStream::new(file));
    Ok((headers, body).into_response())
}

/// Run the HTTP server until Ctrl+C.
pub async fn run_http_server(config: Config) -> Result<()> {
    let addr: SocketAddr = config.bind.parse().context("invalid bind address")?;
    let sweep_every = config.sweep_interval_secs;
    let state = AppState::new(config).await?;
    if sweep_every > 0 {
        housekeeping::spawn_housekeeping(
            state.clone(),
            std::time::Duration::from_secs(sweep_every),
        );
    }
    info!(%addr, "listening");
    axum::Server::bind(&addr)
        .serve(build_router(state).into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
