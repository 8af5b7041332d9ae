use axum::{
    extract::Path,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use mime_guess::{mime, Mime};
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "webui"]
struct Assets;

const INDEX_CACHE: &str = "no-cache";
const ASSET_CACHE: &str = "public, max-age=3600";

/// Routes for the embedded single page UI. Navigation happens in the URL
/// fragment, so the index and its assets are all the server has to know.
pub fn ui_router() -> Router {
    Router::new()
        .route("/", get(|| async { embedded("index.html", INDEX_CACHE) }))
        .route(
            "/assets/*path",
            get(|Path(path): Path<String>| async move {
                embedded(&format!("assets/{path}"), ASSET_CACHE)
            }),
        )
}

fn content_type(path: &str) -> Mime {
    let guessed = mime_guess::from_path(path).first_or_octet_stream();
    if guessed == mime::TEXT_HTML {
        mime::TEXT_HTML_UTF_8
    } else if guessed == mime::TEXT_JAVASCRIPT {
        mime::APPLICATION_JAVASCRIPT
    } else {
        guessed
    }
}

fn embedded(path: &str, cache: &'static str) -> Response {
    let Some(file) = Assets::get(path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let ty = HeaderValue::from_str(content_type(path).as_ref())
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    (
        [
            (header::CONTENT_TYPE, ty),
            (header::CACHE_CONTROL, HeaderValue::from_static(cache)),
        ],
        file.data.into_owned(),
    )
        .into_response()
}
