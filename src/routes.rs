use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::catalog::Catalog;
use crate::chatbot::{ChatEngine, ChatReply};
use crate::error::{CatalogError, Result};
use crate::intent::ChatContext;
use crate::models::{CreateProductRequest, NewProduct, Product, ProductDetail};

const UPLOAD_LIMIT: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub chat: Arc<ChatEngine>,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let chat = Arc::new(ChatEngine::new(catalog.clone()));
        Self { catalog, chat }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/products", get(list_products).post(create_product))
        .route("/api/random-product", post(create_random_product))
        .route("/api/products/:id", get(get_product))
        .route("/api/products/:id/image", get(get_image).post(upload_image))
        .route("/api/chatbot", post(chat))
        .route("/api/chatbot/image", post(chat_image))
        .layer(DefaultBodyLimit::max(UPLOAD_LIMIT))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
                .layer(SetResponseHeaderLayer::overriding(
                    header::CACHE_CONTROL,
                    HeaderValue::from_static("no-cache, no-store, must-revalidate"),
                ))
                .layer(SetResponseHeaderLayer::overriding(header::PRAGMA, HeaderValue::from_static("no-cache")))
                .layer(SetResponseHeaderLayer::overriding(header::EXPIRES, HeaderValue::from_static("0"))),
        )
        .with_state(state)
}

fn created(product: Product) -> Response {
    let location = format!("/api/products/{}", product.id);
    (StatusCode::CREATED, [(header::LOCATION, location)], Json(product)).into_response()
}

fn body<T>(payload: std::result::Result<Json<T>, JsonRejection>) -> Result<T> {
    payload.map(|Json(t)| t).map_err(|e| CatalogError::Validation(e.body_text()))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": env!("CARGO_PKG_NAME") }))
}

pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.catalog.list_products().await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<Response> {
    let new = NewProduct::try_from(body(payload)?)?;
    tracing::info!("🚀 Creating product {} ({})", new.name, new.upc);
    Ok(created(state.catalog.create_product(new).await?))
}

pub async fn create_random_product(State(state): State<AppState>) -> Result<Response> {
    Ok(created(state.catalog.create_random_product().await?))
}

pub async fn get_product(Path(id): Path<i64>, State(state): State<AppState>) -> Result<Json<ProductDetail>> {
    Ok(Json(state.catalog.get_product(id).await?))
}

pub async fn get_image(Path(id): Path<i64>, State(state): State<AppState>) -> Result<Response> {
    let image = state.catalog.get_image(id).await?;
    Ok(([(header::CONTENT_TYPE, image.content_type)], image.bytes).into_response())
}

pub async fn upload_image(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Product>> {
    let mut file: Option<(Bytes, Option<String>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| CatalogError::Validation(e.body_text()))? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| CatalogError::Validation(e.body_text()))?;
        file = Some((bytes, content_type));
        break;
    }
    let (bytes, content_type) = file.ok_or_else(|| CatalogError::Validation("No file uploaded".into()))?;
    Ok(Json(state.catalog.upload_image(id, bytes, content_type).await?))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: Option<ChatContext>,
}

pub async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>> {
    let req = body(payload)?;
    if req.message.trim().is_empty() {
        return Err(CatalogError::Validation("Message is required".into()));
    }
    Ok(Json(state.chat.respond(&req.message, req.context.unwrap_or_default()).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatImageRequest {
    pub image: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub context: Option<ChatContext>,
}

/// Accepts raw base64 as well as a `data:<type>;base64,` URL.
fn decode_attachment(image: &str) -> Result<(Bytes, Option<String>)> {
    let (declared, encoded) = match image.strip_prefix("data:").and_then(|rest| rest.split_once(";base64,")) {
        Some((content_type, encoded)) => (Some(content_type.to_string()), encoded),
        None => (None, image),
    };
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| CatalogError::Validation(format!("image is not valid base64: {e}")))?;
    Ok((Bytes::from(bytes), declared))
}

pub async fn chat_image(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatImageRequest>, JsonRejection>,
) -> Result<Json<ChatReply>> {
    let req = body(payload)?;
    let (bytes, declared) = decode_attachment(&req.image)?;
    let content_type = req.content_type.or(declared);
    tracing::info!("🖼️ Chat attachment received ({} bytes)", bytes.len());
    Ok(Json(state.chat.attach_image(req.context.unwrap_or_default(), bytes, content_type).await))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachments_decode_plain_and_data_urls() {
        let (bytes, declared) = decode_attachment("R0lGODlh").unwrap();
        assert_eq!(&bytes[..], b"GIF89a");
        assert_eq!(declared, None);

        let (bytes, declared) = decode_attachment("data:image/gif;base64,R0lGODlh").unwrap();
        assert_eq!(&bytes[..], b"GIF89a");
        assert_eq!(declared.as_deref(), Some("image/gif"));

        assert!(matches!(decode_attachment("not base64!"), Err(CatalogError::Validation(_))));
    }
}
