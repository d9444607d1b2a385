use axum::{
    Json, Router,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::bootstrap::app_context::AppContext;
use crate::domain::documents::document::{
    Document as DomainDocument, NewDocument, Payload, SubmittedPayload,
};
use crate::domain::documents::filter::ListFilter;
use crate::presentation::http::auth::{TokenQuery, acting_token, token_from_json_body};
use crate::presentation::http::envelope::{ApiError, DataEnvelope, ResponseEnvelope};

#[derive(Debug, Serialize, ToSchema)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mime: String,
    pub file: bool,
    pub public: bool,
    pub created: chrono::DateTime<chrono::Utc>,
    pub owner: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub grant: Vec<String>,
}

impl From<DomainDocument> for Document {
    fn from(d: DomainDocument) -> Self {
        Document {
            id: d.id,
            name: d.name,
            mime: d.mime,
            file: d.is_file,
            public: d.is_public,
            created: d.created_at,
            owner: d.owner,
            grant: d.grant,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DocumentListResponse {
    pub docs: Vec<Document>,
}

/// JSON carried in the multipart `meta` field.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DocumentMeta {
    pub name: String,
    #[serde(default)]
    pub file: bool,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub mime: String,
    #[serde(default)]
    pub grant: Vec<String>,
}

#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadDocumentMultipart {
    /// DocumentMeta as JSON
    meta: String,
    /// JSON payload (when `file` is false)
    json: Option<String>,
    /// Binary payload (when `file` is true)
    #[schema(value_type = Option<String>, format = Binary)]
    file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListDocumentsQuery {
    pub token: Option<String>,
    pub login: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub limit: Option<String>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/docs", get(list_documents).post(upload_document))
        .route("/docs/:id", get(get_document).delete(delete_document))
        .with_state(ctx)
}

#[utoipa::path(post, path = "/api/docs", tag = "Documents",
    request_body(content = UploadDocumentMultipart, content_type = "multipart/form-data"),
    responses((status = 200, body = Document)))]
pub async fn upload_document(
    State(ctx): State<AppContext>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<DataEnvelope<Document>>, ApiError> {
    let mut meta: Option<DocumentMeta> = None;
    let mut submitted = SubmittedPayload::default();
    let mut file_content_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("malformed multipart body"))?
    {
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("meta") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("unreadable meta field"))?;
                let parsed: DocumentMeta = serde_json::from_str(&text)
                    .map_err(|e| ApiError::bad_request(format!("invalid meta: {e}")))?;
                meta = Some(parsed);
            }
            Some("json") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("unreadable json field"))?;
                submitted.json = Some(text);
            }
            Some("file") => {
                file_content_type = field.content_type().map(|s| s.to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request("unreadable file field"))?;
                if data.len() > ctx.cfg.upload_max_bytes {
                    return Err(ApiError::new(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        "file is too large",
                    ));
                }
                submitted.file = Some(data.to_vec());
            }
            _ => {}
        }
    }

    let meta = meta.ok_or_else(|| ApiError::bad_request("meta field is required"))?;
    let token = acting_token(q.token, meta.token.clone(), &headers)?;
    let mime = if meta.mime.trim().is_empty() && meta.file {
        file_content_type.unwrap_or_default()
    } else {
        meta.mime
    };
    let new_doc = NewDocument {
        name: meta.name,
        mime,
        is_file: meta.file,
        is_public: meta.public,
        grant: meta.grant,
    };

    let doc = ctx
        .documents()
        .create(&token, new_doc, submitted)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "upload_document_failed"))?;
    Ok(Json(DataEnvelope { data: doc.into() }))
}

#[utoipa::path(get, path = "/api/docs", tag = "Documents",
    params(
        ("token" = Option<String>, Query, description = "Session token"),
        ("login" = Option<String>, Query, description = "Only documents owned by this login"),
        ("key" = Option<String>, Query, description = "Attribute to filter on (id, name, mime, is_file, is_public)"),
        ("value" = Option<String>, Query, description = "Attribute value"),
        ("limit" = Option<i64>, Query, description = "Maximum number of documents")
    ),
    responses((status = 200, body = DocumentListResponse)))]
pub async fn list_documents(
    State(ctx): State<AppContext>,
    Query(q): Query<ListDocumentsQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DataEnvelope<DocumentListResponse>>, ApiError> {
    let token = acting_token(q.token, token_from_json_body(&body), &headers)?;
    let limit = q.limit.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
    let filter = ListFilter::from_raw(
        q.login.as_deref(),
        q.key.as_deref(),
        q.value.as_deref(),
        limit,
    )
    .map_err(ApiError::bad_request)?;

    let docs = ctx
        .documents()
        .list(&token, &filter)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "list_documents_failed"))?;
    let docs = docs.into_iter().map(Document::from).collect();
    Ok(Json(DataEnvelope {
        data: DocumentListResponse { docs },
    }))
}

#[utoipa::path(get, path = "/api/docs/{id}", tag = "Documents",
    params(
        ("id" = Uuid, Path, description = "Document ID"),
        ("token" = Option<String>, Query, description = "Session token")
    ),
    responses(
        (status = 200, description = "Raw bytes for files, {\"data\": <json text>} otherwise"),
        (status = 404, description = "Document not found")
    ))]
pub async fn get_document(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let token = acting_token(q.token, token_from_json_body(&body), &headers)?;
    let id = Uuid::parse_str(id.trim())
        .map_err(|_| ApiError::new(StatusCode::NOT_FOUND, "document not found"))?;

    let (doc, payload) = ctx
        .documents()
        .get_by_id(&token, id)
        .await
        .inspect_err(|e| tracing::warn!(document_id = %id, error = %e, "get_document_failed"))?;

    match payload {
        Payload::File(bytes) => {
            let content_type = HeaderValue::from_str(&doc.mime)
                .ok()
                .filter(|_| !doc.mime.is_empty())
                .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
            let mut headers = HeaderMap::new();
            headers.insert(axum::http::header::CONTENT_TYPE, content_type);
            headers.insert(
                axum::http::header::HeaderName::from_static("x-content-type-options"),
                HeaderValue::from_static("nosniff"),
            );
            Ok((headers, bytes).into_response())
        }
        Payload::Json(text) => Ok(Json(DataEnvelope { data: text }).into_response()),
    }
}

#[utoipa::path(delete, path = "/api/docs/{id}", tag = "Documents",
    params(
        ("id" = Uuid, Path, description = "Document ID"),
        ("token" = Option<String>, Query, description = "Session token")
    ),
    responses((status = 200), (status = 404, description = "Document not found")))]
pub async fn delete_document(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(q): Query<TokenQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ResponseEnvelope<serde_json::Value>>, ApiError> {
    let token = acting_token(q.token, token_from_json_body(&body), &headers)?;
    let doc_id = Uuid::parse_str(id.trim())
        .map_err(|_| ApiError::new(StatusCode::NOT_FOUND, "document not found"))?;

    ctx.documents()
        .delete(&token, doc_id)
        .await
        .inspect_err(|e| tracing::warn!(document_id = %doc_id, error = %e, "delete_document_failed"))?;

    let mut body = serde_json::Map::new();
    body.insert(doc_id.to_string(), serde_json::Value::Bool(true));
    Ok(Json(ResponseEnvelope {
        response: serde_json::Value::Object(body),
    }))
}
