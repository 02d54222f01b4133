//! Attachment upload
//!
//! Stores a multipart `file` field under the upload directory and returns
//! the metadata a message will carry. The messaging core treats this as an
//! opaque collaborator: it only ever stores the returned url/name/size.

use axum::extract::{Multipart, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::auth::tokens;
use crate::error::{GatewayError, GatewayResult};
use crate::keys::UserKey;
use crate::protocol::now_ms;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_url: String,
    pub file_name: String,
    pub file_size: u64,
}

/// Extract and verify the bearer token from headers.
fn bearer_user(headers: &HeaderMap) -> GatewayResult<UserKey> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| GatewayError::auth("Missing authorization header"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| GatewayError::auth("Invalid authorization header"))?;
    tokens::verify_access_token(token)
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect();
    if cleaned.trim_matches(&['.', '_'][..]).is_empty() {
        "upload.bin".to_string()
    } else {
        cleaned
    }
}

pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> GatewayResult<Json<UploadResponse>> {
    let user = bearer_user(&headers)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GatewayError::validation(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload.bin").to_string();
        let data: bytes::Bytes = field
            .bytes()
            .await
            .map_err(|e| GatewayError::validation(format!("failed reading upload: {e}")))?;
        if data.is_empty() {
            return Err(GatewayError::validation("Uploaded file is empty"));
        }

        let stored_name = format!("{}_{}", now_ms(), sanitize_file_name(&original_name));
        let path = state.upload_dir.join(&stored_name);
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| GatewayError::internal(format!("failed to store upload: {e}")))?;

        tracing::info!(%user, file = %stored_name, size = data.len(), "file uploaded");
        return Ok(Json(UploadResponse {
            file_url: format!("/uploads/{stored_name}"),
            file_name: original_name,
            file_size: data.len() as u64,
        }));
    }

    Err(GatewayError::validation("A 'file' field is required"))
}
