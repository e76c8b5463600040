use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;

use abi::errors::Error;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// multipart upload: a `file` part plus an optional `dir` part naming the
/// target directory
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, Error> {
    let mut dir = String::new();
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::bad_request(e.to_string()))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("dir") => {
                dir = field
                    .text()
                    .await
                    .map_err(|e| Error::bad_request(e.to_string()))?;
            }
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::bad_request(e.to_string()))?;
                file = Some((filename, content_type, data.into()));
            }
            _ => {}
        }
    }

    let (filename, content_type, data) = file.ok_or_else(|| Error::bad_request("no file field"))?;
    if data.is_empty() {
        return Err(Error::bad_request("empty file"));
    }

    let url = state.upload.upload(&dir, &filename, &content_type, data).await?;
    Ok(Json(UploadResponse { url }))
}
