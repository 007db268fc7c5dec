use super::extract::{GuestSession, MaybeIdentity};
use crate::{
    ctx::Ctx,
    error::ApiError,
    workflow::{validate_content_type, UploadRequest, ValidationError, MAX_UPLOAD_BYTES},
};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    response::{IntoResponse, Response},
    Json,
};
use bytes::{Bytes, BytesMut};
use serde::Serialize;

pub const SAVED_MESSAGE: &str = "Caption generated successfully";
pub const GUEST_MESSAGE: &str = "Caption generated (guest - not saved)";

const FILE_FIELD: &str = "file";

#[derive(Serialize, Debug)]
pub struct CaptionResponse {
    pub message: &'static str,
    pub image_url: String,
    pub caption: String,
    pub caption_id: Option<i64>,
}

fn bad_multipart(e: MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Invalid multipart body: {}", e.body_text()))
}

/// Pull the `file` field out of the form, checking its type before reading it
/// and its size while reading it.
async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        validate_content_type(&content_type)?;

        let mut data = BytesMut::new();
        while let Some(chunk) = field.chunk().await.map_err(bad_multipart)? {
            if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
                return Err(ValidationError::TooLarge.into());
            }
            data.extend_from_slice(&chunk);
        }

        return Ok((content_type, data.freeze()));
    }

    Err(ApiError::BadRequest("No file uploaded".to_string()))
}

pub async fn upload_caption(
    State(ctx): State<Ctx>,
    MaybeIdentity(identity): MaybeIdentity,
    session: GuestSession,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let (content_type, data) = read_file_field(&mut multipart).await?;

    let receipt = ctx
        .coordinator()
        .upload(UploadRequest {
            data,
            content_type,
            identity,
            session_id: session.id.clone(),
        })
        .await?;

    let message = if receipt.is_saved() {
        SAVED_MESSAGE
    } else {
        GUEST_MESSAGE
    };

    let body = Json(CaptionResponse {
        message,
        caption: receipt.caption().to_string(),
        image_url: receipt.image_url,
        caption_id: receipt.caption_id,
    });

    Ok(session.attach(ctx.session_key(), body.into_response()))
}
