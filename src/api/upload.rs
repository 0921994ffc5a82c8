//! Form parsing for `POST /remove-background`
//!
//! Accepts `multipart/form-data` (file field `image`) and
//! `application/x-www-form-urlencoded` (base64 field `image_data`). Both
//! carry the optional `model`, `format` and `return_base64` fields.

use crate::api::error::ApiError;
use crate::config::OutputFormat;
use crate::error::BgRemovalError;
use crate::models::ModelName;
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, FromRequest, Multipart, Request},
    http::{header, StatusCode},
    Form,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;

/// An uploaded file part
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

/// Raw form fields of a removal request
#[derive(Debug, Clone, Default)]
pub struct RemovalForm {
    pub image: Option<UploadedFile>,
    pub image_data: Option<String>,
    pub model: Option<String>,
    pub format: Option<String>,
    pub return_base64: Option<String>,
}

/// A fully resolved removal request
#[derive(Debug, Clone)]
pub struct RemovalRequest {
    /// Raw image bytes, not yet validated
    pub payload: Bytes,
    pub model: ModelName,
    pub format: OutputFormat,
    /// Lowercased `format` token as sent by the client, echoed in responses
    pub format_token: String,
    pub want_base64: bool,
}

impl RemovalForm {
    /// Resolve the fields into a request
    ///
    /// Presence of an image is checked first, then the model, then the
    /// output format, then the image payload itself.
    ///
    /// # Errors
    /// - `InputMissing` when neither `image` nor `image_data` is present
    /// - `InvalidModel` / `InvalidFormat` for unknown values
    /// - [`ApiError::NoFileSelected`] for an `image` part with an empty file name
    /// - `InvalidBase64` when `image_data` does not decode
    pub fn resolve(self) -> Result<RemovalRequest, ApiError> {
        if self.image.is_none() && self.image_data.is_none() {
            return Err(BgRemovalError::input_missing("expected 'image' or 'image_data'").into());
        }

        let model = match self.model.as_deref() {
            Some(name) => name.parse::<ModelName>()?,
            None => ModelName::DEFAULT,
        };

        let format_token = self
            .format
            .as_deref()
            .unwrap_or(OutputFormat::Png.extension())
            .to_lowercase();
        let format = format_token.parse::<OutputFormat>()?;

        let payload = if let Some(file) = self.image {
            if file.file_name.as_deref() == Some("") {
                return Err(ApiError::NoFileSelected);
            }
            file.bytes
        } else {
            Bytes::from(decode_image_data(self.image_data.as_deref().unwrap_or_default())?)
        };

        let want_base64 = self
            .return_base64
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        Ok(RemovalRequest {
            payload,
            model,
            format,
            format_token,
            want_base64,
        })
    }

    fn set_text_field(&mut self, name: &str, value: String) {
        match name {
            "image_data" => self.image_data = Some(value),
            "model" => self.model = Some(value),
            "format" => self.format = Some(value),
            "return_base64" => self.return_base64 = Some(value),
            _ => {},
        }
    }
}

/// Decode a base64 image, stripping a leading `data:image...,` header
///
/// # Errors
/// - `InvalidBase64` for malformed input
pub fn decode_image_data(data: &str) -> crate::error::Result<Vec<u8>> {
    let data = data.trim();
    let encoded = if data.starts_with("data:image") {
        data.split_once(',')
            .map(|(_, payload)| payload)
            .ok_or_else(|| BgRemovalError::invalid_base64("Data URL has no ',' separator"))?
    } else {
        data
    };

    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| BgRemovalError::invalid_base64(e.to_string()))
}

/// Declared body length, `None` for chunked or malformed headers
fn content_length(req: &Request) -> Option<usize> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
}

fn multipart_error(err: &MultipartError, content_length: Option<usize>, max: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        BgRemovalError::body_too_large(content_length, max).into()
    } else {
        ApiError::MalformedRequest(err.body_text())
    }
}

impl<S> FromRequest<S> for RemovalForm
where
    S: Send + Sync + AsRef<crate::config::ValidationLimits>,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let max = state.as_ref().max_file_size;
        let declared_len = content_length(&req);
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let mut form = Self::default();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::MalformedRequest(e.body_text()))?;

            while let Some(field) = multipart
                .next_field()
                .await
                .map_err(|e| multipart_error(&e, declared_len, max))?
            {
                let name = field.name().unwrap_or_default().to_string();
                if name == "image" {
                    let file_name = field.file_name().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| multipart_error(&e, declared_len, max))?;
                    form.image = Some(UploadedFile { file_name, bytes });
                } else {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| multipart_error(&e, declared_len, max))?;
                    form.set_text_field(&name, value);
                }
            }
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| {
                    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        ApiError::from(BgRemovalError::body_too_large(declared_len, max))
                    } else {
                        ApiError::MalformedRequest(e.body_text())
                    }
                })?;
            for (name, value) in fields {
                form.set_text_field(&name, value);
            }
        }

        Ok(form)
    }
}
