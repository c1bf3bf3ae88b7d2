use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

impl Disposition {
    fn as_str(self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

/// Binary response with content type, length and a download filename.
pub fn file_response(
    bytes: Vec<u8>,
    content_type: &str,
    disposition: Disposition,
    filename: &str,
) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    response.headers_mut().insert(CONTENT_TYPE, content_type);

    if let Ok(content_length) = HeaderValue::from_str(&length.to_string()) {
        response.headers_mut().insert(CONTENT_LENGTH, content_length);
    }

    if let Ok(value) = HeaderValue::from_str(&format!(
        "{}; filename=\"{}\"",
        disposition.as_str(),
        escape_filename(filename)
    )) {
        response.headers_mut().insert(CONTENT_DISPOSITION, value);
    }

    response
}

pub fn sanitize_filename(raw: &str) -> String {
    let leaf = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    let sanitized = leaf
        .chars()
        .map(|character| if character.is_control() { '_' } else { character })
        .collect::<String>();

    if sanitized.trim().is_empty() {
        "upload.bin".to_string()
    } else {
        sanitized
    }
}

pub fn guess_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn escape_filename(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
