use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Pagination metadata appended to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub total_items: i64,
}

impl PageMeta {
    pub fn new(page: i64, page_size: i64, total_items: i64) -> Self {
        let total_pages = if page_size > 0 {
            (total_items + page_size - 1) / page_size
        } else {
            0
        };
        Self {
            page,
            page_size,
            total_pages,
            total_items,
        }
    }
}

/// Uniform `{status, message, data}` body returned by every user endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    #[serde(skip)]
    code: StatusCode,
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
    #[serde(flatten)]
    pub pagination: Option<PageMeta>,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(code: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code,
            status: code.as_u16(),
            message: message.into(),
            data,
            pagination: None,
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::OK, message, Some(data))
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::CREATED, message, Some(data))
    }

    pub fn with_page(mut self, meta: PageMeta) -> Self {
        self.pagination = Some(meta);
        self
    }
}

impl Envelope<()> {
    pub fn empty(code: StatusCode, message: impl Into<String>) -> Self {
        Self::new(code, message, None)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}
