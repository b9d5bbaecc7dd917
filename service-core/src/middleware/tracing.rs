use axum::http::HeaderValue;
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use crate::observability::extract_request_id;

pub use crate::observability::REQUEST_ID_HEADER;

/// Ensures every request carries an `x-request-id` and echoes it on the response.
///
/// An inbound id is reused as-is so a browser-generated id survives the relay hop.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = extract_request_id(req.headers())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}
