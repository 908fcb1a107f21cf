//! The uniform response envelope.
//!
//! Every mutating operation answers HTTP 200 with
//! `{"status": "ok", "result": …}` or `{"status": "error", "errors": …}`;
//! failures are signalled through the envelope, never the status code.

use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;

pub fn ok(result: impl Serialize) -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "ok", "result": result}))
}

/// Per-field validation errors, surfaced verbatim.
pub fn field_errors(errors: &BTreeMap<String, String>) -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "error", "errors": errors}))
}

/// Catch-all for operations that cannot proceed at all.
pub fn general_error(message: &str) -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "error", "errors": {"general": message}}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;
    use serde_json::Value;

    #[actix_rt::test]
    async fn errors_still_answer_http_200() {
        let response = general_error("Not found");
        assert_eq!(response.status(), actix_web::http::StatusCode::OK);
        let body = to_bytes(response.into_body()).await.unwrap();
        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "error");
        assert_eq!(parsed["errors"]["general"], "Not found");
    }
}
