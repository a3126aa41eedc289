//! Success envelope: `{ "code", "info", "data" }`

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Successful response wrapped with its status code and a short message
#[derive(Debug)]
pub struct Envelope<T> {
    status: StatusCode,
    info: &'static str,
    data: Option<T>,
}

#[derive(Serialize)]
struct Body<'a, T> {
    code: u16,
    info: &'a str,
    data: &'a Option<T>,
}

impl<T> Envelope<T> {
    /// 200 with a payload
    pub fn ok(info: &'static str, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            info,
            data: Some(data),
        }
    }

    /// 201 with the created resource
    pub fn created(info: &'static str, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            info,
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    /// 200 with `data: null`
    pub fn empty(info: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            info,
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let body = Body {
            code: self.status.as_u16(),
            info: self.info,
            data: &self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::json;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn created_envelope() {
        let response = Envelope::created("Thing created successfully", json!({"id": 1}))
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            body_of(response).await,
            json!({"code": 201, "info": "Thing created successfully", "data": {"id": 1}})
        );
    }

    #[tokio::test]
    async fn empty_envelope_has_null_data() {
        let response = Envelope::empty("Thing deleted successfully").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_of(response).await,
            json!({"code": 200, "info": "Thing deleted successfully", "data": null})
        );
    }
}
