use std::convert::Infallible;

use serde_json::{json, Value};
use warp::{
    http::StatusCode,
    reject::{Reject, Rejection},
    reply::{json, with_status},
    Reply,
};

/// Error of a repository call carried through warp's rejection chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRejection {
    pub code: u16,
    pub info: Option<String>,
}

impl Reject for ApiRejection {}

impl From<potion::Error> for ApiRejection {
    fn from(value: potion::Error) -> Self {
        Self {
            code: value.code as u16,
            info: value.info,
        }
    }
}

pub fn reject(error: potion::Error) -> Rejection {
    warp::reject::custom(ApiRejection::from(error))
}

/// Field errors are stored as a JSON object in `info`; anything else becomes `{"detail": ...}`.
pub fn error_body(status: StatusCode, info: Option<&str>) -> Value {
    match info {
        Some(info) => match serde_json::from_str::<Value>(info) {
            Ok(fields @ Value::Object(_)) => fields,
            _ => json!({ "detail": info }),
        },
        None => json!({ "detail": status.canonical_reason().unwrap_or("Error") }),
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, body) = if let Some(rejection) = err.find::<ApiRejection>() {
        let status =
            StatusCode::from_u16(rejection.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, error_body(status, rejection.info.as_deref()))
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, json!({ "detail": "Not found." }))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, json!({ "detail": e.to_string() }))
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, json!({ "detail": e.to_string() }))
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            json!({ "detail": "Payload too large" }),
        )
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            json!({ "detail": "Unsupported media type" }),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            json!({ "detail": "Method not allowed" }),
        )
    } else {
        log::error!("Unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "detail": "Internal server error" }),
        )
    };

    if status.is_server_error() {
        log::error!("{status}: {body}");
    } else {
        log::debug!("{status}: {body}");
    }

    Ok(with_status(json(&body), status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_info_is_wrapped_in_detail() {
        let body = error_body(StatusCode::BAD_REQUEST, Some("Recipe is already in favorites"));
        assert_eq!(body, json!({ "detail": "Recipe is already in favorites" }));
    }

    #[test]
    fn field_errors_pass_through() {
        let body = error_body(
            StatusCode::BAD_REQUEST,
            Some(r#"{"cooking_time":["Ensure this value is between 1 and 180."]}"#),
        );
        assert_eq!(
            body,
            json!({ "cooking_time": ["Ensure this value is between 1 and 180."] })
        );
    }

    #[test]
    fn missing_info_uses_reason() {
        let body = error_body(StatusCode::NOT_FOUND, None);
        assert_eq!(body, json!({ "detail": "Not Found" }));
    }

    #[tokio::test]
    async fn custom_rejection_keeps_status() {
        let rejection = warp::reject::custom(ApiRejection {
            code: 403,
            info: Some(String::from("Only the author can change this recipe")),
        });
        let reply = handle_rejection(rejection).await.unwrap().into_response();
        assert_eq!(reply.status(), StatusCode::FORBIDDEN);
    }
}
