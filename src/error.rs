use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("unauthorized")]
    Unauthorized,

    #[error("{message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("You are posting too frequently. Please try again later.")]
    RateLimited,

    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Validation { .. } => "BAD_REQUEST",
            AppError::RateLimited => "TOO_MANY_REQUESTS",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Internal causes go to the log, never to the client.
        let message = match &self {
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                "Internal server error".to_owned()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "code": self.code(),
            "message": message,
        });
        if let AppError::Validation { field, message } = &self {
            body["details"] = json!({ *field: [message] });
        }

        (self.status(), Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<String> for AppError {
    fn from(err: String) -> Self {
        Self::Internal(anyhow::Error::msg(err))
    }
}

impl From<&str> for AppError {
    fn from(err: &str) -> Self {
        Self::Internal(anyhow::Error::msg(err.to_owned()))
    }
}

macro_rules! internal_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self::Internal(anyhow::Error::from(err))
            }
        }
    };
}

internal_impl!(serde_json::Error);
internal_impl!(sqlx::Error);
internal_impl!(redis::RedisError);
internal_impl!(reqwest::Error);
internal_impl!(tower_sessions::session::Error);

impl<E: core::error::Error + Send + Sync + 'static, R: oauth2::ErrorResponse + Send + Sync + 'static>
    From<oauth2::RequestTokenError<E, R>> for AppError
{
    fn from(err: oauth2::RequestTokenError<E, R>) -> Self {
        Self::Internal(anyhow::Error::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn statuses_follow_the_taxonomy() {
        let cases = [
            (AppError::NotFound("post"), StatusCode::NOT_FOUND),
            (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                AppError::Validation {
                    field: "content",
                    message: "Only emojis are allowed".to_owned(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (AppError::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (
                AppError::Internal(anyhow::Error::msg("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn validation_errors_carry_field_details() {
        let err = AppError::Validation {
            field: "content",
            message: "Only emojis are allowed".to_owned(),
        };

        let body = body_json(err.into_response()).await;
        assert_eq!(body["code"], "BAD_REQUEST");
        assert_eq!(body["details"]["content"][0], "Only emojis are allowed");
    }

    #[tokio::test]
    async fn internal_errors_are_redacted() {
        let err = AppError::Internal(anyhow::Error::msg("connection refused (127.0.0.1:6379)"));

        let body = body_json(err.into_response()).await;
        assert_eq!(body["code"], "INTERNAL_SERVER_ERROR");
        assert_eq!(body["message"], "Internal server error");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn not_found_names_the_missing_thing() {
        let body = body_json(AppError::NotFound("user").into_response()).await;
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["message"], "user not found");
    }
}
