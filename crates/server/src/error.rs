/// 接口错误类型
///
/// 所有错误都以 `{ "success": false, "message": ... }` 的 JSON 返回

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::ValidationErrors;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// 请求体字段校验失败，逐条列出错误
    #[error("{message}")]
    Validation { message: String, errors: Vec<String> },

    #[error("数据库错误: {0}")]
    Database(#[from] DbErr),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Common(#[from] common::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(format!("{} not found", what))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Common(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::Common(_) | AppError::Database(_) | AppError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, field_errors)| {
                field_errors.iter().map(move |e| match &e.message {
                    Some(message) => format!("{}: {}", field, message),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        messages.sort();

        AppError::Validation {
            message: "Validation failed".to_string(),
            errors: messages,
        }
    }
}

/// 错误响应体
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<String>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = if status.is_server_error() {
            error!("请求处理失败: {}", self);
            ErrorResponse {
                success: false,
                message: INTERNAL_ERROR_MESSAGE.to_string(),
                errors: None,
            }
        } else {
            match self {
                AppError::Validation { message, errors } => ErrorResponse {
                    success: false,
                    message,
                    errors: Some(errors),
                },
                other => ErrorResponse {
                    success: false,
                    message: other.to_string(),
                    errors: None,
                },
            }
        };

        (status, Json(body)).into_response()
    }
}
