use std::error::Error as StdError;
use std::fmt::Display;

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/**
 * \brief 网关统一错误类型，决定对外的 HTTP 状态码。
 */
#[derive(Debug, Error)]
pub enum GatewayError {
    /** \brief 参数不合法、未知 provider、缺少 messages/topic 等。 */
    #[error("{0}")]
    BadRequest(String),
    /** \brief 配置了 API Key 但请求未携带或不匹配。 */
    #[error("{0}")]
    Unauthorized(String),
    /** \brief 上游 LLM 调用失败。 */
    #[error("{0}")]
    BadGateway(String),
}

impl GatewayError {
    /**
     * \brief 包装上游失败，detail 形如 `LLM 提供商调用失败: <原因>`。
     */
    pub fn upstream(detail: impl Display) -> Self {
        GatewayError::BadGateway(format!("LLM 提供商调用失败: {}", detail))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            GatewayError::BadRequest(d)
            | GatewayError::Unauthorized(d)
            | GatewayError::BadGateway(d) => d,
        }
    }
}

/**
 * \brief 展开错误的 source 链，reqwest 的顶层错误信息通常不含底层连接原因。
 */
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let piece = inner.to_string();
        if !text.contains(&piece) {
            text.push_str(": ");
            text.push_str(&piece);
        }
        source = inner.source();
    }
    text
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::upstream(error_chain(&err))
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        GatewayError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for GatewayError {
    fn from(rejection: QueryRejection) -> Self {
        GatewayError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), detail = %self.detail(), "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), detail = %self.detail(), "request rejected");
        }
        (status, Json(serde_json::json!({ "detail": self.detail() }))).into_response()
    }
}
