use std::pin::Pin;

use async_stream::stream;
use futures_util::{Stream, StreamExt};
use serde::Serialize;

use crate::error::GatewayError;
use crate::llm::{ChatProvider, FrameStream};
use crate::models::{synthesize_id, unix_now, ChatRequest, ChunkDelta, StreamChunk};

/** \brief 流结束标记。 */
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/** \brief 下游看到的帧序列，不会再出现错误。 */
pub type RelayStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/**
 * \brief 序列化为 `data: <json>\n\n`，非 ASCII 字符原样输出。
 */
pub fn sse_frame<T: Serialize>(payload: &T) -> String {
    format!(
        "data: {}\n\n",
        serde_json::to_string(payload).unwrap_or_default()
    )
}

/**
 * \brief 解析一帧 `data: <json>`；`[DONE]` 或非 chunk 内容返回 None。
 */
pub fn parse_frame(frame: &str) -> Option<StreamChunk> {
    let data = frame.trim().strip_prefix("data:")?.trim();
    serde_json::from_str(data).ok()
}

/**
 * \brief 错误提示帧：`【错误】<message>`，finish_reason 为 error。
 */
pub fn error_chunk(model: &str, message: &str) -> StreamChunk {
    StreamChunk::single(
        synthesize_id(),
        unix_now(),
        model.to_string(),
        ChunkDelta {
            role: Some("assistant".to_string()),
            content: Some(format!("【错误】{}", message)),
        },
        Some("error".to_string()),
    )
}

/**
 * \brief 在帧流外包一层：原样转发，遇到第一个错误时补发错误帧与 `[DONE]` 后结束，错误不再向外传播。
 */
pub fn guard(frames: FrameStream, model: String) -> impl Stream<Item = String> + Send + 'static {
    stream! {
        let mut frames = frames;
        while let Some(item) = frames.next().await {
            match item {
                Ok(frame) => {
                    yield frame;
                }
                Err(err) => {
                    tracing::warn!(model = %model, error = %err, "upstream stream broke mid-response");
                    yield sse_frame(&error_chunk(&model, err.detail()));
                    yield DONE_FRAME.to_string();
                    break;
                }
            }
        }
    }
}

/**
 * \brief 建立流失败时返回给调用方的两帧：错误帧 + `[DONE]`。
 */
pub fn failed(err: &GatewayError, model: &str) -> impl Stream<Item = String> + Send + 'static {
    tokio_stream::iter([
        sse_frame(&error_chunk(model, err.detail())),
        DONE_FRAME.to_string(),
    ])
}

/**
 * \brief 建立流式调用并转成不会出错的帧序列。
 * \details 响应头发出后无法再改状态码，因此建立失败也以带内错误帧返回。
 */
pub async fn establish(provider: &dyn ChatProvider, req: &ChatRequest) -> RelayStream {
    let model = provider.resolve_model(req);
    match provider.stream_chat(req).await {
        Ok(frames) => Box::pin(guard(frames, model)),
        Err(err) => {
            tracing::warn!(provider = provider.name(), error = %err, "failed to open upstream stream");
            Box::pin(failed(&err, &model))
        }
    }
}
