use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};

use crate::config::VendorConfig;
use crate::error::{error_chain, GatewayError};
use crate::models::{
    synthesize_id, unix_now, ChatChoice, ChatMessage, ChatRequest, ChatResponse, ChunkDelta, Role,
    StreamChunk,
};
use crate::relay::{sse_frame, DONE_FRAME};

/**
 * \brief 预序列化的 SSE 帧流；Err 表示流已开始后的上游失败。
 */
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, GatewayError>> + Send>>;

/**
 * \brief Provider 能力接口：一次性对话与流式对话。
 */
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /** \brief 厂商名，如 qwen */
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    /**
     * \brief 生效模型：请求指定优先，否则取厂商默认模型。
     */
    fn resolve_model(&self, req: &ChatRequest) -> String {
        req.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.default_model())
            .to_string()
    }

    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, GatewayError>;

    /**
     * \brief 建立流式调用；建立失败同步返回 BadGateway，成功后返回以 `[DONE]` 结尾的帧流。
     */
    async fn stream_chat(&self, req: &ChatRequest) -> Result<FrameStream, GatewayError>;
}

/**
 * \brief OpenAI 兼容协议的 HTTP 客户端实现，按厂商配置参数化。
 */
pub struct OpenAiCompatProvider {
    config: VendorConfig,
    client: reqwest::Client,
    skipped_chunks: Arc<AtomicU64>,
}

impl OpenAiCompatProvider {
    pub fn new(
        config: VendorConfig,
        connect_timeout: Duration,
        skipped_chunks: Arc<AtomicU64>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            config,
            client,
            skipped_chunks,
        })
    }

    pub fn config(&self) -> &VendorConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, req: &ChatRequest, model: &str, stream: bool) -> Value {
        let mut body = json!({
            "model": model,
            "messages": req.messages,
            "stream": stream
        });
        if let Some(t) = req.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(n) = req.max_tokens {
            body["max_tokens"] = json!(n);
        }
        body
    }

    /**
     * \brief 发送请求并检查状态码；任何失败都映射为 BadGateway。
     */
    async fn send(&self, body: &Value) -> Result<reqwest::Response, GatewayError> {
        let mut request = self
            .client
            .post(self.endpoint())
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        if let Some(key) = &self.config.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key));
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(GatewayError::upstream(format!(
                "request failed: {} -> {}",
                status, text
            )));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.config.vendor.as_str()
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, GatewayError> {
        let model = self.resolve_model(req);
        let body = self.request_body(req, &model, false);
        let resp = self.send(&body).await?;
        let v: Value = resp.json().await?;
        normalize_completion(&v, &model)
            .ok_or_else(|| GatewayError::upstream("上游响应缺少 choices"))
    }

    async fn stream_chat(&self, req: &ChatRequest) -> Result<FrameStream, GatewayError> {
        let model = self.resolve_model(req);
        let body = self.request_body(req, &model, true);
        let resp = self.send(&body).await?;
        Ok(relay_upstream(
            resp.bytes_stream(),
            model,
            self.config.vendor.as_str(),
            self.skipped_chunks.clone(),
        ))
    }
}

/**
 * \brief 将首个上游 choice 规范化为 ChatResponse；没有 choice 时返回 None。
 */
pub fn normalize_completion(v: &Value, model: &str) -> Option<ChatResponse> {
    let first = v.get("choices")?.get(0)?;
    let message = first.get("message");
    let role = message
        .and_then(|m| m.get("role"))
        .and_then(Value::as_str)
        .and_then(Role::parse)
        .unwrap_or(Role::Assistant);
    let content = message
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("");

    Some(ChatResponse {
        id: v
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(synthesize_id),
        object: ChatResponse::OBJECT.to_string(),
        created: v.get("created").and_then(Value::as_i64).unwrap_or_else(unix_now),
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessage::new(role, content),
            finish_reason: first
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        }],
    })
}

/**
 * \brief 将上游 chunk 规范化为单 choice 的 StreamChunk；缺少 choices[0] 视为异常 chunk。
 */
pub fn normalize_chunk(v: &Value, model: &str) -> Option<StreamChunk> {
    let choice = v.get("choices")?.get(0)?;
    if !choice.is_object() {
        return None;
    }
    let delta = choice.get("delta");
    let text = |key: &str| {
        delta
            .and_then(|d| d.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(StreamChunk::single(
        v.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(synthesize_id),
        v.get("created").and_then(Value::as_i64).unwrap_or_else(unix_now),
        v.get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(model)
            .to_string(),
        ChunkDelta {
            role: text("role"),
            content: text("content"),
        },
        choice
            .get("finish_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
    ))
}

enum UpstreamEvent {
    Chunk(StreamChunk),
    Done,
    Malformed,
    Ignored,
}

/**
 * \brief 解析一个 SSE 事件块。上游在流中返回 error 对象时视为中途失败。
 */
fn classify(block: &[u8], model: &str) -> Result<UpstreamEvent, GatewayError> {
    let Some(data) = extract_data(block) else {
        return classify_bare(block);
    };
    if data.trim() == "[DONE]" {
        return Ok(UpstreamEvent::Done);
    }
    let v: Value = match serde_json::from_str(&data) {
        Ok(v) => v,
        Err(_) => return Ok(UpstreamEvent::Malformed),
    };
    if let Some(err) = upstream_error(&v) {
        return Err(err);
    }
    Ok(match normalize_chunk(&v, model) {
        Some(chunk) => UpstreamEvent::Chunk(chunk),
        None => UpstreamEvent::Malformed,
    })
}

/**
 * \brief 处理没有 data 行的块：注释与 event/id/retry 字段忽略；
 *        其余内容（如 2xx 返回的普通 JSON 错误体）按错误或异常 chunk 处理。
 */
fn classify_bare(block: &[u8]) -> Result<UpstreamEvent, GatewayError> {
    let text = String::from_utf8_lossy(block);
    if text.lines().map(str::trim).all(is_sse_control_line) {
        return Ok(UpstreamEvent::Ignored);
    }
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(v) => match upstream_error(&v) {
            Some(err) => Err(err),
            None => Ok(UpstreamEvent::Malformed),
        },
        Err(_) => Ok(UpstreamEvent::Malformed),
    }
}

fn is_sse_control_line(line: &str) -> bool {
    line.is_empty()
        || line.starts_with(':')
        || ["event", "id", "retry"].iter().any(|field| {
            line.strip_prefix(field)
                .map_or(false, |rest| rest.is_empty() || rest.starts_with(':'))
        })
}

fn upstream_error(v: &Value) -> Option<GatewayError> {
    let err = v.get("error").filter(|e| !e.is_null())?;
    let message = err
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());
    Some(GatewayError::upstream(message))
}

/**
 * \brief 把上游字节流转成规范化的 SSE 帧流。
 * \details 边读边解析、逐帧产出；异常 chunk 被跳过并计数；读取出错时产出一个 Err 并结束；正常结束时追加 `[DONE]`。
 */
pub fn relay_upstream<S, B, E>(
    body: S,
    model: String,
    vendor: &'static str,
    skipped_chunks: Arc<AtomicU64>,
) -> FrameStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let out = try_stream! {
        let mut body = Box::pin(body);
        let mut buf = Vec::<u8>::new();
        let mut pending_cr = false;
        let mut done = false;

        while !done {
            let Some(chunk) = body.next().await else {
                break;
            };
            let chunk = chunk.map_err(|e| GatewayError::upstream(error_chain(&e)))?;
            push_normalized(&mut buf, chunk.as_ref(), &mut pending_cr);

            while let Some(pos) = find_double_newline(&buf) {
                let block = buf.drain(..pos + 2).collect::<Vec<u8>>();
                match classify(&block, &model)? {
                    UpstreamEvent::Chunk(c) => {
                        yield sse_frame(&c);
                    }
                    UpstreamEvent::Done => {
                        done = true;
                        break;
                    }
                    UpstreamEvent::Malformed => count_skip(&skipped_chunks, vendor, &block),
                    UpstreamEvent::Ignored => {}
                }
            }
        }

        if !done && !buf.is_empty() {
            match classify(&buf, &model)? {
                UpstreamEvent::Chunk(c) => {
                    yield sse_frame(&c);
                }
                UpstreamEvent::Malformed => count_skip(&skipped_chunks, vendor, &buf),
                UpstreamEvent::Done | UpstreamEvent::Ignored => {}
            }
        }

        yield DONE_FRAME.to_string();
    };
    Box::pin(out)
}

fn count_skip(counter: &AtomicU64, vendor: &str, block: &[u8]) {
    let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
    tracing::debug!(
        vendor,
        total,
        block = %String::from_utf8_lossy(block).trim(),
        "skip malformed upstream chunk"
    );
}

/**
 * \brief 追加字节并把 CRLF 与单独的 CR 统一为 LF；CRLF 可能跨两次读取，由 pending_cr 记录。
 */
fn push_normalized(buf: &mut Vec<u8>, bytes: &[u8], pending_cr: &mut bool) {
    for &b in bytes {
        match b {
            b'\r' => {
                buf.push(b'\n');
                *pending_cr = true;
            }
            b'\n' if *pending_cr => *pending_cr = false,
            _ => {
                buf.push(b);
                *pending_cr = false;
            }
        }
    }
}

fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

/**
 * \brief 取出事件块中的 data 字段，多行 data 以换行拼接；没有 data 行时返回 None。
 */
fn extract_data(block: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(block);
    let lines: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::parse_frame;
    use futures_util::stream;

    fn chunk_event(id: &str, content: &str) -> String {
        format!(
            "data: {}\n\n",
            json!({
                "id": id,
                "object": "chat.completion.chunk",
                "created": 1700000000,
                "model": "qwen-flash",
                "choices": [{"index": 0, "delta": {"content": content}, "finish_reason": null}]
            })
        )
    }

    async fn collect(parts: Vec<String>) -> (Vec<Result<String, GatewayError>>, u64) {
        let counter = Arc::new(AtomicU64::new(0));
        let body = stream::iter(
            parts
                .into_iter()
                .map(Ok::<String, std::io::Error>)
                .collect::<Vec<_>>(),
        );
        let frames = relay_upstream(body, "fallback-model".to_string(), "qwen", counter.clone());
        let out = frames.collect::<Vec<_>>().await;
        (out, counter.load(Ordering::Relaxed))
    }

    fn provider_for_body() -> OpenAiCompatProvider {
        let config = VendorConfig {
            vendor: crate::registry::Vendor::Qwen,
            api_key: None,
            base_url: "http://127.0.0.1:1/v1".to_string(),
            default_model: "qwen-flash".to_string(),
        };
        OpenAiCompatProvider::new(config, Duration::from_secs(1), Arc::new(AtomicU64::new(0)))
            .expect("build provider")
    }

    #[test]
    fn test_request_body_keeps_temperature_exact() {
        let provider = provider_for_body();
        let req = ChatRequest::new(vec![ChatMessage::user("hi")]);
        let body = provider.request_body(&req, "m", false);
        assert_eq!(body["temperature"].to_string(), "0.7");

        let mut req = req;
        req.temperature = Some(0.3);
        req.max_tokens = Some(128);
        let body = provider.request_body(&req, "m", true);
        assert_eq!(body["temperature"].to_string(), "0.3");
        assert_eq!(body["max_tokens"], 128);
        assert_eq!(body["stream"], true);

        req.temperature = None;
        let body = provider.request_body(&req, "m", false);
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_normalize_completion_defaults() {
        let v = json!({
            "choices": [{"index": 0, "message": {"role": "assistant"}, "finish_reason": "stop"}]
        });
        let resp = normalize_completion(&v, "gpt-4o-mini").expect("normalized");
        assert!(resp.id.starts_with("chatcmpl_"));
        assert_eq!(resp.object, "chat.completion");
        assert_eq!(resp.model, "gpt-4o-mini");
        assert_eq!(resp.choices.len(), 1);
        assert_eq!(resp.choices[0].index, 0);
        assert_eq!(resp.choices[0].message.content, "");
        assert_eq!(resp.choices[0].finish_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_normalize_completion_keeps_upstream_fields() {
        let v = json!({
            "id": "chatcmpl-abc",
            "created": 1700000123,
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "你好"}},
                {"index": 1, "message": {"role": "assistant", "content": "ignored"}}
            ]
        });
        let resp = normalize_completion(&v, "m").expect("normalized");
        assert_eq!(resp.id, "chatcmpl-abc");
        assert_eq!(resp.created, 1700000123);
        assert_eq!(resp.choices.len(), 1);
        assert_eq!(resp.content(), Some("你好"));
    }

    #[test]
    fn test_normalize_completion_without_choices() {
        assert!(normalize_completion(&json!({"choices": []}), "m").is_none());
        assert!(normalize_completion(&json!({"id": "x"}), "m").is_none());
    }

    #[test]
    fn test_normalize_chunk_falls_back_to_resolved_model() {
        let v = json!({"choices": [{"delta": {"role": "assistant"}}]});
        let chunk = normalize_chunk(&v, "llama3.1").expect("chunk");
        assert_eq!(chunk.model, "llama3.1");
        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(chunk.content(), None);
        assert!(chunk.id.starts_with("chatcmpl_"));
    }

    #[test]
    fn test_extract_data_joins_lines_and_ignores_comments() {
        assert_eq!(extract_data(b": keep-alive\n\n"), None);
        assert_eq!(
            extract_data(b"event: message\ndata: {\"a\":\ndata:1}\n\n").as_deref(),
            Some("{\"a\":\n1}")
        );
    }

    #[tokio::test]
    async fn test_relay_emits_frames_in_order_then_done() {
        let parts = vec![
            chunk_event("c1", "你"),
            chunk_event("c2", "好"),
            chunk_event("c3", "！"),
            "data: [DONE]\n\n".to_string(),
        ];
        let (out, skipped) = collect(parts).await;
        assert_eq!(skipped, 0);
        assert_eq!(out.len(), 4);
        let frames: Vec<String> = out.into_iter().map(|f| f.expect("frame")).collect();
        let contents: Vec<String> = frames[..3]
            .iter()
            .map(|f| {
                parse_frame(f)
                    .and_then(|c| c.content().map(str::to_string))
                    .expect("content")
            })
            .collect();
        assert_eq!(contents, vec!["你", "好", "！"]);
        assert!(frames[0].starts_with("data: ") && frames[0].ends_with("\n\n"));
        assert_eq!(frames[3], DONE_FRAME);
    }

    #[tokio::test]
    async fn test_relay_skips_malformed_chunk() {
        let parts = vec![
            chunk_event("c1", "a"),
            "data: {not json}\n\n".to_string(),
            "data: {\"id\":\"x\",\"choices\":[]}\n\n".to_string(),
            chunk_event("c2", "b"),
            "data: [DONE]\n\n".to_string(),
        ];
        let (out, skipped) = collect(parts).await;
        assert_eq!(skipped, 2);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|f| f.is_ok()));
        let frames: Vec<String> = out.into_iter().map(|f| f.expect("frame")).collect();
        assert!(frames
            .iter()
            .all(|f| parse_frame(f).map_or(true, |c| c.finish_reason() != Some("error"))));
    }

    #[tokio::test]
    async fn test_relay_handles_split_and_crlf_events() {
        let event = chunk_event("c1", "hello").replace("\n\n", "\r\n\r\n");
        let (head, tail) = event.split_at(20);
        let parts = vec![
            head.to_string(),
            tail.to_string(),
            ": ping\r\n\r\n".to_string(),
            "data: [DONE]\r\n\r\n".to_string(),
        ];
        let (out, skipped) = collect(parts).await;
        assert_eq!(skipped, 0);
        assert_eq!(out.len(), 2);
        let first = out[0].as_ref().expect("frame");
        let chunk = parse_frame(first).expect("chunk frame");
        assert_eq!(chunk.content(), Some("hello"));
    }

    #[tokio::test]
    async fn test_relay_appends_done_when_upstream_omits_it() {
        let parts = vec![chunk_event("c1", "x"), chunk_event("c2", "y")];
        let (out, _) = collect(parts).await;
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].as_ref().expect("done"), DONE_FRAME);
    }

    #[tokio::test]
    async fn test_relay_trailing_event_without_blank_line() {
        let parts = vec![
            chunk_event("c1", "x"),
            "data: {\"choices\":[{\"delta\":{\"content\":\"z\"}}]}".to_string(),
        ];
        let (out, _) = collect(parts).await;
        assert_eq!(out.len(), 3);
    }

    #[tokio::test]
    async fn test_relay_error_object_ends_stream_with_err() {
        let parts = vec![
            chunk_event("c1", "x"),
            "data: {\"error\":{\"message\":\"quota exceeded\"}}\n\n".to_string(),
            chunk_event("c2", "never"),
        ];
        let (out, _) = collect(parts).await;
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        match &out[1] {
            Err(GatewayError::BadGateway(msg)) => assert!(msg.contains("quota exceeded")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relay_plain_json_error_body_becomes_err() {
        let parts = vec!["{\"error\":{\"message\":\"model not found\"}}".to_string()];
        let (out, _) = collect(parts).await;
        assert_eq!(out.len(), 1);
        match &out[0] {
            Err(GatewayError::BadGateway(msg)) => assert!(msg.contains("model not found")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relay_error_body_split_over_reads_with_trailing_newline() {
        let parts = vec![
            "{\"error\": {\"message\":".to_string(),
            " \"rate limited\"}}\n".to_string(),
        ];
        let (out, _) = collect(parts).await;
        assert_eq!(out.len(), 1);
        assert!(matches!(&out[0], Err(err) if err.detail().contains("rate limited")));
    }

    #[tokio::test]
    async fn test_relay_counts_non_sse_body_as_skipped() {
        let completion = json!({
            "id": "chatcmpl-x",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}}]
        });
        let (out, skipped) = collect(vec![completion.to_string(), "<html>oops".to_string()]).await;
        assert_eq!(skipped, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().expect("done"), DONE_FRAME);
    }

    #[tokio::test]
    async fn test_relay_ignores_field_only_blocks() {
        let parts = vec![
            "event: ping\nid: 7\nretry: 3000\n\n".to_string(),
            chunk_event("c1", "x"),
            "data: [DONE]\n\n".to_string(),
        ];
        let (out, skipped) = collect(parts).await;
        assert_eq!(skipped, 0);
        assert_eq!(out.len(), 2);
    }

    #[tokio::test]
    async fn test_relay_splits_events_on_bare_cr() {
        let parts = vec![
            chunk_event("c1", "a").replace('\n', "\r"),
            chunk_event("c2", "b").replace('\n', "\r"),
            "data: [DONE]\r\r".to_string(),
            chunk_event("c3", "after-done"),
        ];
        let (out, skipped) = collect(parts).await;
        assert_eq!(skipped, 0);
        assert_eq!(out.len(), 3);
        let first = parse_frame(out[0].as_ref().expect("frame")).expect("chunk");
        assert_eq!(first.content(), Some("a"));
        let second = parse_frame(out[1].as_ref().expect("frame")).expect("chunk");
        assert_eq!(second.content(), Some("b"));
        assert_eq!(out[2].as_ref().expect("done"), DONE_FRAME);
    }

    #[tokio::test]
    async fn test_relay_crlf_split_across_reads() {
        let event = chunk_event("c1", "hello").replace("\n\n", "\r\n\r\n");
        let cut = event.len() - 3;
        let parts = vec![
            event[..cut].to_string(),
            event[cut..].to_string(),
            "data: [DONE]\r\n\r\n".to_string(),
        ];
        let (out, skipped) = collect(parts).await;
        assert_eq!(skipped, 0);
        assert_eq!(out.len(), 2);
        let chunk = parse_frame(out[0].as_ref().expect("frame")).expect("chunk");
        assert_eq!(chunk.content(), Some("hello"));
    }

    #[test]
    fn test_push_normalized_line_endings() {
        let mut buf = Vec::new();
        let mut pending_cr = false;
        push_normalized(&mut buf, b"a\r", &mut pending_cr);
        push_normalized(&mut buf, b"\nb\r\rc\n", &mut pending_cr);
        assert_eq!(buf, b"a\nb\n\nc\n");
        assert!(!pending_cr);
    }

    #[tokio::test]
    async fn test_relay_transport_error_ends_stream_with_err() {
        let counter = Arc::new(AtomicU64::new(0));
        let body = stream::iter(vec![
            Ok(chunk_event("c1", "x")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer")),
        ]);
        let out = relay_upstream(body, "m".to_string(), "openai", counter)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(out.len(), 2);
        match &out[1] {
            Err(err) => assert!(err.detail().contains("reset by peer")),
            Ok(frame) => panic!("unexpected frame {}", frame),
        }
    }
}
