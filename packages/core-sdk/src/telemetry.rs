use std::borrow::Cow;

use tracing_subscriber::EnvFilter;

use crate::models::ChatMessage;

/**
 * \brief 初始化 tracing 日志；RUST_LOG 优先，重复调用无副作用。
 */
pub fn init(verbose: bool) {
    let fallback = if verbose {
        "mediagate_core_sdk=debug,mediagate=debug,tower_http=debug"
    } else {
        "info,tower_http=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/**
 * \brief 记录发往 LLM 的请求：概要走 info，逐条消息走 debug 并截断。
 */
pub fn log_llm_request(
    tag: &str,
    provider: &str,
    model_hint: Option<&str>,
    messages: &[ChatMessage],
    max_len: usize,
) {
    tracing::info!(
        tag,
        provider,
        model = model_hint.unwrap_or("<default>"),
        count = messages.len(),
        "outgoing llm request"
    );
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    for (i, m) in messages.iter().enumerate() {
        tracing::debug!(tag, index = i, role = m.role.as_str(), "{}", truncate(&m.content, max_len));
    }
}

/**
 * \brief 按字符数截断，超出部分以 `...<truncated>` 代替。
 */
pub fn truncate(content: &str, max_chars: usize) -> Cow<'_, str> {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => Cow::Owned(format!("{}...<truncated>", &content[..cut])),
        None => Cow::Borrowed(content),
    }
}
