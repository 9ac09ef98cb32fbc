use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::GatewayError;

/**
 * \brief 消息角色，与 OpenAI Chat 协议的三种字面量一致。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /**
     * \brief 宽松解析上游返回的角色；未知值返回 None。
     */
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

/**
 * \brief 消息结构，与 OpenAI Chat 消息格式对齐。
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /** \brief 角色：system/user/assistant */
    pub role: Role,
    /** \brief 内容，不可为空 */
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

fn default_temperature() -> Option<f64> {
    Some(0.7)
}

fn default_num_ideas() -> Option<u32> {
    Some(3)
}

fn default_language() -> Option<String> {
    Some("zh-CN".to_string())
}

/**
 * \brief 通用聊天请求。
 * \details temperature 字段缺省时取 0.7；显式传 null 则不向上游发送该参数。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /** \brief 请求级指定厂商（openai/deepseek/qwen/ollama） */
    #[serde(default)]
    pub provider: Option<String>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: None,
            temperature: default_temperature(),
            max_tokens: None,
            provider: None,
        }
    }

    /**
     * \brief 基础校验：消息序列非空且每条内容非空。
     */
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.messages.is_empty() {
            return Err(GatewayError::BadRequest("messages 不能为空".to_string()));
        }
        validate_contents(&self.messages)
    }
}

fn validate_contents(messages: &[ChatMessage]) -> Result<(), GatewayError> {
    match messages.iter().position(|m| m.content.is_empty()) {
        Some(i) => Err(GatewayError::BadRequest(format!(
            "messages[{}].content 不能为空",
            i
        ))),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: Option<String>,
}

/**
 * \brief 非流式响应，只包含一个 index 为 0 的 choice。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

impl ChatResponse {
    pub const OBJECT: &'static str = "chat.completion";

    /** \brief 首个（也是唯一的）choice 的文本内容。 */
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/**
 * \brief 流式增量，字段缺失时序列化时省略。
 */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/**
 * \brief 流式响应中的单个 chunk（chat.completion.chunk）。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

impl StreamChunk {
    pub const OBJECT: &'static str = "chat.completion.chunk";

    /**
     * \brief 构造只含一个 choice 的 chunk。
     */
    pub fn single(
        id: String,
        created: i64,
        model: String,
        delta: ChunkDelta,
        finish_reason: Option<String>,
    ) -> Self {
        Self {
            id,
            object: Self::OBJECT.to_string(),
            created,
            model,
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        }
    }

    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.finish_reason.as_deref())
    }
}

/**
 * \brief 灵感助手的使用者角色。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspireRole {
    Creator,
    Advertiser,
}

impl InspireRole {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "creator" => Some(InspireRole::Creator),
            "advertiser" => Some(InspireRole::Advertiser),
            _ => None,
        }
    }
}

/**
 * \brief 灵感请求（领域 DTO）。
 * \details 携带 messages 时视为继续对话，topic 被忽略；否则以 topic 作为一条用户消息。
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspireRequest {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,

    pub role: InspireRole,
    /** \brief 主题，如：秋季新款卫衣 */
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default = "default_num_ideas")]
    pub num_ideas: Option<u32>,
    /** \brief 语气/风格，如：年轻、潮流、专业 */
    #[serde(default)]
    pub style: Option<String>,
    /** \brief 平台，如：抖音/小红书/B站 */
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
    #[serde(default = "default_language")]
    pub language: Option<String>,
    #[serde(default)]
    pub extra_context: Option<String>,
    /** \brief 继续对话时携带的历史消息 */
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
}

impl InspireRequest {
    pub fn new(role: InspireRole) -> Self {
        Self {
            provider: None,
            model: None,
            temperature: default_temperature(),
            max_tokens: None,
            role,
            topic: None,
            num_ideas: default_num_ideas(),
            style: None,
            platform: None,
            audience: None,
            language: default_language(),
            extra_context: None,
            messages: None,
        }
    }

    /** \brief 去除空白后的主题；空字符串视为未提供。 */
    pub fn topic(&self) -> Option<&str> {
        self.topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /** \brief 非空的历史消息。 */
    pub fn history(&self) -> Option<&[ChatMessage]> {
        self.messages.as_deref().filter(|m| !m.is_empty())
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        match self.history() {
            Some(history) => validate_contents(history),
            None => Ok(()),
        }
    }

    /**
     * \brief 用构建好的消息序列生成转发给 Provider 的 ChatRequest。
     */
    pub fn to_chat_request(&self, messages: Vec<ChatMessage>) -> ChatRequest {
        ChatRequest {
            messages,
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            provider: self.provider.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub role: InspireRole,
    pub suggestions: Vec<String>,
}

/** \brief 当前 Unix 时间（秒）。 */
pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/**
 * \brief 上游未提供 id 时合成的补全 id：`chatcmpl_<毫秒时间戳>`。
 */
pub fn synthesize_id() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("chatcmpl_{}", millis)
}
