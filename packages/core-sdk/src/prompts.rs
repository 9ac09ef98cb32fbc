use crate::config::PersonaConfig;
use crate::error::GatewayError;
use crate::models::{ChatMessage, InspireRequest, InspireRole};

const CREATOR_SUGGESTIONS: &[&str] = &[
    "给我3个短视频创意方向，主题是秋季新款卫衣。",
    "基于潮流与校园场景，设计5个可执行拍摄脚本。",
    "给我一段 15s 的开场钩子模板，适配穿搭类。",
    "按『剧情反转』结构，写3条脚本提纲与口播。",
];

const ADVERTISER_SUGGESTIONS: &[&str] = &[
    "面向18-25岁学生党，提炼 5 条卫衣卖点与钩子。",
    "给出3个投放创意方向（抖音信息流），含CTA。",
    "用AIDA模型写 3 条卫衣广告文案（每条≤80字）。",
    "根据人群画像，推荐合适的达人种草视频切入点。",
];

/**
 * \brief 由人格配置生成系统消息。
 */
pub fn persona_message(persona: &PersonaConfig) -> ChatMessage {
    ChatMessage::system(format!(
        "你叫{}，是{}。你可以向我提问，{}。请先理解用户意图，直接切题作答。",
        persona.name, persona.description, persona.examples
    ))
}

/**
 * \brief 将灵感请求构建为消息序列。
 * \details 有历史消息则原样透传（忽略 topic），否则以 topic 作为一条用户消息；两者皆无返回 BadRequest。
 *          人格开启时在最前面插入一条系统消息。纯函数，无副作用。
 */
pub fn build_inspire_messages(
    req: &InspireRequest,
    persona: &PersonaConfig,
) -> Result<Vec<ChatMessage>, GatewayError> {
    let base: Vec<ChatMessage> = if let Some(history) = req.history() {
        history.to_vec()
    } else if let Some(topic) = req.topic() {
        vec![ChatMessage::user(topic)]
    } else {
        return Err(GatewayError::BadRequest("缺少 messages 或 topic".to_string()));
    };

    if !persona.enabled {
        return Ok(base);
    }
    let mut messages = Vec::with_capacity(base.len() + 1);
    messages.push(persona_message(persona));
    messages.extend(base);
    Ok(messages)
}

/** \brief 各角色的快捷提问示例。 */
pub fn suggestions(role: InspireRole) -> &'static [&'static str] {
    match role {
        InspireRole::Creator => CREATOR_SUGGESTIONS,
        InspireRole::Advertiser => ADVERTISER_SUGGESTIONS,
    }
}
