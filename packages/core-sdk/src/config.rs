use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::registry::Vendor;

const DEFAULT_PROVIDER: &str = "qwen";
const DEFAULT_PERSONA_NAME: &str = "小媒";
const DEFAULT_PERSONA_DESC: &str = "新媒体工作室的小助手，擅长创作灵感、脚本分镜、广告文案与投放建议";
const DEFAULT_PERSONA_EXAMPLES: &str =
    "例如：给我3个短视频创意方向；把创意#2扩展为分镜脚本；帮我优化这段文案";

/**
 * \brief 单个厂商的连接参数，启动时解析一次，进程内只读。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorConfig {
    pub vendor: Vendor,
    /** \brief 本地后端（如 Ollama）可以没有 API Key */
    pub api_key: Option<String>,
    pub base_url: String,
    pub default_model: String,
}

/**
 * \brief 灵感接口的人格设定。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonaConfig {
    pub enabled: bool,
    pub name: String,
    pub description: String,
    pub examples: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            name: DEFAULT_PERSONA_NAME.to_string(),
            description: DEFAULT_PERSONA_DESC.to_string(),
            examples: DEFAULT_PERSONA_EXAMPLES.to_string(),
        }
    }
}

/**
 * \brief 网关的全部运行配置。
 * \details 由 `from_env` 在启动时构造，之后以引用传给 Registry 与 Prompt Builder，处理请求时不再读取环境变量。
 */
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /** \brief 未在请求中指定 provider 时使用的厂商名 */
    pub default_provider: String,
    /** \brief 入站鉴权 Key；为空则关闭鉴权 */
    pub inbound_api_key: Option<String>,
    pub persona: PersonaConfig,
    /** \brief 调试日志中单条消息的最大字符数 */
    pub debug_log_truncate: usize,
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub vendors: Vec<VendorConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl GatewayConfig {
    /**
     * \brief 从进程环境变量构造配置。
     */
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /**
     * \brief 通过任意查找函数构造配置，空白值视为未设置。
     */
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let vendors = Vendor::ALL
            .iter()
            .map(|&vendor| VendorConfig {
                vendor,
                api_key: get(vendor.api_key_env()),
                base_url: get(vendor.base_url_env())
                    .unwrap_or_else(|| vendor.default_base_url().to_string()),
                default_model: get(vendor.model_env())
                    .unwrap_or_else(|| vendor.fallback_model().to_string()),
            })
            .collect();

        let persona = PersonaConfig {
            enabled: get("PERSONA_ENABLED").map(|v| is_truthy(&v)).unwrap_or(true),
            name: get("PERSONA_NAME").unwrap_or_else(|| DEFAULT_PERSONA_NAME.to_string()),
            description: get("PERSONA_DESC").unwrap_or_else(|| DEFAULT_PERSONA_DESC.to_string()),
            examples: get("PERSONA_EXAMPLES")
                .unwrap_or_else(|| DEFAULT_PERSONA_EXAMPLES.to_string()),
        };

        Self {
            default_provider: get("PROVIDER")
                .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
                .to_ascii_lowercase(),
            inbound_api_key: get("AI_SERVICE_API_KEY"),
            persona,
            debug_log_truncate: parse_or_warn("DEBUG_LOG_TRUNCATE", get("DEBUG_LOG_TRUNCATE"), 500),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or_warn("PORT", get("PORT"), 3001),
            connect_timeout: Duration::from_secs(parse_or_warn(
                "UPSTREAM_CONNECT_TIMEOUT_SECS",
                get("UPSTREAM_CONNECT_TIMEOUT_SECS"),
                10,
            )),
            vendors,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn vendor(&self, vendor: Vendor) -> Option<&VendorConfig> {
        self.vendors.iter().find(|v| v.vendor == vendor)
    }

    /**
     * \brief 加载工作目录下的 .env（若存在）并返回其路径；文件存在但格式错误时报错。
     */
    pub fn load_dotenv() -> Result<Option<PathBuf>> {
        match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(err) if err.not_found() => Ok(None),
            Err(err) => Err(anyhow!("malformed .env: {}", err)),
        }
    }

    /**
     * \brief 启动时打印配置概要，Key 只输出是否存在。
     */
    pub fn log_summary(&self) {
        tracing::info!(
            default_provider = %self.default_provider,
            inbound_auth = self.inbound_api_key.is_some(),
            persona = self.persona.enabled,
            listen = %self.listen_addr(),
            "gateway configuration loaded"
        );
        for v in &self.vendors {
            tracing::info!(
                vendor = v.vendor.as_str(),
                base_url = %v.base_url,
                model = %v.default_model,
                api_key = v.api_key.is_some(),
                "vendor configured"
            );
        }
    }
}

/**
 * \brief 开关型变量：1/true/yes/y/on 视为开启。
 */
pub fn is_truthy(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn parse_or_warn<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
{
    match raw {
        Some(v) => match v.parse::<T>() {
            Ok(x) => x,
            Err(_) => {
                tracing::warn!("ENV `{}` invalid value `{}`, using default", name, v);
                default
            }
        },
        None => default,
    }
}
