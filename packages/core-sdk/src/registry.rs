use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::llm::{ChatProvider, OpenAiCompatProvider};

/**
 * \brief 受支持的厂商集合（封闭枚举），全部走 OpenAI 兼容协议。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vendor {
    OpenAi,
    DeepSeek,
    Qwen,
    Ollama,
}

impl Vendor {
    pub const ALL: [Vendor; 4] = [Vendor::OpenAi, Vendor::DeepSeek, Vendor::Qwen, Vendor::Ollama];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "openai",
            Vendor::DeepSeek => "deepseek",
            Vendor::Qwen => "qwen",
            Vendor::Ollama => "ollama",
        }
    }

    /** \brief 按名称解析，大小写不敏感。 */
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Vendor::ALL.into_iter().find(|v| v.as_str() == name)
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "OPENAI_API_KEY",
            Vendor::DeepSeek => "DEEPSEEK_API_KEY",
            Vendor::Qwen => "QWEN_API_KEY",
            Vendor::Ollama => "OLLAMA_API_KEY",
        }
    }

    pub fn base_url_env(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "OPENAI_BASE_URL",
            Vendor::DeepSeek => "DEEPSEEK_BASE_URL",
            Vendor::Qwen => "QWEN_BASE_URL",
            Vendor::Ollama => "OLLAMA_BASE_URL",
        }
    }

    pub fn model_env(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "OPENAI_MODEL",
            Vendor::DeepSeek => "DEEPSEEK_MODEL",
            Vendor::Qwen => "QWEN_MODEL",
            Vendor::Ollama => "OLLAMA_MODEL",
        }
    }

    /**
     * \brief 未设置 base url 环境变量时使用的默认基址。
     */
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "https://api.openai.com/v1",
            Vendor::DeepSeek => "https://api.deepseek.com",
            // 通义 Qwen（DashScope 兼容模式）
            Vendor::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
            // 本地 Ollama 的 OpenAI 兼容 API
            Vendor::Ollama => "http://localhost:11434/v1",
        }
    }

    pub fn fallback_model(&self) -> &'static str {
        match self {
            Vendor::OpenAi => "gpt-4o-mini",
            Vendor::DeepSeek => "deepseek-chat",
            Vendor::Qwen => "qwen-flash",
            Vendor::Ollama => "llama3.1",
        }
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/**
 * \brief Provider 注册表：启动时为每个厂商构造一个实例，之后只读。
 */
pub struct ProviderRegistry {
    default_name: String,
    providers: BTreeMap<Vendor, Arc<dyn ChatProvider>>,
    skipped_chunks: Arc<AtomicU64>,
}

impl ProviderRegistry {
    /**
     * \brief 按配置为全部厂商构造 OpenAI 兼容 Provider，缺少 API Key 不影响启动。
     */
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let skipped_chunks = Arc::new(AtomicU64::new(0));
        let mut providers: BTreeMap<Vendor, Arc<dyn ChatProvider>> = BTreeMap::new();
        for vendor_cfg in &config.vendors {
            let provider = OpenAiCompatProvider::new(
                vendor_cfg.clone(),
                config.connect_timeout,
                skipped_chunks.clone(),
            )?;
            providers.insert(vendor_cfg.vendor, Arc::new(provider));
        }
        Ok(Self {
            default_name: config.default_provider.clone(),
            providers,
            skipped_chunks,
        })
    }

    /**
     * \brief 由现成的 Provider 实例组装注册表。
     * \details skipped_chunks 应与这些 Provider 构造时传入的计数器是同一个，/health 才能读到真实值。
     */
    pub fn from_parts<I>(default_name: &str, providers: I, skipped_chunks: Arc<AtomicU64>) -> Self
    where
        I: IntoIterator<Item = (Vendor, Arc<dyn ChatProvider>)>,
    {
        Self {
            default_name: default_name.trim().to_ascii_lowercase(),
            providers: providers.into_iter().collect(),
            skipped_chunks,
        }
    }

    /**
     * \brief 解析请求应使用的 Provider。
     * \details 生效名称 = 请求指定 → 进程默认 → "openai"；不在厂商集合内时返回 BadRequest，不发起任何网络请求。
     */
    pub fn resolve(&self, requested: Option<&str>) -> Result<Arc<dyn ChatProvider>, GatewayError> {
        let name = requested
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or_else(|| Some(self.default_name.as_str()).filter(|n| !n.is_empty()))
            .unwrap_or("openai")
            .to_ascii_lowercase();
        Vendor::from_name(&name)
            .and_then(|vendor| self.providers.get(&vendor))
            .cloned()
            .ok_or_else(|| GatewayError::BadRequest(format!("不支持的 provider: {}", name)))
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.keys().map(Vendor::as_str).collect()
    }

    /** \brief 流式转发中被跳过的异常 chunk 总数。 */
    pub fn skipped_chunks(&self) -> u64 {
        self.skipped_chunks.load(Ordering::Relaxed)
    }
}
