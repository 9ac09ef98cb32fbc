pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod registry;
pub mod relay;
pub mod server;
pub mod telemetry;

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::config::{GatewayConfig, PersonaConfig, VendorConfig};
    pub use crate::error::GatewayError;
    pub use crate::llm::{ChatProvider, FrameStream, OpenAiCompatProvider};
    pub use crate::models::{ChatMessage, ChatRequest, ChatResponse, InspireRequest, Role};
    pub use crate::registry::{ProviderRegistry, Vendor};
    pub use crate::{config, llm, models, prompts, registry, relay, server, telemetry};
}
