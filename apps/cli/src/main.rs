use std::io::Write;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;

use mediagate_core_sdk::{
    config::GatewayConfig,
    models::{ChatMessage, ChatRequest, InspireRequest, InspireRole},
    prompts,
    registry::ProviderRegistry,
    relay, server, telemetry,
};

/**
 * \brief CLI 程序入口：启动网关或在终端直接调用模型。
 */
#[derive(Parser, Debug)]
#[command(name = "mediagate", version, about = "OpenAI-compatible LLM gateway")]
struct Cli {
    /** \brief 输出 debug 日志（含发往模型的消息内容） */
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /**
     * \brief 启动 HTTP 网关。
     */
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },

    /**
     * \brief 发送一条用户消息并流式显示模型回复。
     */
    Chat {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        system: Option<String>,
        #[arg(long)]
        temperature: Option<f64>,
        /** \brief 使用一次性接口而非流式 */
        #[arg(long, default_value_t = false)]
        no_stream: bool,
        #[arg(long)]
        prompt: String,
    },

    /**
     * \brief 按灵感模板（含人格）生成内容。
     */
    Inspire {
        #[arg(long, default_value = "creator")]
        role: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },

    /**
     * \brief 列出已配置的厂商。
     */
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = GatewayConfig::load_dotenv()?;
    telemetry::init(cli.verbose);
    match dotenv {
        Some(path) => tracing::info!("loaded .env from {}", path.display()),
        None => tracing::debug!("no .env found, using process environment"),
    }
    let mut config = GatewayConfig::from_env();

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            config.log_summary();
            server::run(config).await?;
        }
        Commands::Chat {
            provider,
            model,
            system,
            temperature,
            no_stream,
            prompt,
        } => {
            let mut messages = Vec::new();
            if let Some(system) = system {
                messages.push(ChatMessage::system(system));
            }
            messages.push(ChatMessage::user(prompt));

            let mut req = ChatRequest::new(messages);
            req.model = model;
            req.provider = provider;
            if temperature.is_some() {
                req.temperature = temperature;
            }
            req.validate()?;

            let registry = ProviderRegistry::from_config(&config)?;
            let provider = registry.resolve(req.provider.as_deref())?;
            tracing::debug!(provider = provider.name(), "cli chat");

            if no_stream {
                let resp = provider.chat(&req).await.context("chat failed")?;
                println!("{}", resp.content().unwrap_or_default());
            } else {
                print_stream(provider.as_ref(), &req).await?;
            }
        }
        Commands::Inspire {
            role,
            topic,
            provider,
            model,
        } => {
            let role =
                InspireRole::parse(&role).ok_or_else(|| anyhow!("unknown role: {}", role))?;
            let mut req = InspireRequest::new(role);
            req.topic = Some(topic);
            req.provider = provider;
            req.model = model;

            let registry = ProviderRegistry::from_config(&config)?;
            let provider = registry.resolve(req.provider.as_deref())?;
            let messages = prompts::build_inspire_messages(&req, &config.persona)?;
            telemetry::log_llm_request(
                "cli.inspire",
                provider.name(),
                req.model.as_deref(),
                &messages,
                config.debug_log_truncate,
            );
            print_stream(provider.as_ref(), &req.to_chat_request(messages)).await?;
        }
        Commands::Providers => {
            for v in &config.vendors {
                let marker = if v.vendor.as_str() == config.default_provider {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:<9} {:<16} key={:<3} {}",
                    marker,
                    v.vendor.as_str(),
                    v.default_model,
                    if v.api_key.is_some() { "yes" } else { "no" },
                    v.base_url
                );
            }
        }
    }

    Ok(())
}

/**
 * \brief 流式打印模型回复；上游失败直接返回错误，不输出错误帧。
 */
async fn print_stream(
    provider: &dyn mediagate_core_sdk::llm::ChatProvider,
    req: &ChatRequest,
) -> Result<()> {
    let mut stream = provider
        .stream_chat(req)
        .await
        .context("create stream failed")?;

    let mut stdout = std::io::stdout();
    while let Some(frame) = stream
        .as_mut()
        .next()
        .await
        .transpose()
        .context("stream error")?
    {
        let Some(chunk) = relay::parse_frame(&frame) else {
            continue;
        };
        if let Some(piece) = chunk.content() {
            print!("{}", piece);
            stdout.flush().ok();
        }
    }
    println!();
    Ok(())
}
