mod config_commands;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::bail,
    clap::{Parser, Subcommand},
    tgrelay_providers::AnthropicClient,
    tgrelay_relay::{Dispatcher, InMemoryConversationMemory},
    tgrelay_telegram::{PollExit, TelegramOutbound},
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "tgrelay", about = "tgrelay: Telegram to LLM message relay", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (default: ./tgrelay.{toml,yaml,yml,json}, then the user config dir).
    #[arg(long, global = true, env = "TGRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Serve Prometheus metrics on this address, e.g. 127.0.0.1:9090.
    #[cfg(feature = "prometheus")]
    #[arg(long, global = true, env = "TGRELAY_METRICS_ADDR")]
    metrics_addr: Option<std::net::SocketAddr>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start relaying (default when no subcommand is provided).
    Run,
    /// Validate the configuration file and report errors/warnings.
    CheckConfig,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    match cli.command {
        None | Some(Commands::Run) => run(&cli).await,
        Some(Commands::CheckConfig) => config_commands::check(cli.config.as_deref()),
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "tgrelay starting");

    let (config, path) = tgrelay_config::discover_and_load(cli.config.as_deref())?;
    match path {
        Some(path) => info!(path = %path.display(), "loaded config"),
        None => info!("no config file found, using defaults and environment"),
    }

    let result = tgrelay_config::validate(&config);
    if !result.diagnostics.is_empty() {
        config_commands::print_diagnostics(&result);
    }
    if result.has_errors() {
        bail!("invalid configuration, run `tgrelay check-config` for details");
    }

    #[cfg(feature = "prometheus")]
    tgrelay_metrics::init_metrics(tgrelay_metrics::MetricsRecorderConfig {
        listen: cli.metrics_addr,
    })?;

    let bot = tgrelay_telegram::build_bot(&config.telegram)?;
    let outbound = Arc::new(TelegramOutbound::new(bot.clone()));
    let completion = Arc::new(AnthropicClient::new(&config.provider)?);
    let memory = Arc::new(InMemoryConversationMemory::new(config.memory.max_turns));
    let dispatcher = Arc::new(Dispatcher::new(&config, completion, outbound, memory));

    let mut polling =
        tgrelay_telegram::start_polling(bot, &config.telegram, Arc::clone(&dispatcher)).await?;
    info!(
        model = %config.provider.model,
        ordering = ?config.workers.ordering,
        max_concurrent = config.workers.max_concurrent,
        "tgrelay running, press Ctrl-C to stop"
    );

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            None
        },
        exit = &mut polling.task => Some(exit),
    };
    let exit = match finished {
        Some(exit) => exit.ok(),
        None => {
            info!("shutdown requested");
            polling.cancel.cancel();
            polling.task.await.ok()
        },
    };

    let grace = Duration::from_secs(config.workers.shutdown_grace_secs);
    if !dispatcher.shutdown(grace).await {
        warn!(grace_secs = grace.as_secs(), "abandoned in-flight messages at shutdown");
    }

    match exit {
        Some(PollExit::Conflict) => {
            bail!("another instance is already polling with this bot token")
        },
        Some(PollExit::Cancelled) => {
            info!("tgrelay stopped");
            Ok(())
        },
        None => bail!("telegram polling task panicked"),
    }
}
