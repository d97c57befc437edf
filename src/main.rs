//! parley-bot: entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Resolve effective log level (CLI `-v` flags > RUST_LOG > env > config)
//!   4. Init logger once
//!   5. Load prompts, build the completion provider and session registry
//!   6. Spawn Ctrl-C → shutdown signal watcher
//!   7. Run comms subsystem until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use parley_bot::config;
use parley_bot::error::AppError;
use parley_bot::llm::providers;
use parley_bot::logger;
use parley_bot::subsystems::chat::{ChatCore, PromptSet, SessionRegistry};
use parley_bot::subsystems::comms;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present: ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();

    let config = config::load(args.config_path.as_deref())?;

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    let force_cli_level = args.log_level.is_some();
    logger::init(effective_log_level, force_cli_level)?;

    info!(
        bot_name = %config.bot_name,
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        provider = %config.llm.provider,
        chat_model = %config.chat.models.chat,
        ask_model = %config.chat.models.ask,
        summary_model = %config.chat.models.summary,
        "config loaded"
    );

    let prompts = PromptSet::load(&config.chat.prompts_dir, &config.bot_name)?;

    let provider = providers::build(&config.llm, config.llm_api_key.clone())
        .map_err(|e| AppError::Config(e.to_string()))?;

    // The dummy provider needs no key; every other provider does.
    let credential_configured = config.llm_api_key.is_some() || config.llm.provider == "dummy";
    if !credential_configured {
        warn!("OPENAI_API_KEY not set, chat commands will report an error");
    }

    let core = Arc::new(ChatCore::new(
        provider,
        prompts,
        config.chat.models.clone(),
        credential_configured,
    ));
    let registry = Arc::new(SessionRegistry::new(core, config.chat.auto_reply_window));

    // Shared shutdown token: Ctrl-C cancels it, all tasks watch it.
    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    let comms = comms::start(&config, registry, shutdown.clone());
    comms.join().await?;

    // Channels may exit on their own (e.g. missing token); stop everything.
    shutdown.cancel();
    info!("shutdown complete");

    Ok(())
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut verbosity = 0u8;
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: parley-bot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    CliArgs { log_level, config_path }
}
