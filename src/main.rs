//! openwrt-gate binary entry point.

use std::process::ExitCode;
use std::sync::Arc;

use openwrt_gate::api::{create_router, serve, ApiKeyStore, AppState};
use openwrt_gate::cli::{self, Args};
use openwrt_gate::{logging, Config, Gateway, SshConnector};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Try 'openwrt-gate --help' for more information.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> openwrt_gate::Result<()> {
    let config = Config::load(&args)?;

    if let Err(e) = logging::init_with_filter(config.log_filter()) {
        eprintln!("warning: logging already initialized: {}", e);
    }

    let gateway = Arc::new(Gateway::from_config(&config, Arc::new(SshConnector))?);
    log_startup_summary(&config, &gateway);

    // Failure here is not fatal; the first command retries.
    if !gateway.connect().await {
        warn!("initial connection failed, will retry on first command");
    }

    let keys = Arc::new(ApiKeyStore::from_keys(config.server.api_keys.iter().cloned()));
    if !keys.is_enabled() {
        warn!("no API key configured, HTTP API is unauthenticated");
    }

    let router = create_router(AppState::new(Arc::clone(&gateway)), keys);
    let result = serve(&config.bind_address(), router, shutdown_signal()).await;

    info!("shutting down");
    gateway.shutdown().await;
    result
}

fn log_startup_summary(config: &Config, gateway: &Gateway) {
    let status = gateway.status();
    info!("openwrt-gate v{}", env!("CARGO_PKG_VERSION"));
    info!(endpoint = %status.endpoint, auth = status.auth_method, "router target");
    info!(
        validation = status.validation_enabled,
        deny_rules = status.deny_rules,
        allow_rules = status.allow_rules,
        "command policy"
    );
    match gateway.audit().path() {
        Some(path) => info!(file = %path.display(), "audit trail enabled"),
        None => warn!("audit trail disabled"),
    }
    if !status.validation_enabled {
        warn!("command validation is DISABLED; every command reaches the router");
    }
    info!(timeout_secs = config.ssh.command_timeout_secs, "command deadline");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT (ctrl-c)"),
        _ = terminate => info!("received SIGTERM"),
    }
}
