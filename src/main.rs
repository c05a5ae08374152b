mod assembler;
mod assets;
mod collectors;
mod config;
mod http;
mod metrics;
mod session;
mod snapshot;
mod units;

use clap::Parser;
use collectors::system::SysinfoProbe;
use collectors::SystemProbe;
use config::Config;
use http::{AppState, ProbeFactory, Server};
use metrics::Metrics;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sysfeed")]
#[command(version)]
struct Cli {
    /// YAML config; built-in defaults are used when omitted.
    #[arg(long)]
    config: Option<String>,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long)]
    listen: Option<String>,
    #[arg(long)]
    no_processes: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match &cli.config {
        Some(path) => match Config::load_from_file(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                error!(error = %err, "не удалось загрузить конфигурацию");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(listen) = cli.listen {
        cfg.listen = listen;
    }
    if cli.no_processes {
        cfg.processes = false;
    }
    if let Err(err) = cfg.validate() {
        error!(error = %err, "некорректная конфигурация");
        std::process::exit(1);
    }

    info!(
        listen = %cfg.listen,
        ui_dir = %cfg.ui_dir.display(),
        disk_mount = %cfg.disk_mount.display(),
        processes = cfg.processes,
        interval = %humantime::format_duration(session::TICK_INTERVAL),
        "запуск sysfeed"
    );

    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "не удалось инициализировать метрики");
            std::process::exit(1);
        }
    };

    let probe_factory: ProbeFactory =
        Arc::new(|| Box::new(SysinfoProbe::new()) as Box<dyn SystemProbe + Send>);
    let state = AppState::new(cfg, metrics, probe_factory);

    let server = match Server::bind(state).await {
        Ok(server) => server,
        Err(err) => {
            error!(error = %err, "не удалось запустить HTTP-сервер");
            std::process::exit(1);
        }
    };
    println!("Link: http://{}", server.local_addr());

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "не удалось дождаться Ctrl+C");
        }
        info!("получен Ctrl+C, выполняется остановка");
    };

    if let Err(err) = server.run(shutdown).await {
        error!(error = %err, "ошибка HTTP-сервера");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
