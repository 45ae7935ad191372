mod calculators;
mod collectors;
mod command;
mod config;
mod format;
mod http;
mod keep_awake;
mod metrics;
mod monitor;
mod network;
mod preferences;
mod scheduler;
mod state;

use axum::serve;
use clap::Parser;
use collectors::system::HostSource;
use config::Config;
use keep_awake::KeepAwake;
use metrics::Metrics;
use monitor::Monitor;
use network::interfaces::HostInterfaceSource;
use network::wifi::WifiToggler;
use network::NetworkSwitcher;
use preferences::PreferencesStore;
use scheduler::Scheduler;
use state::{now_unix, State};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "netspeed-monitor")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./config.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    #[arg(long, conflicts_with = "network_switch_off")]
    network_switch_on: bool,
    #[arg(long, conflicts_with = "network_switch_on")]
    network_switch_off: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            std::process::exit(1);
        }
    };
    if cli.network_switch_on {
        cfg.network_switch.enabled = true;
    } else if cli.network_switch_off {
        cfg.network_switch.enabled = false;
    }

    info!(
        listen = %cfg.listen,
        preferences = %cfg.preferences_path.display(),
        network_switch = cfg.network_switch.enabled,
        "запуск netspeed-monitor"
    );

    let prefs = Arc::new(PreferencesStore::load(&cfg.preferences_path));
    let shared_state = Arc::new(RwLock::new(State::new(now_unix())));
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "не удалось инициализировать метрики");
            std::process::exit(1);
        }
    };

    let keep_awake = Arc::new(KeepAwake::new(cfg.keep_awake.command.clone()));
    if cfg.keep_awake.enabled_on_start {
        match keep_awake.enable() {
            Ok(()) => shared_state.write().await.set_keep_awake(true),
            Err(err) => warn!(error = %err, "не удалось включить режим бодрствования при старте"),
        }
    }

    let monitor = Arc::new(Monitor::new(
        Box::new(HostSource::new(&cfg.sampling)),
        shared_state.clone(),
        metrics.clone(),
        prefs.clone(),
        keep_awake.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = {
        let listen = cfg.listen.clone();
        let app = http::build_router(
            metrics.clone(),
            shared_state.clone(),
            monitor.clone(),
            prefs.clone(),
        );
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let addr: SocketAddr = match listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %listen, "некорректный адрес listen");
                    return;
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "не удалось запустить HTTP-сервер");
                    return;
                }
            };

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "ошибка HTTP-сервера");
            }
        })
    };

    let mut sampler = Scheduler::new("sampler");
    {
        let monitor = monitor.clone();
        sampler.start(prefs.subscribe(), move || {
            let monitor = monitor.clone();
            async move {
                monitor.poll().await;
            }
        });
    }

    let mut network_scheduler = Scheduler::new("network_switch");
    if cfg.network_switch.enabled {
        let timeout = cfg.sampling.command_timeout();
        let switcher = Arc::new(NetworkSwitcher::new(
            Box::new(HostInterfaceSource::new(timeout)),
            WifiToggler::host(timeout),
        ));
        let state = shared_state.clone();
        let metrics = metrics.clone();
        network_scheduler.start(prefs.subscribe(), move || {
            run_network_check(switcher.clone(), state.clone(), metrics.clone())
        });
    } else {
        info!("автопереключение Wi-Fi отключено");
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "не удалось дождаться Ctrl+C");
    }
    info!("получен Ctrl+C, выполняется остановка");

    let _ = shutdown_tx.send(true);
    sampler.stop();
    network_scheduler.stop();
    keep_awake.cleanup();

    let _ = http_task.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_network_check(
    switcher: Arc<NetworkSwitcher>,
    state: Arc<RwLock<State>>,
    metrics: Arc<Metrics>,
) {
    let result = match tokio::task::spawn_blocking(move || switcher.check_and_switch()).await {
        Ok(Ok(check)) => {
            if let (Some(action), Some(outcome)) = (check.action, check.outcome.as_ref()) {
                metrics.record_wifi_switch(action, outcome);
            }
            Ok(check)
        }
        Ok(Err(err)) => {
            metrics.inc_collect_error("network_interfaces");
            warn!(error = %err, "не удалось получить список сетевых интерфейсов");
            Err(err.to_string())
        }
        Err(err) => {
            error!(error = %err, "задача проверки сети завершилась аварийно");
            Err(err.to_string())
        }
    };
    state.write().await.update_network(result);
}
