use tracing_subscriber::EnvFilter;
use vela_api::service::ApiService;
use vela_common::{LoggingConfig, RelayConfig};

fn init_logging(config: &RelayConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match &config.logging {
        LoggingConfig::Console => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
        LoggingConfig::File { dir_path, file_name } => {
            let appender = tracing_appender::rolling::daily(dir_path, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
            Some(guard)
        }
    }
}

#[tokio::main]
async fn main() {
    let config = match RelayConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config: {err}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&config);

    if let Err(err) = ApiService::run(config).await {
        tracing::error!(%err, "relay exited with error");
        std::process::exit(1);
    }
}
