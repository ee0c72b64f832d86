mod config;
mod metrics;
mod model;
mod prober;
mod routes;
mod service;
mod store;
mod timestamp;
mod util;
mod validator;

use config::{LogFormat, ServiceConfig, StoreBackend};
use prober::http::HttpProber;
use service::CheckService;
use store::{dynamo::DynamoStore, memory::MemoryStore, HistoryStore};
use util::SystemResolver;
use validator::UrlValidator;

use std::sync::Arc;
use tracing::info;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    // Load config first to get log level
    let config = ServiceConfig::load().await?;
    let log_level = config.get_tracing_level()?;

    println!("Starting website_status_checker");

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("website_status_checker={}", log_level.as_str().to_lowercase()).parse()?);
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    // One store handle for the whole process, handed to the service below.
    let store: Arc<dyn HistoryStore> = match config.store_backend {
        StoreBackend::Dynamodb => Arc::new(DynamoStore::connect(&config.table_name, config.store_timeout()).await),
        StoreBackend::Memory => {
            info!("Using in-memory history store; results are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let prober = HttpProber::new(config.pin_resolved_addresses, config.guard_redirects)?;
    info!(
        "Probe settings: pin_resolved_addresses={} guard_redirects={}",
        config.pin_resolved_addresses, config.guard_redirects
    );

    let service = Arc::new(CheckService::new(
        UrlValidator::new(Arc::new(SystemResolver)),
        Arc::new(prober),
        store,
    ));

    routes::serve(service, config.listen_addr).await;

    Ok(())
}
