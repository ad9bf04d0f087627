use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryMerchantBackend};
use crate::routes::with_console_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use merchant_onboarding::backend::{MerchantApiClient, MerchantBackend};
use merchant_onboarding::config::AppConfig;
use merchant_onboarding::error::AppError;
use merchant_onboarding::onboarding::{JsonFileDraftStore, OnboardingService};
use merchant_onboarding::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    if args.offline {
        info!("serving against the in-memory merchant api");
        serve(Arc::new(InMemoryMerchantBackend::default()), config).await
    } else {
        let client = MerchantApiClient::new(&config.backend)?;
        info!(backend = client.base_url(), "serving against the merchant api");
        serve(Arc::new(client), config).await
    }
}

async fn serve<B>(backend: Arc<B>, config: AppConfig) -> Result<(), AppError>
where
    B: MerchantBackend + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let drafts = Arc::new(JsonFileDraftStore::new(&config.drafts.directory)?);
    let service = Arc::new(OnboardingService::new(
        backend,
        drafts,
        config.uploads.max_bytes,
    ));

    let app = with_console_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        drafts = %config.drafts.directory.display(),
        "merchant console ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
