use std::sync::atomic::Ordering;
use std::sync::Arc;

use apply_forms::applications::{
    ApplicationRouterState, ApplicationService, InMemoryEmailQueue, InMemoryPendingStore,
    InMemorySubmittedStore,
};
use apply_forms::config::AppConfig;
use apply_forms::error::AppError;
use apply_forms::expiry::{ExpiryScheduler, JwtTokenSigner, SchedulerRouterState};
use apply_forms::forms::definitions::registry;
use apply_forms::submission::SubmissionPipeline;
use apply_forms::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::{error, info};

use crate::cli::ServeArgs;
use crate::infra::{
    AppState, ConsoleEmailTransport, InMemoryFileStorage, LocalCrmClient, PassthroughScanner,
};
use crate::routes::with_service_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let registry = Arc::new(registry().map_err(|err| {
        error!(error = %err, "bundled form definitions failed to build");
        AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })?);

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let pending = Arc::new(InMemoryPendingStore::new());
    let submitted = Arc::new(InMemorySubmittedStore::new());
    let queue = Arc::new(InMemoryEmailQueue::new());
    let signer = Arc::new(JwtTokenSigner::new(&config.engine.unsubscribe_secret));

    let service = Arc::new(ApplicationService::new(
        pending.clone(),
        registry.clone(),
        config.engine.application_lifetime_days,
    ));
    let pipeline = Arc::new(SubmissionPipeline::new(
        pending.clone(),
        submitted,
        Arc::new(LocalCrmClient::default()),
        Arc::new(InMemoryFileStorage::default()),
        Arc::new(PassthroughScanner),
        registry,
        config.environment.label(),
    ));
    let base_url = format!("http://{}:{}", config.server.host, config.server.port);
    let scheduler = Arc::new(ExpiryScheduler::new(
        pending,
        queue.clone(),
        Arc::new(ConsoleEmailTransport),
        signer.clone(),
        config.engine.unsubscribe_ttl_days,
        &base_url,
    ));

    let app = with_service_routes(
        ApplicationRouterState { service, pipeline },
        SchedulerRouterState {
            scheduler,
            queue,
            signer,
            secret: config.engine.scheduler_secret.clone(),
        },
    )
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        environment = config.environment.label(),
        %addr,
        "grant application service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
