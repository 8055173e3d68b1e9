use crate::cli::ServeArgs;
use crate::routes::{with_report_routes, AppState};
use axum::{Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use facility_desk::config::{AppConfig, SideEffectMode};
use facility_desk::error::AppError;
use facility_desk::telemetry;
use facility_desk::workflows::reports::{
    BroadcastHub, DeferredEffects, EffectRunner, InMemoryRecordStore, InlineEffects,
    LocalFileStore, NotificationDispatcher, ReportService,
};
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

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryRecordStore::new());
    let files = Arc::new(LocalFileStore::new(config.storage.upload_dir.clone()));
    let upload_root = files.root().to_path_buf();
    let hub = BroadcastHub::new(config.events.broadcast_capacity);
    let publisher = Arc::new(hub.clone());

    let routes: Router = match config.events.side_effects {
        SideEffectMode::Inline => {
            let effects = Arc::new(InlineEffects::new(store.clone(), publisher));
            with_report_routes(Arc::new(ReportService::new(store, files, effects)), hub)
        }
        SideEffectMode::Deferred => {
            let runner = EffectRunner::new(NotificationDispatcher::new(store.clone()), publisher);
            let (effects, _worker) =
                DeferredEffects::spawn(runner, config.events.effect_queue_capacity);
            let effects = Arc::new(effects);
            with_report_routes(Arc::new(ReportService::new(store, files, effects)), hub)
        }
    };

    let app = routes
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        upload_dir = %upload_root.display(),
        side_effects = ?config.events.side_effects,
        "facility desk ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
