//! Cultural personalization engine - service entry point.
//!
//! Wires the filesystem catalog, the analytics pipeline and optional HTTP
//! geolocation into the engine, runs the background jobs, and answers
//! JSON-lines personalization requests on stdin until Ctrl-C.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cultural_personalization::adapters::{
    HttpGeoLocator, JsonLinesAnalyticsWriter, QueuedAnalyticsSink, YamlCatalog,
};
use cultural_personalization::application::{
    CulturalProfileRegistry, ExperimentManager, FeedbackLoop, PersonalizationEngine,
    PersonalizationRequest, PersonalizationResponse, SignalCollector,
};
use cultural_personalization::config::{AppConfig, LogFormat, RuntimeConfig};
use cultural_personalization::domain::emotion::EmotionAnalyzer;
use cultural_personalization::domain::foundation::Timestamp;
use cultural_personalization::ports::{AnalyticsWriter, GeoLocator};

fn init_tracing(runtime: &RuntimeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&runtime.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match runtime.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
    }
}

fn render(response: &PersonalizationResponse) -> serde_json::Value {
    let detection = &response.detection;
    json!({
        "session_id": response.session_id,
        "detection": {
            "country_code": detection.country_code,
            "confidence": detection.confidence,
            "method": detection.method,
            "profile_country": detection.profile.country_code,
            "profile_resolved": detection.profile_resolved,
            "rules": detection.rules.iter().map(|r| r.id.clone()).collect::<Vec<_>>(),
        },
        "emotion": response.emotion,
        "variants": response
            .assignments
            .iter()
            .map(|a| json!({ "experiment_id": a.experiment_id, "variant": a.variant.name }))
            .collect::<Vec<_>>(),
        "plan": response.plan,
    })
}

/// Serves one JSON request per stdin line, writing one JSON response per
/// stdout line, until stdin closes or shutdown is signalled.
async fn serve_stdin(engine: Arc<PersonalizationEngine>, mut shutdown: watch::Receiver<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
                continue;
            }
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => {
                tracing::info!("Request input closed");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request input");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<PersonalizationRequest>(&line) {
            Ok(request) => {
                let response = engine.personalize(&request).await;
                println!("{}", render(&response));
            }
            Err(e) => tracing::warn!(error = %e, "Malformed personalization request"),
        }
    }
}

fn main() -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let code = runtime.block_on(run());
    // Blocking stdin reads cannot be cancelled; do not wait on them.
    runtime.shutdown_timeout(Duration::from_secs(5));
    code
}

async fn run() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.runtime);

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        return ExitCode::FAILURE;
    }
    let registry_settings = match config.registry.to_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Invalid registry configuration");
            return ExitCode::FAILURE;
        }
    };

    let geo: Option<Arc<dyn GeoLocator>> = match &config.detection.geo_endpoint {
        Some(endpoint) => match HttpGeoLocator::new(endpoint.clone(), config.detection.geo_timeout()) {
            Ok(locator) => Some(Arc::new(locator)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to build geolocation client");
                return ExitCode::FAILURE;
            }
        },
        None => {
            tracing::info!("No geolocation endpoint configured, ip signals disabled");
            None
        }
    };

    let catalog = Arc::new(YamlCatalog::new(&config.registry.data_dir));
    let registry = Arc::new(CulturalProfileRegistry::new(catalog.clone(), registry_settings));
    let experiments = Arc::new(
        ExperimentManager::new(catalog).with_enrollment_limits(
            config.detection.cache_ttl(),
            config.analytics.max_enrollments,
        ),
    );
    let feedback = Arc::new(FeedbackLoop::new(
        registry.clone(),
        experiments.clone(),
        config.analytics.feedback_settings(),
    ));

    let writers: Vec<Arc<dyn AnalyticsWriter>> = vec![
        Arc::new(JsonLinesAnalyticsWriter::new(&config.registry.data_dir)),
        feedback.clone() as Arc<dyn AnalyticsWriter>,
    ];
    let (sink, worker) = QueuedAnalyticsSink::new(config.analytics.sink_config(), writers);

    // Boot with whatever the catalog holds; a failure leaves the generic
    // fallback profile in place until the next refresh.
    registry.refresh_or_keep().await;
    if let Err(e) = experiments.load().await {
        tracing::warn!(error = %e, "Failed to load experiments, starting with none");
    }

    let engine = Arc::new(PersonalizationEngine::new(
        registry.clone(),
        experiments,
        SignalCollector::new(geo, config.detection.geo_timeout()),
        EmotionAnalyzer::new(config.emotion.to_settings()),
        Arc::new(sink),
        config.engine_settings(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = Vec::new();
    {
        let registry = registry.clone();
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { registry.run(rx).await }));
    }
    {
        let feedback = feedback.clone();
        let rx = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move { feedback.run(rx).await }));
    }
    tasks.push(tokio::spawn(worker.run(shutdown_rx.clone())));
    {
        let engine = engine.clone();
        let mut rx = shutdown_rx.clone();
        let period = config.detection.cache_ttl().max(Duration::from_secs(60));
        tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = rx.changed() => {
                        if *rx.borrow() {
                            return;
                        }
                    }
                    _ = interval.tick() => {
                        let now = Timestamp::now();
                        let purged = engine.cache().purge_expired(now);
                        let enrollments = engine.experiments().purge_expired_enrollments(now);
                        if purged > 0 || enrollments > 0 {
                            tracing::debug!(purged, enrollments, "Expired session state purged");
                        }
                    }
                }
            }
        }));
    }

    let serving = tokio::spawn(serve_stdin(engine.clone(), shutdown_rx.clone()));

    tracing::info!(
        environment = ?config.runtime.environment,
        data_dir = %config.registry.data_dir.display(),
        profiles = registry.snapshot().profile_count(),
        rules = registry.snapshot().rules().len(),
        "Cultural personalization engine running"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
    let _ = shutdown_tx.send(true);
    serving.abort();

    for result in futures::future::join_all(tasks).await {
        if let Err(e) = result {
            tracing::warn!(error = %e, "Background task ended abnormally");
        }
    }
    // Final aggregation over whatever the worker flushed.
    feedback.aggregate_once(Timestamp::now()).await;
    ExitCode::SUCCESS
}
