use rotating_bloom_rs::common::{bits2hr, bytes2hr};
use rotating_bloom_rs::rpc::{AppState, FilterRegistry, ServerConfig};
use rotating_bloom_rs::{BloomParams, rpc::create_router};
use std::path::Path;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // load configuration from environment variables
    let config = ServerConfig::from_env()?;
    let filter_config = config.rotating_config()?;

    let scope = CancellationToken::new();
    let registry = FilterRegistry::new(scope.clone());
    registry.init(filter_config.clone())?;

    if let Some(path) = &config.bloom_snapshot_path {
        restore_snapshot(&registry, path).await;
    }

    let state = Arc::new(AppState {
        registry: registry.clone(),
    });

    // Create router with logging middleware
    let app = create_router(state).layer(
        tower_http::trace::TraceLayer::new_for_http()
            .make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            })
            .on_response(
                |response: &axum::http::Response<_>,
                 latency: std::time::Duration,
                 _span: &tracing::Span| {
                    tracing::info!(
                        status = %response.status(),
                        latency = ?latency,
                        "response generated"
                    );
                },
            ),
    );

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let params = BloomParams::from(&filter_config.bloom);
    info!(
        r#"
    🦀 Rotating Bloom Filter Server Starting! 🚀

         ,~~.
        (  6 )-_,
         (\_/)\  )\  /     < Seen it recently? Let me check. >
          \  |  ) |
          ^^ ^^   ^^

    📊 Filter Configuration:
       • Capacity: {:>16} items
       • False Positive Rate: {:>8.6}%
       • Hash Strategy: {:>13}
       • Bits / Hashes: {:>8} / {}
       • Rotation TTL: {:>14?}
       • Memory (3 gens): {:>11}

    🌐 Server Information:
       • Listening on:  http://{}
       • Swagger UI:    http://{}/swagger-ui/
       • Health Check:  http://{}/health

    🎯 API Endpoints:
       • POST   /add        - Add elements
       • POST   /check      - Check elements
       • POST   /union      - Merge a serialized filter
       • GET    /snapshot   - Download a snapshot
       • GET    /info       - Filter info

    🔧 Performance Mode: {}
    "#,
        filter_config.bloom.capacity,
        filter_config.bloom.false_positive_rate * 100.0,
        filter_config.bloom.hash_strategy.name(),
        params.bit_vector_size,
        params.num_hashes,
        filter_config.ttl,
        bits2hr(params.bit_vector_size * 3),
        addr,
        addr,
        addr,
        if cfg!(debug_assertions) {
            "DEBUG"
        } else {
            "RELEASE"
        }
    );

    tokio::spawn(shutdown_on_signal(scope.clone()));
    tokio::spawn(log_snapshot_size(
        registry.clone(),
        scope.clone(),
        config.size_log_interval,
    ));

    info!("Starting server on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(scope.clone().cancelled_owned())
        .await?;

    if let Some(path) = &config.bloom_snapshot_path {
        save_snapshot(&registry, path).await;
    }
    registry.close();
    info!("Server stopped");
    Ok(())
}

async fn restore_snapshot(registry: &FilterRegistry, path: &Path) {
    match tokio::fs::read(path).await {
        Ok(bytes) => match registry.restore(&bytes) {
            Ok(()) => info!(path = %path.display(), "Restored snapshot"),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Ignoring unusable snapshot"
            ),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No snapshot yet, starting empty");
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read snapshot")
        }
    }
}

async fn save_snapshot(registry: &FilterRegistry, path: &Path) {
    let bytes = match registry.snapshot() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Failed to snapshot filter");
            return;
        }
    };
    match tokio::fs::write(path, &bytes).await {
        Ok(()) => info!(
            path = %path.display(),
            size = %bytes2hr(bytes.len()),
            "Saved snapshot"
        ),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to save snapshot")
        }
    }
}

async fn log_snapshot_size(
    registry: FilterRegistry,
    scope: CancellationToken,
    period: std::time::Duration,
) {
    if period.is_zero() {
        return;
    }
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = scope.cancelled() => break,
            _ = ticker.tick() => {}
        }
        match registry.snapshot() {
            Ok(bytes) => info!(
                "Current size of the marshalled filter: {}",
                bytes2hr(bytes.len())
            ),
            Err(e) => warn!(error = %e, "Failed to measure filter size"),
        }
    }
}

async fn shutdown_on_signal(scope: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Signal intercepted: ctrl-c"),
        _ = terminate => info!("Signal intercepted: SIGTERM"),
    }
    scope.cancel();
}
