use crate::{
    auth::SignedTokenResolver,
    config::{AllowedOrigins, Config},
    ctx::Ctx,
    db::SurrealCaptionRepository,
    routes::{get_localhost_routes, get_routes},
    session::{MemorySessionStore, SessionKey},
    workflow::UploadCoordinator,
};
use ai::caption::CaptionGenerator;
use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use dotenvy::dotenv;
use std::sync::Arc;
use storage::Storage;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Wire every collaborator from `config` into a handler context.
pub async fn build_ctx(config: &Config) -> anyhow::Result<Ctx> {
    let generator = Arc::new(CaptionGenerator::new(config.caption.clone())?);
    {
        // models load in the background, requests before that wait on the same load
        let generator = Arc::clone(&generator);
        tokio::spawn(async move { generator.preload().await });
    }

    let storage: Arc<dyn Storage> = Arc::from(config.storage.build()?);
    let repository = Arc::new(SurrealCaptionRepository::new(config.database_path.as_deref()).await?);
    let sessions = Arc::new(MemorySessionStore::new());

    let coordinator = Arc::new(UploadCoordinator::new(
        generator,
        storage,
        repository.clone(),
        sessions,
        config.upstream_timeout,
    ));

    Ok(Ctx::new(
        coordinator,
        repository,
        Arc::new(SignedTokenResolver::new(&config.session_secret)),
        Arc::new(SessionKey::new(&config.session_secret)),
    ))
}

fn cors_layer(origins: &AllowedOrigins) -> CorsLayer {
    match origins {
        AllowedOrigins::Any => CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any),
        AllowedOrigins::List(origins) => {
            let origins = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(v) => Some(v),
                    Err(e) => {
                        tracing::warn!("ignoring invalid CORS origin {:?}: {}", origin, e);
                        None
                    }
                })
                .collect::<Vec<_>>();
            // credentials cannot be combined with wildcards
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(AllowOrigin::list(origins))
                .allow_credentials(true)
        }
    }
}

pub async fn start_server() -> anyhow::Result<()> {
    match dotenv() {
        Ok(path) => println!(".env read successfully from {}", path.display()),
        Err(e) => println!("Could not load .env file: {e}"),
    };

    let config = Config::from_env()?;

    match &config.log_dir {
        Some(log_dir) => analytics_tracing::init_tracing_to_file(log_dir.clone()),
        None => analytics_tracing::init_tracing_to_stdout(),
    }

    let ctx = build_ctx(&config).await?;

    let mut app: axum::Router = get_routes(ctx);
    if let Some(images_dir) = config.served_images_dir() {
        std::fs::create_dir_all(images_dir)?;
        app = app.merge(get_localhost_routes(images_dir));
    }
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_allowed_origins));

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!("Listening on http://{}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl-C received, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, shutting down...");
        },
    }
}
