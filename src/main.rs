mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::Config;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::{database, middleware};
use crate::features::admin::{routes as admin_routes, ModerationService};
use crate::features::auth::routes as auth_routes;
use crate::features::auth::{AuthService, TokenService};
use crate::features::categories::{routes as categories_routes, CategoryService};
use crate::features::images::dtos::UPLOADS_URL_PREFIX;
use crate::features::images::{routes as images_routes, ImageStore, IngestionService, QueryService};
use crate::modules::imaging::{CwebpEncoder, Encoder, ImageConverter};
use crate::modules::storage::UploadStorage;
use axum::{middleware::from_fn_with_state, Router};
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "System info: tokio_worker_threads={}, pid={}",
        worker_threads,
        std::process::id()
    );
    tracing::info!("Configuration loaded successfully");

    let pool = database::create_pool(&config.database).await?;
    tracing::info!("Database connection pool created");

    tracing::info!("Running database migrations...");
    database::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
    tracing::info!("Database migrations completed successfully");

    // Upload directory and encoder
    let storage = Arc::new(UploadStorage::new(config.storage.upload_dir.clone()));
    storage
        .ensure_dir()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create upload directory: {}", e))?;
    tokio::fs::create_dir_all(&config.storage.scratch_dir)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create scratch directory: {}", e))?;

    let encoder: Arc<dyn Encoder> = Arc::new(CwebpEncoder::new(
        config.storage.cwebp_path.clone(),
        config.storage.cwebp_fallback_path.clone(),
        config.storage.webp_quality,
    ));
    let converter = Arc::new(ImageConverter::new(
        Arc::clone(&storage),
        config.storage.scratch_dir.clone(),
        encoder,
        config.storage.encoder_timeout,
    ));
    tracing::info!(
        "Image converter initialized (encoder: {}, fallback: {}, quality: {})",
        config.storage.cwebp_path.display(),
        config.storage.cwebp_fallback_path.display(),
        config.storage.webp_quality
    );

    // Auth
    let token_service = Arc::new(TokenService::new(
        &config.auth.jwt_secret,
        config.auth.token_ttl,
    ));
    let auth_service = Arc::new(AuthService::new(
        pool.clone(),
        Arc::clone(&token_service),
        config.auth.admin_password.clone(),
    ));
    tracing::info!("Auth service initialized");

    let image_store = Arc::new(ImageStore::new(pool.clone()));
    let category_service = Arc::new(CategoryService::new(
        pool.clone(),
        Arc::clone(&image_store),
    ));
    tracing::info!("Category service initialized");

    let ingestion_service = Arc::new(IngestionService::new(
        Arc::clone(&image_store),
        Arc::clone(&category_service),
        Arc::clone(&converter),
        Arc::clone(&storage),
        config.storage.max_file_size,
    ));
    let query_service = Arc::new(QueryService::new(
        Arc::clone(&image_store),
        Arc::clone(&category_service),
    ));
    tracing::info!("Image services initialized");

    let moderation_service = Arc::new(ModerationService::new(
        Arc::clone(&image_store),
        Arc::clone(&category_service),
        Arc::clone(&storage),
    ));
    tracing::info!("Moderation service initialized");

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn_with_state(
                Arc::new(credentials),
                middleware::basic_auth_middleware,
            ))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Protected routes (require a bearer token)
    let protected_routes = Router::new()
        .merge(auth_routes::protected_routes(Arc::clone(&auth_service)))
        .merge(images_routes::upload_routes(
            ingestion_service,
            config.app.max_request_body_size,
        ))
        .merge(categories_routes::admin_routes(Arc::clone(&category_service)))
        .merge(admin_routes::routes(
            Arc::clone(&query_service),
            moderation_service,
        ))
        .route_layer(from_fn_with_state(
            Arc::clone(&token_service),
            middleware::auth_middleware,
        ));

    // Simple health check endpoint (no auth required)
    async fn health_check() -> axum::http::StatusCode {
        axum::http::StatusCode::OK
    }
    let health_route = Router::new().route("/health", axum::routing::get(health_check));

    // Public routes (no auth required)
    let public_routes = Router::new()
        .merge(auth_routes::public_routes(auth_service))
        .merge(images_routes::routes(query_service))
        .merge(categories_routes::routes(category_service))
        .nest_service(UPLOADS_URL_PREFIX, ServeDir::new(storage.root()));

    let app = Router::new()
        .merge(swagger)
        .merge(protected_routes)
        .merge(public_routes)
        .merge(health_route)
        .layer(middleware::cors_layer(
            config.app.cors_allowed_origins.clone(),
        ))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    // Start server
    let addr = config.app.server_address();
    let socket_addr: std::net::SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(1024)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Uploads served from {} at {}", storage.root().display(), UPLOADS_URL_PREFIX);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
