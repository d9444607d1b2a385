use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::MatchedPath;
use dotenvy::dotenv;
use http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use docvault::application::access::{AccessChecker, DocumentAccessPolicy};
use docvault::application::ports::cache_port::CacheClient;
use docvault::application::ports::document_repository::{DocumentReader, DocumentWriter};
use docvault::application::ports::session_port::SessionResolver;
use docvault::application::ports::user_repository::{SessionRepository, UserRepository};
use docvault::application::services::documents::{DocumentService, DocumentServiceSettings};
use docvault::bootstrap::app_context::{AppContext, AppServices};
use docvault::bootstrap::config::Config;
use docvault::infrastructure::cache::{MemoryCache, RedisCache};
use docvault::infrastructure::db::repositories::document_repository_sqlx::SqlxDocumentRepository;
use docvault::infrastructure::db::repositories::session_repository_sqlx::SqlxSessionRepository;
use docvault::infrastructure::db::repositories::user_repository_sqlx::SqlxUserRepository;
use docvault::presentation::http::health::HealthState;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
        paths(
            docvault::presentation::http::auth::register,
            docvault::presentation::http::auth::authenticate,
            docvault::presentation::http::auth::logout,
            docvault::presentation::http::documents::upload_document,
            docvault::presentation::http::documents::list_documents,
            docvault::presentation::http::documents::get_document,
            docvault::presentation::http::documents::delete_document,
            docvault::presentation::http::health::health,
        ),
        components(schemas(
            docvault::presentation::http::auth::RegisterRequest,
            docvault::presentation::http::auth::RegisterResponse,
            docvault::presentation::http::auth::AuthRequest,
            docvault::presentation::http::auth::AuthResponse,
            docvault::presentation::http::documents::Document,
            docvault::presentation::http::documents::DocumentListResponse,
            docvault::presentation::http::documents::DocumentMeta,
            docvault::presentation::http::documents::UploadDocumentMultipart,
            docvault::presentation::http::envelope::ErrorInfo,
            docvault::presentation::http::envelope::ErrorResponse,
            docvault::presentation::http::health::HealthResp,
        )),
        tags(
            (name = "Auth", description = "Registration and sessions"),
            (name = "Documents", description = "Documents with owner, public and granted access"),
            (name = "Health", description = "System health checks")
        )
    )]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "docvault=debug,axum=info,tower_http=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;
    info!(port = cfg.api_port, production = cfg.is_production, "Starting docvault");

    // Database
    let pool =
        docvault::infrastructure::db::connect_pool(&cfg.database_url, cfg.db_max_connections)
            .await?;
    docvault::infrastructure::db::migrate(&pool).await?;

    // Cache
    let cache: Arc<dyn CacheClient> = match cfg.redis_url.as_deref() {
        Some(url) => {
            tracing::info!("redis_cache_enabled");
            Arc::new(RedisCache::connect(url).await?)
        }
        None => {
            tracing::info!("redis_url_unset_using_memory_cache");
            Arc::new(MemoryCache::new())
        }
    };

    let document_repo = Arc::new(SqlxDocumentRepository::new(pool.clone()));
    let session_repo = Arc::new(SqlxSessionRepository::new(pool.clone()));
    let user_repo: Arc<dyn UserRepository> = Arc::new(SqlxUserRepository::new(pool.clone()));

    let reader: Arc<dyn DocumentReader> = document_repo.clone();
    let writer: Arc<dyn DocumentWriter> = document_repo;
    let access: Arc<dyn AccessChecker> = Arc::new(DocumentAccessPolicy);
    let resolver: Arc<dyn SessionResolver> = session_repo.clone();
    let sessions: Arc<dyn SessionRepository> = session_repo;

    let documents = DocumentService::new(
        reader,
        writer,
        access,
        resolver,
        cache.clone(),
        DocumentServiceSettings {
            list_ttl: cfg.list_cache_ttl,
            document_ttl: cfg.doc_cache_ttl,
            store_timeout: cfg.store_timeout,
            cache_timeout: cfg.cache_timeout,
        },
    );

    let services = AppServices::new(documents, user_repo, sessions);
    let ctx = AppContext::new(cfg.clone(), services);

    // Build CORS
    let methods = [
        http::Method::GET,
        http::Method::HEAD,
        http::Method::POST,
        http::Method::DELETE,
        http::Method::OPTIONS,
    ];
    let headers = [http::header::CONTENT_TYPE, http::header::AUTHORIZATION];
    let cors = match cfg.frontend_url.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true),
        _ if cfg.is_production => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(HeaderValue::from_static(
                "http://invalid",
            )))
            .allow_methods(methods)
            .allow_headers(headers),
        // Development convenience
        _ => CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true),
    };

    // Build API router
    let app = Router::new()
        .nest(
            "/api",
            docvault::presentation::http::health::routes(HealthState {
                pool: pool.clone(),
                cache,
            }),
        )
        .nest("/api", docvault::presentation::http::auth::routes(ctx.clone()))
        .nest(
            "/api",
            docvault::presentation::http::documents::routes(ctx.clone()),
        )
        .merge(SwaggerUi::new("/api/docs-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        // Global body size limit for uploads (configurable)
        .layer(DefaultBodyLimit::max(cfg.upload_max_bytes))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                let matched = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                tracing::info_span!("http", %method, %uri, matched_path = %matched)
            }),
        );

    let api_addr = SocketAddr::from(([0, 0, 0, 0], cfg.api_port));
    info!(%api_addr, "HTTP API listening");
    let listener = tokio::net::TcpListener::bind(api_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("docvault stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "shutdown_signal_failed");
        std::future::pending::<()>().await;
    }
    info!("shutdown_signal_received");
}
