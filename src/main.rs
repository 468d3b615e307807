//! Haven Booking Server
//!
//! Backend for the availability & reservation engine: quoting, conflict-free
//! reservation creation, M-Pesa payment reconciliation, and request
//! throttling.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use haven_api::{configure_payments, configure_reservations, Checker, Manager, RateLimiters, Worker};
use haven_cache::{RedisCache, RedisCounterStore};
use haven_core::traits::CounterStore;
use haven_core::AppConfig;
use haven_db::{
    create_pool, run_migrations, PgPaymentRepository, PgReservationRepository, PgUnitDirectory,
};
use haven_mpesa::{MpesaClient, ReconciliationWorker};
use haven_services::{
    AvailabilityChecker, CachedUnitDirectory, MemoryCounterStore, ReservationManager,
};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "haven-booking",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Configure API routes
fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            // Health check
            .route("/health", web::get().to(health_check))
            // Quote, availability, and reservation lifecycle
            .configure(configure_reservations)
            // Push-payment initiation, polling, and callback
            .configure(configure_payments),
    );
}

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "haven_booking={},haven_api={},haven_services={},haven_mpesa={},haven_db={},actix_web=info,sqlx=warn",
            log_level, log_level, log_level, log_level, log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    init_tracing();

    info!("Starting Haven Booking v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().expect("Failed to load configuration");

    info!("Connecting to database...");
    let pool = create_pool(&config.database.url, Some(config.database.max_connections))
        .await
        .expect("Failed to create database pool");

    run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // Redis backs both the unit cache and the shared rate-limit counters;
    // without it the engine degrades to database reads and per-instance
    // limits rather than refusing to start.
    let redis_cache = match RedisCache::new(&config.redis.url).await {
        Ok(cache) => {
            info!("Redis connected: unit cache and shared rate-limit counters active");
            Some(cache)
        }
        Err(e) => {
            warn!(
                "Redis unavailable ({}); unit cache off, rate limits enforced per instance only",
                e
            );
            None
        }
    };

    let counter_store: Arc<dyn CounterStore> = match &redis_cache {
        Some(cache) => Arc::new(RedisCounterStore::new(cache)),
        None => Arc::new(MemoryCounterStore::new()),
    };
    let limiters = Arc::new(RateLimiters::from_config(&config.rate_limit, counter_store));

    // Repositories
    let unit_dir = Arc::new(CachedUnitDirectory::new(
        Arc::new(PgUnitDirectory::new(pool.clone())),
        redis_cache,
    ));
    let reservation_repo = Arc::new(PgReservationRepository::new(pool.clone()));
    let payment_repo = Arc::new(PgPaymentRepository::new(pool.clone()));

    // Services
    let checker: Arc<Checker> = Arc::new(AvailabilityChecker::new(
        unit_dir.clone(),
        reservation_repo.clone(),
    ));
    let manager: Arc<Manager> = Arc::new(ReservationManager::new(
        unit_dir,
        reservation_repo,
        pool.clone(),
        &config.booking,
    ));

    // Payment gateway and reconciliation
    let gateway = Arc::new(
        MpesaClient::new(config.mpesa.clone()).expect("Failed to build gateway client"),
    );
    let worker: Arc<Worker> = Arc::new(ReconciliationWorker::from_config(
        gateway,
        manager.clone(),
        payment_repo,
        &config.mpesa,
    ));

    // Periodic TTL sweep: reclaims provisional holds whose checkout was
    // abandoned, complementing the lazy sweep on the read paths
    let sweep_manager = manager.clone();
    let sweep_interval = Duration::from_secs(config.booking.sweep_interval_secs.max(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            match sweep_manager.expire_stale_provisionals().await {
                Ok(swept) if swept > 0 => {
                    info!("TTL sweep cancelled {} stale provisional holds", swept)
                }
                Ok(_) => {}
                Err(e) => error!("TTL sweep failed: {}", e),
            }
        }
    });

    // CORS configuration
    let cors_origins = env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    let bind_addr = config.server_addr();
    let workers = config.server.workers;
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, workers
    );

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origins: Vec<&str> = cors_origins_inner.split(',').collect();
                if let Ok(origin_str) = origin.to_str() {
                    origins.iter().any(|o| o.trim() == origin_str)
                } else {
                    false
                }
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                header::AUTHORIZATION,
                header::ACCEPT,
                header::CONTENT_TYPE,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            // Shared services
            .app_data(web::Data::from(checker.clone()))
            .app_data(web::Data::from(manager.clone()))
            .app_data(web::Data::from(worker.clone()))
            .app_data(web::Data::from(limiters.clone()))
            .app_data(web::QueryConfig::default().error_handler(|err, _req| {
                let error_message = err.to_string();
                actix_web::error::InternalError::from_response(
                    err,
                    HttpResponse::BadRequest().json(serde_json::json!({
                        "error": "invalid_query",
                        "message": error_message
                    })),
                )
                .into()
            }))
            // Middleware
            .wrap(cors)
            .wrap(middleware::Logger::new("%a \"%r\" %s %b %Dms"))
            .wrap(middleware::Compress::default())
            .wrap(middleware::NormalizePath::trim())
            // Configure routes
            .configure(configure_routes)
            // Root redirect to health
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await
}
