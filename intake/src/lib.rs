//! # intake: survey intake backend
//!
//! `intake` backs a public survey form. It serves the postcode reference table the form uses for
//! address autocompletion, checks a candidate registration against the ones already stored, and
//! stores new registrations under a sequential `ATG` + 8-digit survey ID together with any
//! receipt images uploaded with them.
//!
//! ## Architecture
//!
//! The HTTP layer is [Axum](https://github.com/tokio-rs/axum); persistence is PostgreSQL via
//! `sqlx`, and receipt images go to an S3-compatible bucket or a local directory.
//!
//! Every survey operation goes through a single endpoint, `/`, selected by the `action` query
//! parameter (see [`api`]). Handlers reach storage through the [`db::store::PostcodeSource`],
//! [`db::store::SurveyStore`] and [`storage::ObjectStore`] traits held in [`AppState`], so the
//! whole request path can be exercised against in-memory stores in tests.
//!
//! Survey IDs are allocated inside a transaction holding a row lock on the `survey_id_counter`
//! table, so concurrent submissions (from any number of processes) never share an ID. ID
//! allocation and inserts are retried with exponential backoff on transient database errors
//! (see [`retry`]).
//!
//! ## Configuration
//!
//! See [`config`]: YAML file, `INTAKE_`-prefixed environment variables, and `DATABASE_URL`.

pub mod api;
pub mod config;
pub mod db;
pub mod errors;
pub mod matching;
pub mod retry;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method},
    routing::get,
};
use bon::Builder;
use sqlx::{PgPool, postgres::PgPoolOptions};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{debug, info, instrument};
use utoipa::OpenApi;

pub use config::Config;

use crate::{
    api::ApiDoc,
    config::{CorsOrigin, PoolSettings},
    db::store::{PgStore, PostcodeSource, SurveyStore},
    storage::ObjectStore,
};

/// Shared application state passed to every handler.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .postcodes(postcodes)
///     .surveys(surveys)
///     .object_store(object_store)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub postcodes: Arc<dyn PostcodeSource>,
    pub surveys: Arc<dyn SurveyStore>,
    pub object_store: Arc<dyn ObjectStore>,
}

/// Get the intake database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

fn pool_options(settings: &PoolSettings) -> PgPoolOptions {
    let optional = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(optional(settings.idle_timeout_secs))
        .max_lifetime(optional(settings.max_lifetime_secs))
}

/// Connect to PostgreSQL and run migrations
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    info!("Connecting to database");
    let pool = pool_options(&config.database.pool).connect(&config.database.url).await?;
    migrator().run(&pool).await?;
    debug!("Database migrations applied");
    Ok(pool)
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.cors;

    // A literal "*" is not a valid entry in an origin list
    let allow_origin = if cors_config.allowed_origins.contains(&CorsOrigin::Wildcard) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let headers = cors_config
        .allowed_headers
        .iter()
        .map(|h| HeaderName::try_from(h.as_str()))
        .collect::<Result<Vec<_>, _>>()?;

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(headers);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

async fn healthz() -> &'static str {
    "OK"
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the application router: the action endpoint, health and docs routes, receipt serving
/// for the local storage backend, and the CORS, body-limit and tracing layers.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors = create_cors_layer(&state.config)?;
    let body_limit = state.config.attachments.max_body_bytes;

    let mut router = Router::new()
        .route(
            "/",
            get(api::handlers::dispatch::dispatch)
                .post(api::handlers::dispatch::dispatch)
                .options(api::handlers::dispatch::preflight),
        )
        .route("/healthz", get(healthz))
        .route("/api-docs/openapi.json", get(openapi_json));

    if let Some(path) = state.config.storage.local_path() {
        router = router.nest_service("/receipts", ServeDir::new(path));
    }

    Ok(router
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

/// Application state and router, ready to serve
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting intake with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;
        let store = Arc::new(PgStore::new(pool.clone()));
        let postcodes: Arc<dyn PostcodeSource> = store.clone();
        let surveys: Arc<dyn SurveyStore> = store;
        let object_store = storage::from_config(&config.storage).await?;

        let state = AppState::builder()
            .config(config.clone())
            .postcodes(postcodes)
            .surveys(surveys)
            .object_store(object_store)
            .build();

        let mut app = Self::from_state(state)?;
        app.pool = Some(pool);
        Ok(app)
    }

    /// Build an application around an existing state (no database pool is owned)
    pub fn from_state(state: AppState) -> anyhow::Result<Self> {
        let config = state.config.clone();
        let router = build_router(state)?;
        Ok(Self {
            router,
            config,
            pool: None,
        })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Intake listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryStore, test_server, test_state_with_config};
    use axum::http::StatusCode;
    use url::Url;

    #[tokio::test]
    async fn healthz_is_ok() {
        let server = test_server(Arc::new(MemoryStore::default()));
        let response = server.get("/healthz").await;
        response.assert_status_ok();
        response.assert_text("OK");
    }

    #[tokio::test]
    async fn openapi_document_lists_the_action_endpoint() {
        let server = test_server(Arc::new(MemoryStore::default()));
        let response = server.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/"].get("post").is_some());
        assert!(doc["components"]["schemas"].get("SurveySubmission").is_some());
    }

    #[tokio::test]
    async fn specific_origins_are_echoed_and_others_refused() {
        let mut config = crate::test_utils::test_config();
        config.cors.allowed_origins = vec![CorsOrigin::Url(Url::parse("https://survey.example.com").unwrap())];
        let state = test_state_with_config(Arc::new(MemoryStore::default()), config);
        let server = Application::from_state(state).unwrap().into_test_server();

        let allowed = server
            .get("/healthz")
            .add_header(HeaderName::from_static("origin"), HeaderValue::from_static("https://survey.example.com"))
            .await;
        assert_eq!(allowed.header("access-control-allow-origin"), "https://survey.example.com");

        let other = server
            .get("/healthz")
            .add_header(HeaderName::from_static("origin"), HeaderValue::from_static("https://evil.example.com"))
            .await;
        assert!(other.maybe_header("access-control-allow-origin").is_none());
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let mut config = crate::test_utils::test_config();
        config.attachments.max_body_bytes = 64;
        let state = test_state_with_config(Arc::new(MemoryStore::default()), config);
        let server = Application::from_state(state).unwrap().into_test_server();

        let response = server
            .post("/?action=submitSurvey")
            .content_type("application/json")
            .bytes(vec![b' '; 1024].into())
            .await;

        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn invalid_cors_header_names_fail_router_construction() {
        let mut config = crate::test_utils::test_config();
        config.cors.allowed_headers = vec!["not a header".to_string()];
        assert!(create_cors_layer(&config).is_err());
    }
}
