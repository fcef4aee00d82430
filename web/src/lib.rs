use axum_login::{
    tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer},
    AuthManagerLayerBuilder,
};
use domain::user::Backend;
use log::*;
use sea_orm::DatabaseConnection;
use service::config::Config;
use std::sync::Arc;
use templates::Templates;
use time::Duration;
use tokio::net::TcpListener;
use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::PostgresStore;

mod controller;
mod error;
mod extractors;
mod middleware;
mod params;
mod response;
mod router;
pub mod templates;

/// Sessions live in this table inside the application schema.
const SESSION_TABLE: &str = "authorized_sessions";
const EXPIRED_SESSION_SWEEP_SECS: u64 = 60;

// Web-level state shared by every handler: the service infrastructure plus
// the compiled templates.
#[derive(Clone)]
pub struct AppState {
    service_state: service::AppState,
    templates: Arc<Templates>,
}

impl AppState {
    pub fn new(service_state: service::AppState, templates: Templates) -> Self {
        Self {
            service_state,
            templates: Arc::new(templates),
        }
    }

    pub fn db_conn_ref(&self) -> &DatabaseConnection {
        self.service_state.db_conn_ref()
    }

    pub fn database_connection(&self) -> &Arc<DatabaseConnection> {
        &self.service_state.database_connection
    }

    pub fn config(&self) -> &Config {
        &self.service_state.config
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }
}

pub async fn init_server(app_state: AppState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = app_state.config().clone();
    let pool = app_state
        .db_conn_ref()
        .get_postgres_connection_pool()
        .clone();

    let session_store = PostgresStore::new(pool)
        .with_schema_name(service::DB_SCHEMA)?
        .with_table_name(SESSION_TABLE)?;
    session_store.migrate().await?;

    let sweeper = session_store.clone();
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(EXPIRED_SESSION_SWEEP_SECS);
        if let Err(err) = sweeper.continuously_delete_expired(period).await {
            error!("Expired session deletion stopped: {err:?}");
        }
    });

    let session_expiry_secs = i64::try_from(config.backend_session_expiry_seconds)?;
    info!("Sessions expire after {session_expiry_secs}s of inactivity");

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.is_production())
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(Duration::seconds(session_expiry_secs)));

    let backend = Backend::new(app_state.database_connection());
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let host = config.interface.as_deref().unwrap_or("127.0.0.1");
    let server_url = format!("{host}:{}", config.port);
    let listener = TcpListener::bind(&server_url).await?;

    info!("Server starting... listening for connections on http://{server_url}");

    let app = router::define_routes(app_state).layer(auth_layer);
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

#[cfg(test)]
#[cfg(feature = "mock")]
pub(crate) mod test_support {
    use super::*;
    use axum::{body::Body, http::Request, response::Response, Router};
    use axum_login::tower_sessions::MemoryStore;
    use chrono::Utc;
    use clap::Parser;
    use domain::{users, Id};
    use password_auth::generate_hash;
    use tower::ServiceExt;

    pub const PASSWORD: &str = "Correct-Horse-42";

    pub fn config() -> Config {
        Config::try_parse_from(["social_app", "--secret-key", "test-secret"]).unwrap()
    }

    pub fn user(email: &str) -> users::Model {
        let now = Utc::now();
        users::Model {
            id: Id::new_v4(),
            email: email.to_string(),
            password: generate_hash(PASSWORD),
            is_staff: false,
            is_active: true,
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    /// The full router over `db`, with sessions kept in memory.
    pub fn app(db: DatabaseConnection, config: Config) -> Router {
        let db = Arc::new(db);
        let app_state = AppState::new(
            service::AppState::new(config, &db),
            Templates::new().unwrap(),
        );

        let session_layer = SessionManagerLayer::new(MemoryStore::default())
            .with_secure(false)
            .with_expiry(Expiry::OnInactivity(Duration::days(1)));
        let auth_layer = AuthManagerLayerBuilder::new(Backend::new(&db), session_layer).build();

        router::define_routes(app_state).layer(auth_layer)
    }

    pub fn form_post(uri: &str, body: &str, partial: bool) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded");
        if partial {
            builder = builder.header(crate::response::HX_REQUEST, "true");
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    pub async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    /// Logs in through `/login` and returns the session cookie.
    pub async fn login(app: &Router, email: &str) -> String {
        let response = send(
            app,
            form_post(
                "/login",
                &format!("email={}&password={PASSWORD}", urlencoding::encode(email)),
                false,
            ),
        )
        .await;
        response
            .headers()
            .get("set-cookie")
            .and_then(|cookie| cookie.to_str().ok())
            .and_then(|cookie| cookie.split(';').next())
            .unwrap()
            .to_string()
    }
}
