use log::*;
use migration::{Migrator, MigratorTrait};
use service::{config::Config, logging::Logger};
use std::sync::Arc;
use web::templates::Templates;

#[tokio::main]
async fn main() {
    let config = Config::new();
    Logger::init_logger(&config as &Config);

    info!(
        "Starting {} [{}] in {} mode",
        config.site_name(),
        env!("CARGO_PKG_VERSION"),
        config.runtime_env()
    );

    let db = match service::init_database(&config).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to establish database connection: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = Migrator::up(db.as_ref(), None).await {
        error!("Failed to apply database migrations: {e}");
        std::process::exit(1);
    }

    let templates = match Templates::new() {
        Ok(templates) => templates,
        Err(e) => {
            error!("Failed to load templates: {e:?}");
            std::process::exit(1);
        }
    };

    let service_state = service::AppState::new(config, &db);
    let app_state = web::AppState::new(service_state, templates);

    if let Err(e) = web::init_server(app_state).await {
        error!("Server stopped: {e}");
        std::process::exit(1);
    }
}
