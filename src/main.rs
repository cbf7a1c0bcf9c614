use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use mongodb::Client;
use tracing_subscriber::EnvFilter;

use settleup::{
    config::{Settings, DEFAULT_LOG_FILTER},
    routes,
    store::GroupStore,
};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Settings::from_env()?;

    let store = match &settings.mongodb_uri {
        Some(uri) => {
            tracing::info!("Connecting to MongoDB");
            let client = Client::with_uri_str(uri).await?;
            tracing::info!("Connected to database {}", settings.database);
            GroupStore::mongo(&client, &settings.database).await?
        }
        None => {
            tracing::warn!("MONGODB_URI not set, groups are kept in memory only");
            GroupStore::in_memory()
        }
    };
    let store = web::Data::new(store);
    let auth = web::Data::new(settings.auth());

    tracing::info!("listening on {}:{}", settings.bind, settings.port);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(store.clone())
            .app_data(auth.clone())
            .configure(routes::configure)
    })
    .bind((settings.bind.as_str(), settings.port))?
    .run()
    .await?;

    Ok(())
}
