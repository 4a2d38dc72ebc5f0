use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;

mod ai;
mod channels;
mod config;
mod context;
mod controllers;
mod db;
mod error;
mod gsuite;
mod models;

use channels::MessageDispatcher;
use config::Config;
use db::Database;

pub struct AppState {
    pub config: Arc<Config>,
    pub dispatcher: Arc<MessageDispatcher>,
}

/// Register the Telegram and Bird webhooks concurrently.
async fn configure_webhooks(config: &Config, public_url: &str) {
    let webhook_url = format!("{}/message", public_url.trim_end_matches('/'));

    let (telegram, bird) = tokio::join!(
        channels::telegram::TelegramChannel::register_webhook(
            &config.telegram_bot_token,
            &webhook_url
        ),
        channels::bird::BirdChannel::register_webhook(config, &webhook_url),
    );

    if let Err(e) = telegram {
        log::error!("Telegram webhook registration failed: {}", e);
    }
    if let Err(e) = bird {
        log::error!("Bird webhook registration failed: {}", e);
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Arc::new(Config::from_env());
    let port = config.port;

    log::info!("Initializing database at {}", config.database_url);
    let db = Database::new(&config.database_url).expect("Failed to initialize database");
    let db = Arc::new(db);

    log::info!("Initializing message dispatcher");
    let dispatcher = Arc::new(
        MessageDispatcher::new(db.clone(), config.clone())
            .expect("Failed to initialize message dispatcher"),
    );

    match &config.public_url {
        Some(public_url) => {
            log::info!("Registering webhooks at {}", public_url);
            configure_webhooks(&config, public_url).await;
        }
        None => log::info!("PUBLIC_URL not set, skipping webhook registration"),
    }

    log::info!("Starting Warren server on port {}", port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(AppState {
                config: Arc::clone(&config),
                dispatcher: Arc::clone(&dispatcher),
            }))
            .wrap(Logger::default())
            .configure(controllers::health::config)
            .configure(controllers::webhook::config)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
