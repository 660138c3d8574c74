use actix_web::{middleware, web, App, HttpServer};

mod config;
mod db;
mod error;
mod models;
mod query;
mod routes;
mod schema;

use crate::config::Config;
use crate::db::Store;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env();

    // set up the store; every request goes through its single connection
    log::info!("working with sqlite db in {}", config.database_url);
    let store = Store::open(&config.database_url).expect("Failed to open the recipe store.");

    let address = (config.host.clone(), config.port);
    log::info!("recipe book version: {}", config.version);
    log::info!("serving pages from {}", config.static_dir);
    log::info!("starting HTTP server at http://{}:{}", address.0, address.1);

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(config.clone()))
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
            .configure(routes::pages(&config.static_dir))
    })
    .bind(address)?
    .run()
    .await
}
