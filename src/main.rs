use std::io;
use std::sync::Arc;

use dotenvy::dotenv;
use storefront_service::infrastructure::pg_store::PgStore;
use storefront_service::{build_server, build_state, create_pool, run_migrations, Config};

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;

    let pool = create_pool(&config.database_url, config.pool_size).map_err(io::Error::other)?;
    run_migrations(&pool).map_err(io::Error::other)?;

    let state = build_state(Arc::new(PgStore::new(pool)), config.checkout_timeout);

    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(state, &config.host, config.port)?.await
}
