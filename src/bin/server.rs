use std::{net::SocketAddr, path::Path, process::ExitCode};

use cookbook_sdk::{
    actions::load_reference_data,
    routes::{service, Context},
    Config,
};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tokio::signal;
use tracing_subscriber::{fmt, EnvFilter};

const USAGE: &str = "usage: cookbook-server [seed <dir>]";

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Could not load configuration {e}");
            return ExitCode::FAILURE;
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Could not connect to the database: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = sqlx::migrate!().run(&pool).await {
        log::error!("Migrations failed: {e}");
        return ExitCode::FAILURE;
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => serve(pool, config).await,
        [command, dir] if command == "seed" => seed(Path::new(dir), &pool).await,
        _ => {
            log::error!("{USAGE}");
            ExitCode::FAILURE
        }
    }
}

async fn seed(dir: &Path, pool: &Pool<Postgres>) -> ExitCode {
    match load_reference_data(dir, pool).await {
        Ok(summary) => {
            log::info!(
                "Seeded {} ingredients and {} tags from {dir:?}",
                summary.ingredients,
                summary.tags
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Seeding failed: {}", e.info.unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

async fn serve(pool: Pool<Postgres>, config: Config) -> ExitCode {
    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    let ctx = Context::new(pool, config);

    let (bound, server) = match warp::serve(service(ctx))
        .try_bind_with_graceful_shutdown(address, shutdown_signal())
    {
        Ok(server) => server,
        Err(e) => {
            log::error!("Could not bind {address}: {e}");
            return ExitCode::FAILURE;
        }
    };

    log::info!("Server running on {bound}");
    server.await;
    log::info!("Server shut down");

    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        log::error!("Could not listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
