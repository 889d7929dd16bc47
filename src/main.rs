use std::{process, sync::Arc};

use rxledger::{
    application::{error::AppError, repos::Database},
    cache, config,
    domain::entities::all_schemas,
    infra::{
        db::PgDatabase,
        error::InfraError,
        http::{self, AppState},
        memory::MemoryDatabase,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::InitSchema(_) => run_init_schema(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    match settings.database.url.as_deref() {
        Some(url) => {
            let db = connect(url, &settings).await?;
            if settings.database.ensure_schema {
                db.ensure_schema(&all_schemas()).await?;
            }
            serve_with(db, &settings).await
        }
        None => {
            warn!("no database url configured; records are kept in memory only");
            serve_with(MemoryDatabase::new(), &settings).await
        }
    }
}

async fn run_init_schema(settings: config::Settings) -> Result<(), AppError> {
    let url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let db = connect(url, &settings).await?;
    db.ensure_schema(&all_schemas()).await?;
    info!("schema is up to date");
    Ok(())
}

async fn connect(url: &str, settings: &config::Settings) -> Result<PgDatabase, AppError> {
    let db = PgDatabase::connect(url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::from)?;
    info!(
        max_connections = settings.database.max_connections.get(),
        "database pool ready"
    );
    Ok(db)
}

async fn serve_with<D: Database>(db: D, settings: &config::Settings) -> Result<(), AppError> {
    let cache = cache::build(&settings.cache)
        .await
        .map_err(InfraError::from)?;
    info!(
        backend = ?settings.cache.backend,
        capacity = settings.cache.capacity,
        "record cache ready"
    );

    let router = http::build_router(AppState::new(Arc::new(db), cache));
    http::serve(
        settings.server.addr,
        router,
        http::shutdown_signal(),
        settings.server.graceful_shutdown,
    )
    .await?;

    info!("server stopped");
    Ok(())
}
