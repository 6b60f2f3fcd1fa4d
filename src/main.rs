use std::{process, sync::Arc};

use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;
use vellum::{
    application::{
        convert::{ConvertService, ConvertSettings},
        error::AppError,
        repos::{ArtifactCache, BlobStorage, SavePreparer, TaskStore, WorkQueue},
    },
    config,
    infra::{
        cache::ConversionArtifactCache,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, RouterState},
        storage::{FsBlobStorage, StoredChangesPreparer},
        telemetry,
    },
};

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
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| AppError::validation("database.url must be configured"))?;

    PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PostgresRepositories::setup_queue(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    info!("migrations applied and queue schema provisioned");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;
    PostgresRepositories::setup_queue(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repositories = Arc::new(PostgresRepositories::new(pool));
    let storage = Arc::new(
        FsBlobStorage::new(
            settings.storage.directory.clone(),
            &settings.storage.signing_secret,
            settings.storage.url_ttl,
        )
        .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );
    let cache = Arc::new(
        ConversionArtifactCache::new(settings.storage.cache_directory.clone())
            .map_err(|err| AppError::from(InfraError::Io(err)))?,
    );

    let tasks: Arc<dyn TaskStore> = repositories.clone();
    let queue: Arc<dyn WorkQueue> = repositories.clone();
    let blob_storage: Arc<dyn BlobStorage> = storage.clone();
    let artifact_cache: Arc<dyn ArtifactCache> = cache;
    let preparer: Arc<dyn SavePreparer> = Arc::new(StoredChangesPreparer::new(storage.clone()));

    let convert_service = Arc::new(ConvertService::new(
        tasks,
        queue,
        blob_storage,
        artifact_cache,
        preparer,
        ConvertSettings {
            convert_timeout: settings.convert_timeout(),
            poll_interval: settings.convert.poll_interval,
            healthcheck_file: settings.convert.healthcheck_file.clone(),
        },
    ));

    let state = RouterState {
        convert: convert_service,
        storage,
        db: Some(repositories),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "vellum listening");

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
