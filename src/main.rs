use crate::config::Config;
use crate::services::SoundServiceClient;
use actix_rt::signal::unix;
use actix_rt::task::JoinError;
use actix_web::web::Data;
use actix_web::{web, App, HttpServer};
use futures_lite::FutureExt;
use search_providers::SearchClient;
use sound_pipeline::{Pipeline, PipelineDependencies, PipelineError, PipelineUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error, info, warn};

mod config;
mod http;
mod services;
mod utils;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

async fn log_pipeline_updates(mut updates: UnboundedReceiver<PipelineUpdate>) {
    while let Some(update) = updates.recv().await {
        match update {
            PipelineUpdate::ItemQueued { id, metadata } => {
                info!(%id, title = %metadata.title, "Queued")
            }
            PipelineUpdate::PlaybackStarting { id } => info!(%id, "Now playing"),
            PipelineUpdate::ItemRemoved { id, reason } => info!(%id, ?reason, "Removed"),
            PipelineUpdate::CommandFailed { command, reason } => {
                error!(%command, %reason, "Playback command failed")
            }
            update => debug!(?update, "Pipeline update"),
        }
    }
}

fn log_pipeline_exit(exit: Result<Result<(), PipelineError>, JoinError>) {
    match exit {
        Ok(Ok(())) => info!("Pipeline has stopped"),
        Ok(Err(error)) => error!(?error, "Pipeline has failed"),
        Err(error) => error!(?error, "Pipeline task has panicked"),
    }
}

#[actix_rt::main]
async fn main() -> std::io::Result<()> {
    let mut terminate = unix::signal(unix::SignalKind::terminate())?;
    let mut interrupt = unix::signal(unix::SignalKind::interrupt())?;

    dotenv::dotenv().ok();
    env_logger::init();

    let config = Arc::from(Config::from_env());

    info!(version = VERSION, "Starting application...");

    let sound_service_client = Arc::new(SoundServiceClient::create(
        &config.sound_service.endpoint,
        config.sound_service.poll_interval(),
        config.sound_service.request_timeout(),
        config.sound_service.dispatch_timeout(),
    ));
    let search_client = Data::new(SearchClient::create(
        &config.search.endpoint,
        config.search.results_limit,
        config.sound_service.request_timeout(),
    ));

    let Pipeline {
        handle: pipeline,
        dispatcher,
        updates,
    } = Pipeline::create(
        PipelineDependencies {
            downloader: sound_service_client.clone(),
            analyzer: sound_service_client.clone(),
            player: sound_service_client.clone(),
        },
        config.pipeline_settings(),
    );

    let mut dispatcher = actix_rt::spawn(dispatcher.run());
    actix_rt::spawn(log_pipeline_updates(updates));

    let shutdown_timeout = config.shutdown_timeout;
    let bind_address = config.bind_address.clone();

    let server = HttpServer::new({
        let pipeline = pipeline.clone();

        move || {
            App::new()
                .app_data(Data::new(pipeline.clone()))
                .app_data(Data::new(Arc::clone(&sound_service_client)))
                .app_data(search_client.clone())
                .service(web::resource("/health").route(web::get().to(http::readiness_check)))
                .service(web::resource("/search").route(web::get().to(http::search_videos)))
                .service(
                    web::resource("/queue")
                        .route(web::get().to(http::get_queue))
                        .route(web::post().to(http::enqueue_item)),
                )
                .service(
                    web::resource("/playback/{command}")
                        .route(web::post().to(http::issue_playback_command)),
                )
        }
    })
    .shutdown_timeout(shutdown_timeout)
    .bind(bind_address)?
    .run();

    let server_handle = server.handle();

    actix_rt::spawn({
        async move {
            if let Err(error) = server.await {
                error!(?error, "Error on http server");
            }
        }
    });

    info!("Application started");

    let stopped_by_signal = async {
        interrupt.recv().or(terminate.recv()).await;
        info!("Received shutdown signal. Shutting down gracefully...");
        true
    }
    .or(async {
        log_pipeline_exit((&mut dispatcher).await);
        false
    })
    .await;

    if stopped_by_signal {
        pipeline.shutdown();

        match actix_rt::time::timeout(Duration::from_secs(shutdown_timeout), dispatcher).await {
            Ok(exit) => log_pipeline_exit(exit),
            Err(_) => warn!(shutdown_timeout, "Pipeline did not stop in time"),
        }
    }

    server_handle.stop(true).await;

    Ok(())
}
