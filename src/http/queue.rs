use crate::utils::{completion_fraction, format_playback_time};
use actix_web::web::{Data, Json};
use actix_web::{HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sound_pipeline::{EnqueueError, MediaItem, MediaMetadata, PipelineHandle, PlayerState};
use tracing::{error, warn};

#[derive(Deserialize)]
pub(crate) struct EnqueueItemBody {
    id: String,
    metadata: MediaMetadata,
}

pub(crate) async fn enqueue_item(
    pipeline: Data<PipelineHandle>,
    body: Json<EnqueueItemBody>,
) -> impl Responder {
    let EnqueueItemBody { id, metadata } = body.into_inner();

    match pipeline.enqueue_item(id.into(), metadata).await {
        Ok(id) => HttpResponse::Ok().json(json!({ "id": id })),
        Err(EnqueueError::AlreadyQueued(id)) => {
            warn!(%id, "Item is already queued");
            HttpResponse::Conflict().json(json!({ "id": id }))
        }
        Err(EnqueueError::DispatchFailed(error)) => {
            error!(?error, "Unable to start item download");
            HttpResponse::BadGateway().body(error.to_string())
        }
        Err(EnqueueError::PipelineStopped) => HttpResponse::ServiceUnavailable().finish(),
    }
}

#[derive(Serialize)]
struct QueueView {
    items: Vec<MediaItem>,
    player_state: PlayerState,
    playback_time: String,
    completion: f32,
}

pub(crate) async fn get_queue(pipeline: Data<PipelineHandle>) -> impl Responder {
    match pipeline.snapshot().await {
        Ok(snapshot) => HttpResponse::Ok().json(QueueView {
            playback_time: format_playback_time(snapshot.progress),
            completion: completion_fraction(snapshot.progress),
            items: snapshot.items,
            player_state: snapshot.player_state,
        }),
        Err(error) => {
            error!(?error, "Unable to read the queue");
            HttpResponse::ServiceUnavailable().finish()
        }
    }
}
