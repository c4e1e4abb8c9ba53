use actix_web::web::{Data, Path};
use actix_web::{HttpResponse, Responder};
use sound_pipeline::{PipelineHandle, PlaybackControl};
use tracing::{error, warn};

pub(crate) async fn issue_playback_command(
    pipeline: Data<PipelineHandle>,
    command: Path<String>,
) -> impl Responder {
    let control = match command.parse::<PlaybackControl>() {
        Ok(control) => control,
        Err(error) => {
            warn!(?error, "Unknown playback command requested");
            return HttpResponse::BadRequest().body(error.to_string());
        }
    };

    if let Err(error) = pipeline.issue_playback_command(control) {
        error!(?error, "Unable to issue playback command");
        return HttpResponse::ServiceUnavailable().finish();
    }

    HttpResponse::Accepted().finish()
}
