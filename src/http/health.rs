use crate::services::SoundServiceClient;
use actix_web::web::Data;
use actix_web::{HttpResponse, Responder};
use std::sync::Arc;
use tracing::error;

pub(crate) async fn readiness_check(
    sound_service_client: Data<Arc<SoundServiceClient>>,
) -> impl Responder {
    if let Err(error) = sound_service_client.check_connection().await {
        error!(?error, "Readiness check failed");
        return HttpResponse::ServiceUnavailable().finish();
    }

    HttpResponse::Ok().finish()
}
