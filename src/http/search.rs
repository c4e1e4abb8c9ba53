use actix_web::web::{Data, Query};
use actix_web::{HttpResponse, Responder};
use search_providers::SearchClient;
use serde::Deserialize;
use tracing::error;

#[derive(Deserialize)]
pub(crate) struct SearchQuery {
    q: String,
}

pub(crate) async fn search_videos(
    search_client: Data<SearchClient>,
    query: Query<SearchQuery>,
) -> impl Responder {
    if query.q.trim().is_empty() {
        return HttpResponse::BadRequest().body("Search query is empty");
    }

    match search_client.search(&query.q).await {
        Ok(results) => HttpResponse::Ok().json(results),
        Err(error) => {
            error!(?error, query = %query.q, "Unable to search videos");
            HttpResponse::BadGateway().finish()
        }
    }
}
