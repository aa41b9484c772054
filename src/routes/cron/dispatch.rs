use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::utils::{build_error_response, error_chain_fmt};

#[derive(thiserror::Error)]
#[error("Newsletter dispatch cycle failed")]
pub struct DispatchCycleError(#[source] DispatchError);

impl std::fmt::Debug for DispatchCycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for DispatchCycleError {
    fn error_response(&self) -> HttpResponse {
        build_error_response(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
    }
}

/// One externally scheduled unit of work: a single batch for the oldest eligible campaign.
#[tracing::instrument(name = "Scheduled newsletter dispatch", skip_all)]
pub async fn dispatch_newsletter_batch(
    dispatcher: web::Data<Dispatcher>,
) -> Result<HttpResponse, DispatchCycleError> {
    let report = dispatcher
        .run_batch_cycle()
        .await
        .map_err(DispatchCycleError)?;
    Ok(HttpResponse::Ok().json(report))
}
