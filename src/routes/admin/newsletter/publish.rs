use crate::domain::NewsletterData;
use crate::queue_manager::{EnqueueError, EnqueueOutcome, QueueManager};
use crate::utils::{build_error_response, error_chain_fmt};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};

#[derive(thiserror::Error)]
pub enum PublishError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("There are no newsletter subscribers to send to.")]
    NoSubscribers,
    #[error("Something went wrong while sending the newsletter")]
    UnexpectedError(#[source] EnqueueError),
}

impl std::fmt::Debug for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for PublishError {
    fn error_response(&self) -> HttpResponse {
        let status_code = match self {
            PublishError::BadRequest(_) => StatusCode::BAD_REQUEST,
            PublishError::NoSubscribers => StatusCode::UNPROCESSABLE_ENTITY,
            PublishError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        build_error_response(status_code, self.to_string())
    }
}

impl From<EnqueueError> for PublishError {
    fn from(e: EnqueueError) -> Self {
        match e {
            EnqueueError::Validation(msg) => PublishError::BadRequest(msg),
            EnqueueError::NoSubscribers => PublishError::NoSubscribers,
            other => PublishError::UnexpectedError(other),
        }
    }
}

#[tracing::instrument(name = "Publish newsletter", skip_all)]
pub async fn enqueue_newsletter(
    payload: web::Json<NewsletterData>,
    queue_manager: web::Data<QueueManager>,
) -> Result<HttpResponse, PublishError> {
    let NewsletterData {
        title,
        body,
        referenced_item_ids,
    } = payload.into_inner();

    let outcome: EnqueueOutcome = queue_manager
        .enqueue(title, body, referenced_item_ids)
        .await?;

    Ok(HttpResponse::Ok().json(outcome))
}
