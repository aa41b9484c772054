use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError, web};
use serde::Deserialize;
use uuid::Uuid;

use crate::repository::CampaignStore;
use crate::utils::{build_error_response, error_chain_fmt};

#[derive(thiserror::Error)]
pub enum CampaignQueryError {
    #[error("Campaign not found")]
    NotFound,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for CampaignQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for CampaignQueryError {
    fn error_response(&self) -> HttpResponse {
        let status_code = match self {
            CampaignQueryError::NotFound => StatusCode::NOT_FOUND,
            CampaignQueryError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        build_error_response(status_code, self.to_string())
    }
}

#[derive(Deserialize)]
pub struct ListParameters {
    limit: Option<i64>,
}

#[tracing::instrument(name = "List newsletter campaigns", skip_all)]
pub async fn list_campaigns(
    parameters: web::Query<ListParameters>,
    store: web::Data<dyn CampaignStore>,
) -> Result<HttpResponse, CampaignQueryError> {
    let limit = parameters.limit.unwrap_or(20).clamp(1, 100);
    let campaigns = store.list_campaigns(limit).await?;
    Ok(HttpResponse::Ok().json(campaigns))
}

#[tracing::instrument(name = "Get newsletter campaign", skip(store))]
pub async fn get_campaign(
    path: web::Path<Uuid>,
    store: web::Data<dyn CampaignStore>,
) -> Result<HttpResponse, CampaignQueryError> {
    let campaign = store
        .get_campaign(path.into_inner())
        .await?
        .ok_or(CampaignQueryError::NotFound)?;
    Ok(HttpResponse::Ok().json(campaign))
}
