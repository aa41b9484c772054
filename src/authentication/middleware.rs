use crate::utils::{build_error_response, e500};
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::error::InternalError;
use actix_web::http::{StatusCode, header};
use actix_web::middleware::Next;
use actix_web::web;
use secrecy::{ExposeSecret, Secret};
use subtle::ConstantTimeEq;

/// Shared secret the external scheduler presents to trigger a dispatch cycle.
#[derive(Clone)]
pub struct CronSecret(pub Secret<String>);

/// Bearer token guarding the newsletter administration endpoints.
#[derive(Clone)]
pub struct AdminToken(pub Secret<String>);

pub async fn require_cron_secret(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let expected = req
        .app_data::<web::Data<CronSecret>>()
        .map(|s| s.0.clone())
        .ok_or_else(|| e500("Cron secret is not configured"))?;

    check_bearer(&req, &expected)?;
    next.call(req).await
}

pub async fn require_admin_token(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let expected = req
        .app_data::<web::Data<AdminToken>>()
        .map(|s| s.0.clone())
        .ok_or_else(|| e500("Admin token is not configured"))?;

    check_bearer(&req, &expected)?;
    next.call(req).await
}

fn check_bearer(req: &ServiceRequest, expected: &Secret<String>) -> Result<(), actix_web::Error> {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| unauthorized("Missing bearer token"))?;

    let matches: bool = presented
        .as_bytes()
        .ct_eq(expected.expose_secret().as_bytes())
        .into();
    if !matches {
        return Err(unauthorized("Invalid bearer token"));
    }
    Ok(())
}

fn unauthorized(msg: &'static str) -> actix_web::Error {
    let response = build_error_response(StatusCode::UNAUTHORIZED, msg.to_string());
    InternalError::from_response(anyhow::anyhow!(msg), response).into()
}
