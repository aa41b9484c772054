pub mod authentication;
pub mod configuration;
pub mod dispatcher;
pub mod domain;
pub mod email_client;
pub mod newsletter_delivery_worker;
pub mod queue_manager;
pub mod repository;
pub mod routes;
pub mod startup;
pub mod telemetry;
pub mod template;
pub mod utils;

#[cfg(test)]
mod test_support;
