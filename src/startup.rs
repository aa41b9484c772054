use crate::authentication::{AdminToken, CronSecret};
use crate::configuration::{Configuration, DatabaseConfigs};
use crate::dispatcher::Dispatcher;
use crate::queue_manager::QueueManager;
use crate::repository::{CampaignStore, PostgresStore};
use crate::routes::{admin_routes, cron_routes, health_check};
use crate::template::TemplateRenderer;
use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(config: Configuration) -> Result<Self, anyhow::Error> {
        let connection_pool = get_connection_pool(&config.database);
        let store = PostgresStore::new(connection_pool);
        store.migrate().await?;

        Self::build_with_store(config, Arc::new(store))
    }

    /// Same as `build`, on top of an already constructed store.
    pub fn build_with_store(
        config: Configuration,
        store: Arc<dyn CampaignStore>,
    ) -> Result<Self, anyhow::Error> {
        let dispatcher = Arc::new(build_dispatcher(&config, store.clone())?);
        let queue_manager = Arc::new(QueueManager::new(store.clone(), dispatcher.clone()));

        let address = format!("{}:{}", config.application.host, config.application.port);
        let listener = TcpListener::bind(address)
            .with_context(|| "Failed to bind TCP listener for application")?;
        let port = listener
            .local_addr()
            .with_context(|| "Failed to read local address of TCP listener")?
            .port();
        let server = run(
            listener,
            store,
            dispatcher,
            queue_manager,
            CronSecret(config.application.cron_secret),
            AdminToken(config.application.admin_token),
        )
        .context("Failed to run Actix web server")?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), anyhow::Error> {
        // run returns a Server type, which implements Future trait
        self.server.await.context("Server stopped with an error")
    }
}

pub fn get_connection_pool(config: &DatabaseConfigs) -> PgPool {
    PgPoolOptions::new().connect_lazy_with(config.connect_options())
}

pub fn build_dispatcher(
    config: &Configuration,
    store: Arc<dyn CampaignStore>,
) -> Result<Dispatcher, anyhow::Error> {
    let email_client = config
        .email_client
        .client()
        .context("Failed to build the email client")?;
    let renderer = TemplateRenderer::new(&config.application.base_url)
        .context("Invalid application base url")?;

    Ok(Dispatcher::new(
        store,
        Arc::new(email_client),
        renderer,
        config.delivery,
    ))
}

fn run(
    tcp_listener: TcpListener,
    store: Arc<dyn CampaignStore>,
    dispatcher: Arc<Dispatcher>,
    queue_manager: Arc<QueueManager>,
    cron_secret: CronSecret,
    admin_token: AdminToken,
) -> Result<Server, anyhow::Error> {
    let store: web::Data<dyn CampaignStore> = web::Data::from(store);
    let dispatcher = web::Data::from(dispatcher);
    let queue_manager = web::Data::from(queue_manager);
    let cron_secret = web::Data::new(cron_secret);
    let admin_token = web::Data::new(admin_token);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .configure(configure_routes)
            .app_data(store.clone())
            .app_data(dispatcher.clone())
            .app_data(queue_manager.clone())
            .app_data(cron_secret.clone())
            .app_data(admin_token.clone())
    })
    .listen(tcp_listener)
    .with_context(|| "Failed to bind Actix server to TCP listener")?
    .run();

    Ok(server)
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health_check", web::get().to(health_check))
        .service(
            web::scope("/v1")
                .service(web::scope("/admin").configure(admin_routes))
                .service(web::scope("/cron").configure(cron_routes)),
        );
}
