use bulletin::configuration::get_config;
use bulletin::newsletter_delivery_worker::run_worker_until_stopped;
use bulletin::startup::Application;
use bulletin::telemetry::{get_subscriber, init_subscriber};
use std::fmt::{Debug, Display};
use tokio::task::JoinError;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("bulletin".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber)?;

    let config = get_config()?;
    let scheduler_enabled = !config.delivery.daily_trigger().is_zero();

    let application = Application::build(config.clone()).await?;
    let application_task = tokio::spawn(application.run_until_stopped());

    if scheduler_enabled {
        let worker_task = tokio::spawn(run_worker_until_stopped(config));
        tokio::select! {
            o = application_task => report_exit("API", o),
            o = worker_task => report_exit("Background worker", o),
        };
    } else {
        tracing::info!("In-process scheduler disabled, waiting for external cron triggers");
        report_exit("API", application_task.await);
    }

    Ok(())
}

fn report_exit(task_name: &str, outcome: Result<Result<(), impl Debug + Display>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{} has exited", task_name)
        }
        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} failed",
                task_name
            )
        }
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{}' task failed to complete",
                task_name
            )
        }
    }
}
