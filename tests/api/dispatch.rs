use crate::helpers::{accept_all_emails, newsletter_payload, spawn_app, spawn_app_with_batch_size};
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn dispatch_requires_the_cron_secret() {
    let app = spawn_app().await;
    app.seed_subscribers(1);
    app.store_pending_campaign().await;
    accept_all_emails(&app, 0).await;

    let response = app.dispatch_with_secret("guessed-secret").await;

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn dispatch_without_campaigns_is_a_no_op() {
    let app = spawn_app().await;

    let response = app.dispatch().await;

    assert_eq!(response.status().as_u16(), 200);
    let report: Value = response.json().await.unwrap();
    assert_eq!(
        report,
        serde_json::json!({ "sent": 0, "failed": 0, "remaining": 0, "campaign_id": null })
    );
}

#[tokio::test]
async fn daily_dispatch_drains_the_remaining_recipients() {
    let app = spawn_app_with_batch_size(2).await;
    app.seed_subscribers(3);

    let outcome: Value = {
        let _guard = Mock::given(path("/email"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount_as_scoped(&app.email_server)
            .await;
        app.publish_newsletter(&newsletter_payload())
            .await
            .json()
            .await
            .unwrap()
    };
    let campaign_id = outcome["campaign_id"].as_str().unwrap().to_string();

    let _guard = Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount_as_scoped(&app.email_server)
        .await;
    let report: Value = app.dispatch().await.json().await.unwrap();

    assert_eq!(report["campaign_id"], campaign_id.as_str());
    assert_eq!(report["sent"], 1);
    assert_eq!(report["remaining"], 0);

    let campaign: Value = app.get_campaign(&campaign_id).await.json().await.unwrap();
    assert_eq!(campaign["status"], "completed");
    assert_eq!(campaign["sent_count"], 3);
    assert_eq!(campaign["total_recipients"], 3);
    assert!(!campaign["completed_at"].is_null());
}

#[tokio::test]
async fn completed_campaigns_are_never_sent_twice() {
    let app = spawn_app().await;
    app.seed_subscribers(2);
    accept_all_emails(&app, 2).await;

    app.publish_newsletter(&newsletter_payload())
        .await
        .error_for_status()
        .unwrap();
    let first: Value = app.dispatch().await.json().await.unwrap();
    let second: Value = app.dispatch().await.json().await.unwrap();

    assert!(first["campaign_id"].is_null());
    assert!(second["campaign_id"].is_null());
}

#[tokio::test]
async fn campaigns_are_served_oldest_first() {
    let app = spawn_app_with_batch_size(1).await;
    app.seed_subscribers(2);
    let older = app.store_pending_campaign().await;
    let newer = app.store_pending_campaign().await;
    accept_all_emails(&app, 4).await;

    let mut served = Vec::new();
    for _ in 0..4 {
        let report: Value = app.dispatch().await.json().await.unwrap();
        served.push(report["campaign_id"].as_str().unwrap().to_string());
    }

    assert_eq!(
        served,
        vec![
            older.to_string(),
            older.to_string(),
            newer.to_string(),
            newer.to_string()
        ]
    );
}
