use crate::helpers::{accept_all_emails, newsletter_payload, spawn_app};
use serde_json::Value;
use uuid::Uuid;

#[tokio::test]
async fn unknown_campaigns_return_404() {
    let app = spawn_app().await;

    let response = app.get_campaign(&Uuid::new_v4().to_string()).await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn campaigns_are_listed_newest_first() {
    let app = spawn_app().await;
    app.seed_subscribers(1);
    accept_all_emails(&app, 2).await;

    let mut published = Vec::new();
    for _ in 0..2 {
        let outcome: Value = app
            .publish_newsletter(&newsletter_payload())
            .await
            .json()
            .await
            .unwrap();
        published.push(outcome["campaign_id"].clone());
    }

    let response = app.list_campaigns().await;

    assert_eq!(response.status().as_u16(), 200);
    let campaigns: Vec<Value> = response.json().await.unwrap();
    let listed: Vec<_> = campaigns.iter().map(|c| c["id"].clone()).collect();
    published.reverse();
    assert_eq!(listed, published);
    assert!(campaigns.iter().all(|c| c["status"] == "completed"));
}

#[tokio::test]
async fn campaign_queries_require_the_admin_token() {
    let app = spawn_app().await;

    let response = app
        .api_client
        .get(format!("{}/v1/admin/newsletters", &app.address))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status().as_u16(), 401);
}
