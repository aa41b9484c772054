use crate::helpers::{
    accept_all_emails, newsletter_payload, spawn_app, spawn_app_with_batch_size,
};
use linkify::{LinkFinder, LinkKind};
use serde_json::Value;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn newsletters_are_delivered_to_every_subscriber() {
    let app = spawn_app().await;
    app.seed_subscribers(3);
    accept_all_emails(&app, 3).await;

    let response = app.publish_newsletter(&newsletter_payload()).await;

    assert_eq!(response.status().as_u16(), 200);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["total_recipients"], 3);
    assert_eq!(outcome["sent"], 3);
    assert_eq!(outcome["failed"], 0);
    assert_eq!(outcome["remaining"], 0);
    assert_eq!(outcome["estimated_days"], 0);
}

#[tokio::test]
async fn first_batch_never_exceeds_the_batch_size() {
    let app = spawn_app_with_batch_size(2).await;
    let subscribers = app.seed_subscribers(5);
    accept_all_emails(&app, 2).await;

    let response = app.publish_newsletter(&newsletter_payload()).await;

    assert_eq!(response.status().as_u16(), 200);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["sent"], 2);
    assert_eq!(outcome["remaining"], 3);
    assert_eq!(outcome["estimated_days"], 2);

    // oldest subscribers go first
    let recipients: Vec<_> = app
        .sent_emails()
        .await
        .iter()
        .map(|email| email["To"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(
        recipients,
        vec![subscribers[0].email.clone(), subscribers[1].email.clone()]
    );
}

#[tokio::test]
async fn newsletters_returns_400_for_invalid_data() {
    let app = spawn_app().await;
    app.seed_subscribers(1);
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.email_server)
        .await;

    let invalid_cases = vec![
        (serde_json::json!({ "body": "Hello" }), "missing title"),
        (serde_json::json!({ "title": "Hello" }), "missing body"),
        (
            serde_json::json!({ "title": "   ", "body": "Hello" }),
            "blank title",
        ),
        (
            serde_json::json!({ "title": "Hello\r\nBcc: x@example.com", "body": "Hello" }),
            "title with a line break",
        ),
        (
            serde_json::json!({ "title": "Hello", "body": "  \n " }),
            "blank body",
        ),
        (
            serde_json::json!({ "title": "Hello", "body": "Hi", "referenced_item_ids": ["nope"] }),
            "malformed referenced item id",
        ),
    ];

    for (invalid_body, desc) in invalid_cases {
        let response = app.publish_newsletter(&invalid_body).await;
        assert_eq!(
            400,
            response.status().as_u16(),
            "Did not return 400 when payload was {desc}"
        );
    }
    assert_eq!(app.store.campaign_count(), 0);
}

#[tokio::test]
async fn newsletters_returns_422_without_subscribers() {
    let app = spawn_app().await;

    let response = app.publish_newsletter(&newsletter_payload()).await;

    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(app.store.campaign_count(), 0);
}

#[tokio::test]
async fn publishing_requires_the_admin_token() {
    let app = spawn_app().await;
    app.seed_subscribers(2);
    accept_all_emails(&app, 0).await;

    let wrong_token = app
        .publish_newsletter_with_token(&newsletter_payload(), "not-the-admin-token")
        .await;
    let no_token = app
        .api_client
        .post(format!("{}/v1/admin/newsletters", &app.address))
        .json(&newsletter_payload())
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(wrong_token.status().as_u16(), 401);
    assert_eq!(no_token.status().as_u16(), 401);
    assert_eq!(app.store.campaign_count(), 0);
}

#[tokio::test]
async fn rejected_emails_are_counted_as_failed() {
    let app = spawn_app().await;
    app.seed_subscribers(2);
    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "ErrorCode": 406,
            "Message": "Inactive recipient"
        })))
        .expect(2)
        .mount(&app.email_server)
        .await;

    let response = app.publish_newsletter(&newsletter_payload()).await;

    assert_eq!(response.status().as_u16(), 200);
    let outcome: Value = response.json().await.unwrap();
    assert_eq!(outcome["sent"], 0);
    assert_eq!(outcome["failed"], 2);
    assert_eq!(outcome["remaining"], 0);

    let campaign: Value = app
        .get_campaign(outcome["campaign_id"].as_str().unwrap())
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(campaign["status"], "completed");
    assert_eq!(campaign["failed_count"], 2);
}

#[tokio::test]
async fn every_email_carries_an_unsubscribe_link_for_its_recipient() {
    let app = spawn_app().await;
    app.seed_subscribers(2);
    accept_all_emails(&app, 2).await;

    app.publish_newsletter(&newsletter_payload())
        .await
        .error_for_status()
        .unwrap();

    for email in app.sent_emails().await {
        let recipient = email["To"].as_str().unwrap();
        let links: Vec<_> = LinkFinder::new()
            .links(email["TextBody"].as_str().unwrap())
            .filter(|l| *l.kind() == LinkKind::Url)
            .collect();
        assert_eq!(links.len(), 1);

        let link = reqwest::Url::parse(links[0].as_str()).unwrap();
        assert_eq!(link.host_str().unwrap(), "127.0.0.1");
        assert_eq!(link.path(), "/v1/newsletters/unsubscribe");
        let (_, email_param) = link.query_pairs().next().unwrap();
        assert_eq!(email_param, recipient);
        assert!(email["HtmlBody"].as_str().unwrap().contains("Unsubscribe"));
    }
}

#[tokio::test]
async fn referenced_posts_are_linked_from_the_email() {
    let app = spawn_app().await;
    app.seed_subscribers(1);
    let post = app.seed_post("Ownership in practice");
    accept_all_emails(&app, 1).await;

    let mut payload = newsletter_payload();
    payload["referenced_item_ids"] = serde_json::json!([post.id]);
    app.publish_newsletter(&payload)
        .await
        .error_for_status()
        .unwrap();

    let emails = app.sent_emails().await;
    let html = emails[0]["HtmlBody"].as_str().unwrap();
    assert!(html.contains("Ownership in practice"));
    assert!(html.contains(&format!("/v1/post/{}", post.id)));
}

#[tokio::test]
async fn rich_text_bodies_are_rendered_as_html() {
    let app = spawn_app().await;
    app.seed_subscribers(1);
    accept_all_emails(&app, 1).await;

    let payload = serde_json::json!({
        "title": "Weekly digest",
        "body": r#"{"ops":[{"insert":"Big news","attributes":{"bold":true}},{"insert":"\n"}]}"#,
    });
    app.publish_newsletter(&payload)
        .await
        .error_for_status()
        .unwrap();

    let emails = app.sent_emails().await;
    assert_eq!(emails[0]["Subject"], "Weekly digest");
    assert!(
        emails[0]["HtmlBody"]
            .as_str()
            .unwrap()
            .contains("<p><strong>Big news</strong></p>")
    );
    assert!(emails[0]["TextBody"].as_str().unwrap().contains("Big news"));
}
