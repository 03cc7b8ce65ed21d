//! Redirect handling across two mock hosts.

use std::time::Duration;

use super::common::{client_for, WIDGETS};
use aws_query::client::{ClientConfig, ExecuteOptions, Params, RetryConfig};
use aws_query::xml::TreeParser;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_redirect_to_other_host() {
    let origin = MockServer::start().await;
    let target = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", format!("{}/", target.uri()).as_str()),
        )
        .expect(1)
        .mount(&origin)
        .await;

    Mock::given(method("GET"))
        .and(query_param("Action", "DescribeWidgets"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WIDGETS))
        .expect(1)
        .mount(&target)
        .await;

    let client = client_for(&origin, ClientConfig::builder());
    let root = client
        .execute(
            "DescribeWidgets",
            Params::new(),
            TreeParser::new(),
            &ExecuteOptions::new().with_retries(0),
        )
        .await
        .unwrap();

    assert!(root.child("describe_widgets_response").is_some());
}

#[tokio::test]
async fn test_redirect_loop_fails() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(307)
                .insert_header("Location", format!("{}/", mock_server.uri()).as_str()),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(
        &mock_server,
        ClientConfig::builder().with_retry(
            RetryConfig::default()
                .with_reiteration_time(Duration::from_secs(2))
                .with_max_redirects(5),
        ),
    );
    let err = client
        .execute("DescribeWidgets", Params::new(), TreeParser::new(), &ExecuteOptions::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(307));
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 6);
}
