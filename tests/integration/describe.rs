//! Successful calls through the full stack.

use super::common::{client_for, widgets_shape, WIDGETS};
use aws_query::client::{ClientConfig, ExecuteOptions, Fetched, Params, QueryClient};
use aws_query::xml::{SimpleParser, SimpleResult, TreeParser};
use serde::Deserialize;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct Widget {
    widget_id: String,
    name: String,
}

#[tokio::test]
async fn test_describe_widgets_simple() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("Action", "DescribeWidgets"))
        .and(query_param("Version", "2012-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WIDGETS))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, ClientConfig::builder());
    let result = client
        .execute_simple("DescribeWidgets", Params::new(), &widgets_shape(), &ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(
        result.request_id(),
        Some("8f6a1a4e-0000-4000-8000-000000000001")
    );
    let widgets: Vec<Widget> = result.into_typed().unwrap();
    assert_eq!(widgets.len(), 2);
    assert_eq!(widgets[0].widget_id, "1");
    assert_eq!(widgets[1].widget_id, "2");
    assert_eq!(widgets[1].name, "right");
}

#[tokio::test]
async fn test_describe_widgets_tree() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WIDGETS))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, ClientConfig::builder());
    let root = client
        .execute("DescribeWidgets", Params::new(), TreeParser::new(), &ExecuteOptions::new())
        .await
        .unwrap();

    let members = root
        .at("describe_widgets_response/describe_widgets_result/widgets/member")
        .unwrap();
    assert!(members.is_many());
    let ids: Vec<_> = members
        .as_slice()
        .iter()
        .filter_map(|m| m.child_text("widget_id"))
        .collect();
    assert_eq!(ids, vec!["1", "2"]);
}

#[tokio::test]
async fn test_cached_call_reports_unchanged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WIDGETS))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server, ClientConfig::builder().with_caching(true));

    assert!(matches!(fetch_widgets(&client).await, Fetched::Fresh(_)));
    assert!(matches!(fetch_widgets(&client).await, Fetched::Unchanged { hits: 1, .. }));
    assert!(matches!(fetch_widgets(&client).await, Fetched::Unchanged { hits: 2, .. }));
}

async fn fetch_widgets(client: &QueryClient) -> Fetched<SimpleResult> {
    client
        .execute_cached(
            "DescribeWidgets",
            Params::new(),
            SimpleParser::new(widgets_shape()),
            &ExecuteOptions::new(),
        )
        .await
        .unwrap()
}
