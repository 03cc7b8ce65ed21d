//! Connection modes over reqwest.

use super::common::{client_for, WIDGETS};
use aws_query::client::{ClientConfig, ConnectionMode, ExecuteOptions, Params, WorkerKey};
use aws_query::xml::TreeParser;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn widgets_server() -> MockServer {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(WIDGETS))
        .mount(&mock_server)
        .await;
    mock_server
}

#[tokio::test]
async fn test_per_worker_connections() {
    let mock_server = widgets_server().await;
    let client = client_for(
        &mock_server,
        ClientConfig::builder().with_connection_mode(ConnectionMode::PerWorker),
    );

    for name in ["a", "b", "a"] {
        client
            .execute(
                "DescribeWidgets",
                Params::new(),
                TreeParser::new(),
                &ExecuteOptions::new().with_worker(WorkerKey::named(name)),
            )
            .await
            .unwrap();
    }

    assert_eq!(client.open_connections(), 2);
    assert!(client.close_connection(Some(&WorkerKey::named("a"))));
    assert_eq!(client.open_connections(), 1);
    client.close_all_connections();
    assert_eq!(client.open_connections(), 0);
}

#[tokio::test]
async fn test_single_connection_shared_by_tasks() {
    let mock_server = widgets_server().await;
    let client = client_for(
        &mock_server,
        ClientConfig::builder().with_connection_mode(ConnectionMode::Single),
    );

    let tasks: Vec<_> = (0..4)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .execute(
                        "DescribeWidgets",
                        Params::new(),
                        TreeParser::new(),
                        &ExecuteOptions::new().with_worker(WorkerKey::named(format!("task-{i}"))),
                    )
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(client.open_connections(), 1);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_per_request_keeps_nothing_open() {
    let mock_server = widgets_server().await;
    let client = client_for(&mock_server, ClientConfig::builder());

    client
        .execute("DescribeWidgets", Params::new(), TreeParser::new(), &ExecuteOptions::new())
        .await
        .unwrap();

    assert_eq!(client.open_connections(), 0);
}
