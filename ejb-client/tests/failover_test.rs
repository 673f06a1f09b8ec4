//! Integration tests for connection failover and cluster-view updates.

mod common;

use common::{drain_events, mock_client, server, MockServer};
use ejb_client::core::protocol::{
    ClusterResponse, JndiMethod, JndiRequest, JndiResponse, Request, Response,
};
use ejb_client::{ClientConfig, ClientEvent, ClusterMetaData, EjbError, Value};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

fn naming_server() -> std::sync::Arc<MockServer> {
    MockServer::new(|location, request| match request {
        Request::Jndi(_) => Some(Response::Jndi(JndiResponse::Ok(Value::from(
            location.host_str().unwrap_or_default(),
        )))),
        Request::Cluster(_) => Some(Response::Cluster(ClusterResponse::Current)),
        _ => None,
    })
}

fn lookup() -> JndiRequest {
    JndiRequest::new(JndiMethod::Lookup, "anything")
}

fn answered_by(response: Response) -> String {
    match response {
        Response::Jndi(JndiResponse::Ok(value)) => value.as_str().unwrap_or_default().to_string(),
        other => panic!("unexpected response {:?}", other),
    }
}

#[tokio::test]
async fn test_round_robin_fails_over_to_third_member() {
    let mock = naming_server();
    mock.take_down("a");
    mock.take_down("b");
    let client = mock_client(ClientConfig::default(), &mock);
    let mut events = client.subscribe();

    let target = server("failover:round-robin:mock://a,mock://b,mock://c");
    let response = client.execute(&target, lookup()).await.unwrap();

    assert_eq!(answered_by(response), "c");
    assert_eq!(
        mock.connects(),
        vec![url("mock://a"), url("mock://b"), url("mock://c")]
    );

    let selections: Vec<_> = drain_events(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            ClientEvent::FailoverSelection {
                candidate,
                abandoned,
                ..
            } => Some((abandoned, candidate)),
            _ => None,
        })
        .collect();
    assert_eq!(
        selections,
        vec![
            (url("mock://a"), url("mock://b")),
            (url("mock://b"), url("mock://c")),
        ]
    );
}

#[tokio::test]
async fn test_unreachable_http_member_fails_over() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    let dead = url(&format!("http://127.0.0.1:{}/ejb", port));

    let mock = naming_server();
    let client = mock_client(ClientConfig::default(), &mock);
    let mut events = client.subscribe();
    let target = server(&format!("failover:round-robin:{},mock://c", dead));

    let response = client.execute(&target, lookup()).await.unwrap();
    assert_eq!(answered_by(response), "c");
    assert_eq!(mock.connects(), vec![url("mock://c")]);
    assert_eq!(client.connection_manager().failed_locations(), vec![dead.clone()]);

    let events = drain_events(&mut events);
    assert!(events.iter().any(|event| matches!(
        event,
        ClientEvent::ConnectionFailed { location, .. } if *location == dead
    )));
    let selection = events
        .into_iter()
        .find_map(|event| match event {
            ClientEvent::FailoverSelection {
                candidate,
                abandoned,
                failed,
                ..
            } => Some((abandoned, candidate, failed)),
            _ => None,
        })
        .unwrap();
    assert_eq!(selection, (dead.clone(), url("mock://c"), vec![dead]));
}

#[tokio::test]
async fn test_known_failed_members_are_skipped() {
    let mock = naming_server();
    mock.take_down("a");
    let client = mock_client(ClientConfig::default(), &mock);
    let target = server("failover:round-robin:mock://a,mock://b");

    client.execute(&target, lookup()).await.unwrap();
    assert!(client.connection_manager().is_failed(&url("mock://a")));

    for _ in 0..3 {
        let response = client.execute(&target, lookup()).await.unwrap();
        assert_eq!(answered_by(response), "b");
    }
    let attempts_on_a = mock
        .connects()
        .iter()
        .filter(|u| u.host_str() == Some("a"))
        .count();
    assert_eq!(attempts_on_a, 1);
}

#[tokio::test]
async fn test_sticky_prefers_last_successful_member() {
    let mock = naming_server();
    mock.take_down("a");
    let client = mock_client(ClientConfig::default(), &mock);
    let target = server("failover:sticky:mock://a,mock://b,mock://c");

    let first = answered_by(client.execute(&target, lookup()).await.unwrap());
    assert_ne!(first, "a");

    mock.bring_up("a");
    client.connection_manager().clear_failed();
    for _ in 0..3 {
        let again = answered_by(client.execute(&target, lookup()).await.unwrap());
        assert_eq!(again, first);
    }
}

#[tokio::test]
async fn test_all_members_down_exhausts() {
    let mock = naming_server();
    for host in ["a", "b"] {
        mock.take_down(host);
    }
    let client = mock_client(ClientConfig::default(), &mock);
    let target = server("failover:mock://a,mock://b");

    let err = client.execute(&target, lookup()).await.unwrap_err();
    assert!(matches!(err, EjbError::ExhaustedAllServers(_)));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_single_location_is_its_own_last_resort() {
    let mock = naming_server();
    mock.take_down("solo");
    let client = mock_client(ClientConfig::default(), &mock);
    let target = server("mock://solo");

    assert!(client.execute(&target, lookup()).await.is_err());

    mock.bring_up("solo");
    let response = client.execute(&target, lookup()).await.unwrap();
    assert_eq!(answered_by(response), "solo");
    assert!(!client.connection_manager().is_failed(&url("mock://solo")));
}

#[tokio::test]
async fn test_piggybacked_cluster_update_is_merged() {
    let mock = naming_server();
    let client = mock_client(ClientConfig::default(), &mock);
    let mut events = client.subscribe();
    let target = server("mock://a");

    mock.push_cluster(ClusterResponse::Updated(ClusterMetaData::new(
        7,
        vec![url("mock://a"), url("mock://b")],
    )));
    client.execute(&target, lookup()).await.unwrap();

    let cluster = client.cluster(&target).unwrap();
    assert_eq!(cluster.version(), 7);
    assert_eq!(cluster.locations().len(), 2);
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        ClientEvent::ClusterMetaDataUpdated { version: 7, members: 2, .. }
    )));

    client.execute(&target, lookup()).await.unwrap();
    let versions: Vec<i64> = mock.received().iter().map(|r| r.cluster_version).collect();
    assert_eq!(versions, vec![0, 7]);
}

#[tokio::test]
async fn test_updated_view_routes_around_dead_member() {
    let mock = naming_server();
    let client = mock_client(ClientConfig::default(), &mock);
    let target = server("mock://a");

    mock.push_cluster(ClusterResponse::Updated(
        ClusterMetaData::new(2, vec![url("mock://a"), url("mock://b")]).with_strategy("round-robin"),
    ));
    client.execute(&target, lookup()).await.unwrap();

    mock.take_down("a");
    let response = client.execute(&target, lookup()).await.unwrap();
    assert_eq!(answered_by(response), "b");
}

#[tokio::test]
async fn test_refresh_cluster_sends_cached_version() {
    let mock = MockServer::new(|_, request| match request {
        Request::Cluster(cluster) if cluster.version < 3 => Some(Response::Cluster(
            ClusterResponse::Updated(ClusterMetaData::new(3, vec![Url::parse("mock://a").unwrap()])),
        )),
        Request::Cluster(_) => Some(Response::Cluster(ClusterResponse::Current)),
        _ => None,
    });
    let client = mock_client(ClientConfig::default(), &mock);
    let target = server("mock://a");

    assert!(client.refresh_cluster(&target).await.unwrap());
    assert!(!client.refresh_cluster(&target).await.unwrap());
    let sent: Vec<i64> = mock
        .received()
        .iter()
        .filter_map(|r| match &r.request {
            Request::Cluster(c) => Some(c.version),
            _ => None,
        })
        .collect();
    assert_eq!(sent, vec![0, 3]);
}

#[tokio::test]
async fn test_mismatched_response_kind_is_protocol_error() {
    let mock = MockServer::new(|_, _| Some(Response::Cluster(ClusterResponse::Current)));
    let client = mock_client(ClientConfig::default(), &mock);

    let err = client
        .execute(&server("mock://a"), lookup())
        .await
        .unwrap_err();
    assert!(matches!(err, EjbError::Protocol(_)));
}
