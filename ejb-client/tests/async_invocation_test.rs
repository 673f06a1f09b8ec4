//! Integration tests for asynchronous business methods and their pool.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{drain_events, mock_client, MockServer};
use ejb_client::core::protocol::{
    Argument, EjbRequest, EjbResponse, JndiResponse, Request, RequestMethod, Response,
};
use ejb_client::security::with_identity;
use ejb_client::{
    ClientConfigBuilder, ClientEvent, ComponentType, EjbClient, EjbMetaData, EjbObject,
    InterfaceDescriptor, InvocationError, MethodDescriptor, MethodSignature, Value,
};
use url::Url;

const REPORTS: &str = "org.acme.Reports";

fn reports_meta() -> EjbMetaData {
    EjbMetaData::new(ComponentType::Stateless, "Reports")
        .with_business_interface(REPORTS)
        .with_asynchronous_method(MethodSignature::new(REPORTS, "archive", ["int"]))
}

fn reply(request: &EjbRequest) -> EjbResponse {
    match request.method {
        RequestMethod::ObjectBusinessMethod => match request.arguments.first() {
            Some(Argument::Int(n)) => EjbResponse::Ok(Value::Int(n * 10)),
            _ => EjbResponse::Ok(Value::Null),
        },
        RequestMethod::FutureCancel => EjbResponse::Ok(Value::Bool(true)),
        _ => EjbResponse::Ok(Value::Null),
    }
}

fn container(_: &Url, request: &Request) -> Option<Response> {
    match request {
        Request::Jndi(_) => Some(Response::Jndi(JndiResponse::BusinessObject(
            reports_meta(),
            Value::Null,
        ))),
        Request::Ejb(request) => Some(Response::Ejb(reply(request))),
        _ => None,
    }
}

/// One worker, one queue slot, short offer timeout.
fn setup() -> (Arc<MockServer>, EjbClient) {
    let mock = MockServer::gated(container);
    let config = ClientConfigBuilder::new()
        .provider_url("mock://container")
        .async_pool(|p| {
            p.core_threads(1)
                .max_threads(1)
                .queue_size(1)
                .offer_timeout(Duration::from_millis(20))
        })
        .build()
        .unwrap();
    let client = mock_client(config, &mock);
    client.register_interface(
        InterfaceDescriptor::business(REPORTS)
            .with_method(MethodDescriptor::new("generate", ["int"]).asynchronous())
            .with_method(MethodDescriptor::new("archive", ["int"]))
            .with_method(MethodDescriptor::new("count", Vec::<String>::new())),
    );
    (mock, client)
}

async fn reports(client: &EjbClient) -> EjbObject {
    let context = client.initial_context().await.unwrap();
    context.lookup_object("Reports").await.unwrap()
}

fn business_calls(mock: &MockServer) -> Vec<EjbRequest> {
    mock.invocations()
        .into_iter()
        .filter(|r| r.method == RequestMethod::ObjectBusinessMethod)
        .collect()
}

#[tokio::test]
async fn test_async_result_is_delivered() {
    let (mock, client) = setup();
    let reports = reports(&client).await;
    mock.open_gate(1);

    let pending = reports.invoke_async("generate", vec![Value::from(4)]).await.unwrap();
    let request_id = pending.request_id().to_string();
    assert_eq!(pending.get().await.unwrap(), Value::Int(40));

    let sent = business_calls(&mock);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].request_id.as_deref(), Some(request_id.as_str()));
}

#[tokio::test]
async fn test_async_call_carries_scoped_identity() {
    let (mock, client) = setup();
    let reports = reports(&client).await;
    mock.open_gate(2);

    let pending = with_identity(
        Value::from("alice"),
        reports.invoke_async("generate", vec![Value::from(1)]),
    )
    .await
    .unwrap();
    assert_eq!(pending.get().await.unwrap(), Value::Int(10));

    let unscoped = reports.invoke_async("generate", vec![Value::from(2)]).await.unwrap();
    assert_eq!(unscoped.get().await.unwrap(), Value::Int(20));

    let sent = business_calls(&mock);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].client_identity, Value::from("alice"));
    assert!(sent[1].client_identity.is_null());
}

#[tokio::test]
async fn test_cancel_before_dispatch_never_reaches_server() {
    let (mock, client) = setup();
    let reports = reports(&client).await;
    let baseline = mock.request_count();

    let running = reports.invoke_async("generate", vec![Value::from(1)]).await.unwrap();
    mock.wait_for_requests(baseline + 1).await;
    let queued = reports.invoke_async("generate", vec![Value::from(2)]).await.unwrap();

    assert!(queued.cancel(false).await.unwrap());
    assert!(queued.is_cancelled());
    assert!(queued.is_done());
    let queued_id = queued.request_id().to_string();
    assert!(matches!(queued.get().await, Err(InvocationError::Cancelled)));

    mock.open_gate(1);
    assert_eq!(running.get().await.unwrap(), Value::Int(10));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let sent = business_calls(&mock);
    assert_eq!(sent.len(), 1);
    assert!(sent
        .iter()
        .all(|r| r.request_id.as_deref() != Some(queued_id.as_str())));
    assert!(mock
        .invocations()
        .iter()
        .all(|r| r.method != RequestMethod::FutureCancel));
}

#[tokio::test]
async fn test_cancel_after_dispatch_asks_server() {
    let (mock, client) = setup();
    let reports = reports(&client).await;
    let baseline = mock.request_count();

    let running = reports.invoke_async("generate", vec![Value::from(3)]).await.unwrap();
    mock.wait_for_requests(baseline + 1).await;

    assert!(running.cancel(true).await.unwrap());
    assert!(running.is_cancelled());

    let cancel = mock
        .invocations()
        .into_iter()
        .find(|r| r.method == RequestMethod::FutureCancel)
        .unwrap();
    assert_eq!(cancel.request_id.as_deref(), Some(running.request_id()));
    assert_eq!(cancel.arguments, vec![Argument::Boolean(true)]);

    mock.open_gate(1);
    assert!(matches!(running.get().await, Err(InvocationError::Cancelled)));
}

#[tokio::test]
async fn test_finished_call_cannot_be_cancelled() {
    let (mock, client) = setup();
    let reports = reports(&client).await;
    mock.open_gate(1);

    let pending = reports.invoke_async("generate", vec![Value::from(5)]).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !pending.is_done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    assert!(!pending.cancel(true).await.unwrap());
    assert_eq!(pending.get().await.unwrap(), Value::Int(50));
}

#[tokio::test]
async fn test_saturated_pool_rejects_submission() {
    let (mock, client) = setup();
    let mut events = client.subscribe();
    let reports = reports(&client).await;
    let baseline = mock.request_count();

    let running = reports.invoke_async("generate", vec![Value::from(1)]).await.unwrap();
    mock.wait_for_requests(baseline + 1).await;
    let queued = reports.invoke_async("generate", vec![Value::from(2)]).await.unwrap();

    let err = reports
        .invoke_async("generate", vec![Value::from(3)])
        .await
        .unwrap_err();
    assert!(matches!(err, InvocationError::Ejb { .. }));
    assert!(reports.is_valid());
    assert!(drain_events(&mut events)
        .iter()
        .any(|e| matches!(e, ClientEvent::AsyncTaskRejected { .. })));

    mock.open_gate(2);
    assert_eq!(running.get().await.unwrap(), Value::Int(10));
    assert_eq!(queued.get().await.unwrap(), Value::Int(20));
}

#[tokio::test]
async fn test_metadata_flag_makes_method_asynchronous() {
    let (mock, client) = setup();
    let reports = reports(&client).await;
    mock.open_gate(1);

    let pending = reports.invoke_async("archive", vec![Value::from(7)]).await.unwrap();
    assert_eq!(pending.get().await.unwrap(), Value::Int(70));
}

#[tokio::test]
async fn test_invoke_waits_for_asynchronous_method() {
    let (mock, client) = setup();
    let reports = reports(&client).await;
    mock.open_gate(1);

    let value = reports.invoke("generate", vec![Value::from(6)]).await.unwrap();
    assert_eq!(value, Value::Int(60));
    assert!(business_calls(&mock)[0].request_id.is_some());
}

#[tokio::test]
async fn test_synchronous_method_cannot_be_submitted() {
    let (mock, client) = setup();
    let reports = reports(&client).await;

    let err = reports.invoke_async("count", vec![]).await.unwrap_err();
    assert!(matches!(err, InvocationError::Unsupported(_)));
    assert!(business_calls(&mock).is_empty());
}
