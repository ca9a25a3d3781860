//! End-to-end tests: a real server on 127.0.0.1:0 called through the client.

use futures::{SinkExt, StreamExt};
use nexrpc_api::demo::{ByeServiceImpl, HelloServiceImpl, HELLO_REPLY};
use nexrpc_api::{
    ByeService, ByeServiceServer, HelloObject, HelloService, HelloServiceClient,
    HelloServiceServer,
};
use nexrpc_client::{ClientConfig, ClientProxy, RpcClient};
use nexrpc_common::transport::{Frame, FrameCodec, Message, Serializer};
use nexrpc_common::{rpc_service, Argument, ErrorKind, Request, Result, RpcError, StatusCode};
use nexrpc_discovery::{InMemoryRegistry, RegistryBackend};
use nexrpc_server::{RpcServer, RunningServer, ServerConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

rpc_service! {
    service SlowService {
        name = "test.SlowService";
        client = SlowServiceClient;
        server = SlowServiceServer;

        fn wait(&self, millis: u64) -> u64;
        fn fail(&self, reason: String) -> String;
        fn crash(&self) -> String;
    }
}

struct SlowImpl;

impl SlowService for SlowImpl {
    fn wait(&self, millis: u64) -> Result<u64> {
        std::thread::sleep(Duration::from_millis(millis));
        Ok(millis)
    }

    fn fail(&self, reason: String) -> Result<String> {
        Err(RpcError::InvalidRequest(reason))
    }

    fn crash(&self) -> Result<String> {
        panic!("service crashed")
    }
}

async fn start_server(
    config: ServerConfig,
    registry: Arc<InMemoryRegistry>,
) -> RunningServer {
    let server = RpcServer::new(config, registry);
    server.publish(HelloServiceServer::new(HelloServiceImpl));
    server.publish(ByeServiceServer::new(ByeServiceImpl));
    server.publish(SlowServiceServer::new(SlowImpl));
    server.start().await.unwrap()
}

async fn demo_server() -> (RunningServer, Arc<InMemoryRegistry>) {
    let registry = Arc::new(InMemoryRegistry::new());
    let running = start_server(ServerConfig::new("127.0.0.1:0"), registry.clone()).await;
    (running, registry)
}

fn client(registry: Arc<InMemoryRegistry>, serializer: Serializer) -> Arc<RpcClient> {
    let config = ClientConfig {
        serializer,
        call_timeout: Duration::from_secs(5),
        ..ClientConfig::default()
    };
    Arc::new(RpcClient::new(config, registry))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hello_through_proxy() {
    let (running, registry) = demo_server().await;
    let proxy = ClientProxy::current(client(registry, Serializer::Bincode)).unwrap();

    let reply = tokio::task::spawn_blocking(move || {
        HelloServiceClient::new(proxy).hello(HelloObject::new(12, "This is a message"))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(reply, HELLO_REPLY);
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_response_correlates_with_request() {
    let (running, registry) = demo_server().await;
    let client = client(registry, Serializer::Bincode);

    let arg = Argument::encode(Serializer::Bincode, &HelloObject::new(12, "This is a message"))
        .unwrap();
    let request = Request::new(HelloServiceServer::<HelloServiceImpl>::SERVICE_NAME, "hello", vec![arg]);
    let response = client.send_request(&request).await.unwrap();

    assert_eq!(response.status(), StatusCode::Success);
    assert_eq!(response.request_id, request.request_id);
    let reply: String = Serializer::Bincode
        .deserialize(&response.data.unwrap())
        .unwrap();
    assert_eq!(reply, HELLO_REPLY);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_every_serializer_is_echoed() {
    let (running, registry) = demo_server().await;

    for serializer in Serializer::ALL {
        let client = client(registry.clone(), serializer);
        let arg = Argument::encode(serializer, &"ann".to_string()).unwrap();
        let data = client
            .invoke("nexrpc.api.ByeService", "bye", vec![arg])
            .await
            .unwrap();
        let reply: String = serializer.deserialize(&data).unwrap();
        assert_eq!(reply, "bye, ann", "serializer {}", serializer);
    }

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_service_is_class_not_found() {
    let (running, registry) = demo_server().await;
    // the directory resolves the name, the server does not bind it
    registry
        .register("test.Unbound", running.endpoint())
        .await
        .unwrap();
    let client = client(registry, Serializer::Json);

    let request = Request::new("test.Unbound", "hello", vec![]);
    let response = client.send_request(&request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ClassNotFound);

    match client.call(request).await {
        Err(RpcError::Invocation { status, .. }) => assert_eq!(status, StatusCode::ClassNotFound),
        other => panic!("expected invocation failure, got {:?}", other),
    }

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_unknown_method_is_method_not_found() {
    let (running, registry) = demo_server().await;
    let client = client(registry, Serializer::Json);

    let request = Request::new("nexrpc.api.HelloService", "wave", vec![]);
    let response = client.send_request(&request).await.unwrap();
    assert_eq!(response.status(), StatusCode::MethodNotFound);

    // right name, wrong parameter types
    let arg = Argument::encode(Serializer::Json, &7i32).unwrap();
    let request = Request::new("nexrpc.api.ByeService", "bye", vec![arg]);
    let response = client.send_request(&request).await.unwrap();
    assert_eq!(response.status(), StatusCode::MethodNotFound);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_failing_method_keeps_connection() {
    let (running, registry) = demo_server().await;
    let client = client(registry, Serializer::Json);

    let arg = Argument::encode(Serializer::Json, &"nope".to_string()).unwrap();
    let err = client
        .invoke("test.SlowService", "fail", vec![arg])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invocation);
    assert!(err.to_string().contains("nope"));

    let err = client
        .invoke("test.SlowService", "crash", vec![])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invocation);

    let arg = Argument::encode(Serializer::Json, &"bob".to_string()).unwrap();
    let data = client
        .invoke("nexrpc.api.ByeService", "bye", vec![arg])
        .await
        .unwrap();
    assert_eq!(Serializer::Json.deserialize::<String>(&data).unwrap(), "bye, bob");
    assert_eq!(client.connections().connection_count().await, 1);

    running.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_connection() {
    let (running, registry) = demo_server().await;
    let client = client(registry, Serializer::Postcard);
    let started = Instant::now();

    // later calls finish first
    let calls: Vec<_> = (0..6u64)
        .map(|i| {
            let client = client.clone();
            tokio::spawn(async move {
                let millis = 300 - i * 40;
                let arg = Argument::encode(Serializer::Postcard, &millis).unwrap();
                let data = client
                    .invoke("test.SlowService", "wait", vec![arg])
                    .await
                    .unwrap();
                (millis, Serializer::Postcard.deserialize::<u64>(&data).unwrap())
            })
        })
        .collect();

    for call in calls {
        let (sent, received) = call.await.unwrap();
        assert_eq!(sent, received);
    }

    assert!(started.elapsed() < Duration::from_millis(1200));
    assert_eq!(client.connections().connection_count().await, 1);
    assert!(client.pending().is_empty());
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_deregisters_services() {
    let (running, registry) = demo_server().await;
    let endpoint = running.endpoint().clone();
    assert_eq!(
        registry.query("nexrpc.api.HelloService").await.unwrap(),
        vec![endpoint.clone()]
    );

    running.stop().await.unwrap();

    assert!(registry.query("nexrpc.api.HelloService").await.unwrap().is_empty());
    assert!(registry.query("test.SlowService").await.unwrap().is_empty());

    let err = client(registry, Serializer::Bincode)
        .invoke("nexrpc.api.HelloService", "hello", vec![])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ServiceNotFound);
}

#[tokio::test]
async fn test_duplicate_publish_keeps_first() {
    struct Other;

    impl ByeService for Other {
        fn bye(&self, _name: String) -> Result<String> {
            Ok("other".to_string())
        }
    }

    let registry = Arc::new(InMemoryRegistry::new());
    let server = RpcServer::new(ServerConfig::new("127.0.0.1:0"), registry.clone());
    assert!(server.publish(ByeServiceServer::new(ByeServiceImpl)));
    assert!(!server.publish(ByeServiceServer::new(Other)));
    assert!(server.publish_as("test.OtherBye", ByeServiceServer::new(Other)));
    let running = server.start().await.unwrap();

    let client = client(registry, Serializer::Json);
    let arg = || Argument::encode(Serializer::Json, &"x".to_string()).unwrap();

    let data = client
        .invoke("nexrpc.api.ByeService", "bye", vec![arg()])
        .await
        .unwrap();
    assert_eq!(Serializer::Json.deserialize::<String>(&data).unwrap(), "bye, x");

    let data = client.invoke("test.OtherBye", "bye", vec![arg()]).await.unwrap();
    assert_eq!(Serializer::Json.deserialize::<String>(&data).unwrap(), "other");

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_read_idle_closes_silent_connection() {
    let registry = Arc::new(InMemoryRegistry::new());
    let config = ServerConfig::new("127.0.0.1:0").with_read_idle(Some(Duration::from_millis(300)));
    let running = start_server(config, registry).await;

    let socket = TcpStream::connect(running.local_addr()).await.unwrap();
    let mut framed = Framed::new(socket, FrameCodec::new());

    let closed = tokio::time::timeout(Duration::from_secs(3), framed.next())
        .await
        .expect("server should close an idle connection");
    assert!(closed.is_none());

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_heartbeats_keep_connection_alive() {
    let registry = Arc::new(InMemoryRegistry::new());
    let config = ServerConfig::new("127.0.0.1:0").with_read_idle(Some(Duration::from_millis(300)));
    let running = start_server(config, registry).await;

    let socket = TcpStream::connect(running.local_addr()).await.unwrap();
    let mut framed = Framed::new(socket, FrameCodec::new());

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        framed
            .send(Frame::request(Serializer::Json, Request::heartbeat()))
            .await
            .unwrap();
    }

    // still open: a real request gets its answer, and heartbeats got none
    let arg = Argument::encode(Serializer::Json, &"hb".to_string()).unwrap();
    let request = Request::new("nexrpc.api.ByeService", "bye", vec![arg]);
    framed
        .send(Frame::request(Serializer::Json, request.clone()))
        .await
        .unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(2), framed.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(frame.serializer, Serializer::Json);
    match frame.message {
        Message::Response(response) => {
            assert_eq!(response.request_id, request.request_id);
            assert!(response.is_success());
        }
        other => panic!("expected response, got {:?}", other),
    }

    running.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_saturated_workers_queue_requests_on_the_socket() {
    let registry = Arc::new(InMemoryRegistry::new());
    let config = ServerConfig::new("127.0.0.1:0").with_max_workers(1);
    let running = start_server(config, registry).await;

    let socket = TcpStream::connect(running.local_addr()).await.unwrap();
    let mut framed = Framed::new(socket, FrameCodec::new());
    let started = Instant::now();

    let mut sent = Vec::new();
    for _ in 0..3 {
        let arg = Argument::encode(Serializer::Json, &150u64).unwrap();
        let request = Request::new("test.SlowService", "wait", vec![arg]);
        sent.push(request.request_id.clone());
        framed
            .send(Frame::request(Serializer::Json, request))
            .await
            .unwrap();
    }

    let mut answered = Vec::new();
    while answered.len() < sent.len() {
        let frame = tokio::time::timeout(Duration::from_secs(3), framed.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match frame.message {
            Message::Response(response) => {
                assert!(response.is_success());
                answered.push(response.request_id);
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    // one worker runs the calls one after another, in arrival order
    assert!(started.elapsed() >= Duration::from_millis(450));
    assert_eq!(answered, sent);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_protocol_violation_closes_connection() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (running, _registry) = demo_server().await;
    let mut socket = TcpStream::connect(running.local_addr()).await.unwrap();

    let mut garbage = Vec::new();
    for word in [0x0BAD_F00Du32, 0, 0, 0] {
        garbage.extend_from_slice(&word.to_be_bytes());
    }
    socket.write_all(&garbage).await.unwrap();

    let mut buf = [0u8; 16];
    let read = tokio::time::timeout(Duration::from_secs(2), socket.read(&mut buf))
        .await
        .unwrap();
    assert!(matches!(read, Ok(0) | Err(_)));

    running.stop().await.unwrap();
}

#[test]
fn test_blocking_proxy_from_plain_thread() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let registry = Arc::new(InMemoryRegistry::new());
    let running = runtime.block_on(start_server(ServerConfig::new("127.0.0.1:0"), registry.clone()));

    let proxy = ClientProxy::new(client(registry, Serializer::Json), runtime.handle().clone());
    let reply = std::thread::spawn(move || {
        nexrpc_api::ByeServiceClient::new(proxy).bye("thread".to_string())
    })
    .join()
    .unwrap()
    .unwrap();
    assert_eq!(reply, "bye, thread");

    runtime.block_on(running.stop()).unwrap();
}
