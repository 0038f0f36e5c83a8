use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::Context;
use switchboard_fabric::{
    codec::{BincodeCodec, JsonCodec},
    transport::{MemoryTransport, TcpTransport, TcpTransportListener},
    Codec,
};
use switchboard_rpc::{
    Connection, ConnectionConfig, HandlerError, Method, Protocol, Registry, RpcError, Server,
};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SessionArg {
    #[serde(rename = "sessionID")]
    session_id: i64,
}

const PING: Method<SessionArg, i64> = Method::call("svc.echo", "ping");
const NOTIFY_ONLY: Method<String> = Method::notify("svc.echo", "notifyOnly");
const SLOW: Method<i64, i64> = Method::call("svc.echo", "slow");
const WAIT: Method<i64, i64> = Method::call("svc.echo", "wait");
const PONG: Method<i64, i64> = Method::call("svc.echo", "pong");

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("switchboard_rpc=debug")
        .with_test_writer()
        .try_init();
}

/// Shared state the echo handlers report into
#[derive(Default)]
struct Tally {
    notified: AtomicUsize,
    cancelled: AtomicUsize,
    started: Notify,
}

fn echo_protocol<C: Codec>(tally: Arc<Tally>) -> Protocol<C> {
    let on_notify = tally.clone();
    let on_wait = tally;
    Protocol::new("svc.echo")
        .handle(&PING, |_ctx, arg: SessionArg| async move {
            Ok(arg.session_id)
        })
        .handle(&NOTIFY_ONLY, move |_ctx, text: String| {
            let tally = on_notify.clone();
            async move {
                tally.notified.fetch_add(1, Ordering::SeqCst);
                if text == "fail" {
                    return Err(HandlerError::new("refusing to log"));
                }
                Ok(())
            }
        })
        .handle(&SLOW, |_ctx, ms: i64| async move {
            tokio::time::sleep(Duration::from_millis(ms as u64)).await;
            Ok(ms)
        })
        .handle(&WAIT, move |ctx: Context, _n: i64| {
            let tally = on_wait.clone();
            async move {
                tally.started.notify_one();
                let reason = ctx.done().await;
                tally.cancelled.fetch_add(1, Ordering::SeqCst);
                Err::<i64, _>(reason.into())
            }
        })
}

fn registry<C: Codec>(tally: Arc<Tally>) -> Registry<C> {
    let mut registry = Registry::new();
    registry.register(echo_protocol(tally));
    registry
}

/// A serving connection on one end of an in-memory pipe and a calling one on the other
fn pair<C: Codec>(codec: C, config: ConnectionConfig) -> (Connection<C>, Connection<C>, Arc<Tally>) {
    let tally = Arc::new(Tally::default());
    let (a, b) = MemoryTransport::pair();
    let server = Connection::builder(codec.clone())
        .name("server")
        .registry(registry::<C>(tally.clone()))
        .spawn(a);
    let client = Connection::builder(codec)
        .name("client")
        .config(config)
        .spawn(b);
    (server, client, tally)
}

#[tokio::test]
async fn call_returns_handler_result() {
    init_tracing();
    let (_server, conn, _tally) = pair(BincodeCodec, ConnectionConfig::default());
    let client = conn.client();

    let n = client
        .invoke(&Context::background(), &PING, &SessionArg { session_id: 7 })
        .await
        .unwrap();
    assert_eq!(n, 7);
    assert_eq!(conn.stats().calls_sent(), 1);
}

#[tokio::test]
async fn json_wire_format_matches_dotted_names() {
    init_tracing();
    let (_server, conn, _tally) = pair(JsonCodec, ConnectionConfig::default());

    let raw = conn
        .call_raw(
            &Context::background(),
            "svc.echo.ping",
            br#"[{"sessionID":42}]"#.to_vec(),
        )
        .await
        .unwrap();
    assert_eq!(raw, b"42");
}

#[tokio::test]
async fn unknown_method_reaches_caller() {
    init_tracing();
    let (_server, conn, _tally) = pair(BincodeCodec, ConnectionConfig::default());

    let err = conn
        .client()
        .invoke(&Context::background(), &PONG, &1)
        .await
        .unwrap_err();
    match err {
        RpcError::UnknownMethod { protocol, method } => {
            assert_eq!(protocol, "svc.echo");
            assert_eq!(method, "pong");
        }
        other => panic!("expected UnknownMethod, got {:?}", other),
    }
}

#[tokio::test]
async fn wrong_argument_shape_reaches_caller() {
    init_tracing();
    let (_server, conn, _tally) = pair(JsonCodec, ConnectionConfig::default());

    let err = conn
        .client()
        .call::<_, i64>(&Context::background(), "svc.echo.ping", "not a session")
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::ArgumentType { method, .. } if method == "svc.echo.ping"));
}

#[derive(Serialize)]
struct SessionArgWithDevice {
    #[serde(rename = "sessionID")]
    session_id: i64,
    device: String,
}

#[tokio::test]
async fn bincode_rejects_wider_argument_shapes() {
    init_tracing();
    let (_server, conn, _tally) = pair(BincodeCodec, ConnectionConfig::default());
    let client = conn.client();

    let err = client
        .call::<_, i64>(
            &Context::background(),
            "svc.echo.ping",
            &SessionArgWithDevice {
                session_id: 3,
                device: "laptop".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::ArgumentType { method, .. } if method == "svc.echo.ping"));

    assert_eq!(
        client.invoke(&Context::background(), &SLOW, &1).await.unwrap(),
        1
    );
    // A string prefix reads as a valid i64, but its leftover bytes reject it
    let err = client
        .call::<_, i64>(&Context::background(), "svc.echo.slow", "1")
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::ArgumentType { .. }));
}

#[tokio::test]
async fn failing_notification_is_only_observed_locally() {
    init_tracing();
    let (server, conn, tally) = pair(BincodeCodec, ConnectionConfig::default());
    let client = conn.client();

    client
        .send(&Context::background(), &NOTIFY_ONLY, &"fail".to_string())
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while server.stats().notify_failures() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(tally.notified.load(Ordering::SeqCst), 1);

    // The connection is unaffected
    let n = client
        .invoke(&Context::background(), &PING, &SessionArg { session_id: 1 })
        .await
        .unwrap();
    assert_eq!(n, 1);
}

#[tokio::test]
async fn notify_does_not_wait_for_handler() {
    init_tracing();
    let (server, conn, _tally) = pair(BincodeCodec, ConnectionConfig::default());
    let client = conn.client();

    // Let a slow call occupy the server, then notify; the notify must not queue behind it
    let slow_client = client.clone();
    let slow = tokio::spawn(async move {
        slow_client
            .invoke(&Context::background(), &SLOW, &300)
            .await
    });

    tokio::time::timeout(
        Duration::from_millis(100),
        client.send(&Context::background(), &NOTIFY_ONLY, &"hello".to_string()),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(slow.await.unwrap().unwrap(), 300);
    assert_eq!(server.stats().notify_failures(), 0);
}

#[tokio::test]
async fn cancelled_call_returns_promptly_and_cancels_handler() {
    init_tracing();
    let (server, conn, tally) = pair(BincodeCodec, ConnectionConfig::default());
    let client = conn.client();

    let ctx = Context::background();
    let canceller = ctx.clone();
    let waiter = tally.clone();
    tokio::spawn(async move {
        waiter.started.notified().await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(1), client.invoke(&ctx, &WAIT, &1))
        .await
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, RpcError::Cancelled));
    assert_eq!(conn.pending_calls(), 0);

    tokio::time::timeout(Duration::from_secs(1), async {
        while tally.cancelled.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(1), async {
        while server.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn already_cancelled_context_never_sends() {
    init_tracing();
    let (server, conn, _tally) = pair(BincodeCodec, ConnectionConfig::default());
    let ctx = Context::background();
    ctx.cancel();

    let err = conn
        .client()
        .invoke(&ctx, &PING, &SessionArg { session_id: 1 })
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Cancelled));
    assert_eq!(conn.stats().calls_sent(), 0);
    assert_eq!(server.stats().calls_served(), 0);
}

#[tokio::test]
async fn call_timeout_expires() {
    init_tracing();
    let config = ConnectionConfig::new().call_timeout(Duration::from_millis(50));
    let (_server, conn, _tally) = pair(BincodeCodec, config);

    let err = conn
        .client()
        .invoke(&Context::background(), &SLOW, &5_000)
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::DeadlineExceeded));
}

#[tokio::test]
async fn closing_fails_pending_calls() {
    init_tracing();
    let (server, conn, tally) = pair(BincodeCodec, ConnectionConfig::default());
    let client = conn.client();

    let call = tokio::spawn(async move { client.invoke(&Context::background(), &WAIT, &1).await });
    tally.started.notified().await;
    server.close();

    let err = tokio::time::timeout(Duration::from_secs(1), call)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(matches!(
        err,
        RpcError::Transport(switchboard_fabric::Error::ConnectionClosed)
    ));
    tokio::time::timeout(Duration::from_secs(1), conn.closed())
        .await
        .unwrap();
}

#[tokio::test]
async fn concurrent_calls_are_correlated() {
    init_tracing();
    let (_server, conn, _tally) = pair(BincodeCodec, ConnectionConfig::default());

    let mut tasks = Vec::new();
    for i in 0..32i64 {
        let client = conn.client();
        tasks.push(tokio::spawn(async move {
            // Later calls finish first
            let delay = (32 - i) * 2;
            let slow = client.invoke(&Context::background(), &SLOW, &delay).await.unwrap();
            let ping = client
                .invoke(&Context::background(), &PING, &SessionArg { session_id: i })
                .await
                .unwrap();
            (delay, slow, i, ping)
        }));
    }

    for task in tasks {
        let (delay, slow, i, ping) = task.await.unwrap();
        assert_eq!(delay, slow);
        assert_eq!(i, ping);
    }
}

#[tokio::test]
async fn both_sides_can_serve() {
    init_tracing();
    let (a, b) = MemoryTransport::pair();
    let left = Connection::builder(JsonCodec)
        .name("left")
        .registry(registry::<JsonCodec>(Arc::new(Tally::default())))
        .spawn(a);
    let right = Connection::builder(JsonCodec)
        .name("right")
        .registry(registry::<JsonCodec>(Arc::new(Tally::default())))
        .spawn(b);

    let from_left = left
        .client()
        .invoke(&Context::background(), &PING, &SessionArg { session_id: 1 })
        .await
        .unwrap();
    let from_right = right
        .client()
        .invoke(&Context::background(), &PING, &SessionArg { session_id: 2 })
        .await
        .unwrap();

    assert_eq!((from_left, from_right), (1, 2));
    assert_eq!(left.stats().calls_served(), 1);
    assert_eq!(right.stats().calls_served(), 1);
}

#[tokio::test]
async fn server_accepts_tcp_clients_until_shutdown() {
    init_tracing();
    let listener = TcpTransportListener::bind("127.0.0.1:0".parse().unwrap())
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let server = Server::new(registry::<BincodeCodec>(Arc::new(Tally::default())), BincodeCodec);
    let shutdown = Context::background();
    let stop = shutdown.clone();
    let serving = tokio::spawn(async move { server.serve(listener, stop).await });

    for session_id in 0..3 {
        let transport = TcpTransport::connect(addr).await.unwrap();
        let conn = Connection::new(transport, BincodeCodec);
        let n = conn
            .client()
            .invoke(&Context::background(), &PING, &SessionArg { session_id })
            .await
            .unwrap();
        assert_eq!(n, session_id);
    }

    let transport = TcpTransport::connect(addr).await.unwrap();
    let lingering = Connection::new(transport, BincodeCodec);
    lingering
        .client()
        .invoke(&Context::background(), &PING, &SessionArg { session_id: 9 })
        .await
        .unwrap();

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // Shutdown closed the server side of the lingering connection
    tokio::time::timeout(Duration::from_secs(1), lingering.closed())
        .await
        .unwrap();
}
