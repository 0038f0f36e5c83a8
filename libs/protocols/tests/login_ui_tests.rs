use std::sync::{Arc, Mutex};
use std::time::Duration;

use switchboard_core::Context;
use switchboard_fabric::{
    codec::{BincodeCodec, JsonCodec},
    transport::MemoryTransport,
    Codec,
};
use switchboard_protocols::{
    install_protocol, login_ui_protocol, Device, DisplayPaperKeyPhraseArg,
    DisplayPrimaryPaperKeyArg, LoginUi, LoginUiClient, PromptRevokePaperKeysArg,
};
use switchboard_rpc::{Connection, HandlerError, Registry, RpcError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Answers prompts from fixed values and records what it was shown
#[derive(Default)]
struct ScriptedUi {
    shown: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl LoginUi for ScriptedUi {
    async fn get_email_or_username(
        &self,
        _ctx: Context,
        session_id: i32,
    ) -> Result<String, HandlerError> {
        Ok(format!("user-{}", session_id))
    }

    async fn prompt_revoke_paper_keys(
        &self,
        _ctx: Context,
        arg: PromptRevokePaperKeysArg,
    ) -> Result<bool, HandlerError> {
        if arg.device.name.is_empty() {
            return Err(HandlerError::with_code(100, "no device named"));
        }
        Ok(arg.index == 0)
    }

    async fn display_paper_key_phrase(
        &self,
        _ctx: Context,
        arg: DisplayPaperKeyPhraseArg,
    ) -> Result<(), HandlerError> {
        self.shown.lock().unwrap().push(arg.phrase);
        Ok(())
    }

    async fn display_primary_paper_key(
        &self,
        ctx: Context,
        arg: DisplayPrimaryPaperKeyArg,
    ) -> Result<(), HandlerError> {
        // Waits for the user to acknowledge
        ctx.done().await;
        self.shown.lock().unwrap().push(arg.phrase);
        Ok(())
    }
}

fn connect<C: Codec>(codec: C, ui: Arc<ScriptedUi>) -> (Connection<C>, Connection<C>) {
    let mut registry: Registry<C> = Registry::new();
    registry.register(login_ui_protocol(ui));
    registry.register(install_protocol());

    let (a, b) = MemoryTransport::pair();
    let server = Connection::builder(codec.clone())
        .name("ui")
        .registry(registry)
        .spawn(a);
    let client = Connection::new(b, codec);
    (server, client)
}

#[tokio::test]
async fn login_ui_round_trip() {
    init_tracing();
    let ui = Arc::new(ScriptedUi::default());
    let (_server, conn) = connect(BincodeCodec, ui.clone());
    let login = LoginUiClient::new(conn.client());
    let ctx = Context::background();

    assert_eq!(login.get_email_or_username(&ctx, 7).await.unwrap(), "user-7");

    let revoke = PromptRevokePaperKeysArg {
        session_id: 7,
        device: Device {
            name: "paper key".to_string(),
            device_type: "backup".to_string(),
            ..Default::default()
        },
        index: 0,
    };
    assert!(login.prompt_revoke_paper_keys(&ctx, &revoke).await.unwrap());

    login
        .display_paper_key_phrase(
            &ctx,
            &DisplayPaperKeyPhraseArg {
                session_id: 7,
                phrase: "correct horse battery staple".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        ui.shown.lock().unwrap().as_slice(),
        ["correct horse battery staple".to_string()]
    );
}

#[tokio::test]
async fn handler_error_keeps_its_code() {
    init_tracing();
    let (_server, conn) = connect(JsonCodec, Arc::new(ScriptedUi::default()));
    let login = LoginUiClient::new(conn.client());

    let err = login
        .prompt_revoke_paper_keys(&Context::background(), &PromptRevokePaperKeysArg::default())
        .await
        .unwrap_err();
    match err {
        RpcError::Handler(e) => {
            assert_eq!(e.code(), Some(100));
            assert_eq!(e.message(), "no device named");
        }
        other => panic!("expected Handler, got {:?}", other),
    }
}

#[tokio::test]
async fn json_payload_uses_protocol_field_names() {
    init_tracing();
    let (_server, conn) = connect(JsonCodec, Arc::new(ScriptedUi::default()));

    let raw = conn
        .call_raw(
            &Context::background(),
            "keybase.1.loginUi.promptRevokePaperKeys",
            br#"[{"sessionID":1,"device":{"type":"desktop","name":"laptop","deviceID":"d1","cTime":0,"mTime":0,"lastUsedTime":0,"encryptKey":"","verifyKey":"","status":0},"index":3}]"#
                .to_vec(),
        )
        .await
        .unwrap();
    assert_eq!(raw, b"false");

    let err = conn
        .call_raw(
            &Context::background(),
            "keybase.1.loginUi.getEmailOrUsername",
            br#"[{"session":1}]"#.to_vec(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::ArgumentType { .. }));
}

#[tokio::test]
async fn cancelling_a_prompt_reaches_the_ui() {
    init_tracing();
    let ui = Arc::new(ScriptedUi::default());
    let (server, conn) = connect(BincodeCodec, ui.clone());
    let login = LoginUiClient::new(conn.client());

    let ctx = Context::background().with_timeout(Duration::from_millis(50));
    let err = login
        .display_primary_paper_key(
            &ctx,
            &DisplayPrimaryPaperKeyArg {
                session_id: 1,
                phrase: "primary".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::DeadlineExceeded));

    // The cancel frame unblocks the handler on the serving side
    tokio::time::timeout(Duration::from_secs(1), async {
        while server.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(ui.shown.lock().unwrap().as_slice(), ["primary".to_string()]);
}

#[tokio::test]
async fn install_protocol_has_no_methods() {
    init_tracing();
    let (_server, conn) = connect(BincodeCodec, Arc::new(ScriptedUi::default()));

    let err = conn
        .client()
        .call::<_, ()>(&Context::background(), "keybase.1.install.getStatus", &0)
        .await
        .unwrap_err();
    assert!(
        matches!(err, RpcError::UnknownMethod { protocol, method } if protocol == "keybase.1.install" && method == "getStatus")
    );
}
