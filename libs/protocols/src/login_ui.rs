//! `keybase.1.loginUi`: prompts the service shows while a user logs in

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use switchboard_core::Context;
use switchboard_fabric::Codec;
use switchboard_rpc::{Client, GenericClient, HandlerError, Method, Protocol};

use crate::common::Device;

pub const PROTOCOL: &str = "keybase.1.loginUi";

pub const GET_EMAIL_OR_USERNAME: Method<GetEmailOrUsernameArg, String> =
    Method::call(PROTOCOL, "getEmailOrUsername");
pub const PROMPT_REVOKE_PAPER_KEYS: Method<PromptRevokePaperKeysArg, bool> =
    Method::call(PROTOCOL, "promptRevokePaperKeys");
pub const DISPLAY_PAPER_KEY_PHRASE: Method<DisplayPaperKeyPhraseArg> =
    Method::call(PROTOCOL, "displayPaperKeyPhrase");
pub const DISPLAY_PRIMARY_PAPER_KEY: Method<DisplayPrimaryPaperKeyArg> =
    Method::call(PROTOCOL, "displayPrimaryPaperKey");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetEmailOrUsernameArg {
    #[serde(rename = "sessionID")]
    pub session_id: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRevokePaperKeysArg {
    #[serde(rename = "sessionID")]
    pub session_id: i32,
    pub device: Device,
    pub index: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPaperKeyPhraseArg {
    #[serde(rename = "sessionID")]
    pub session_id: i32,
    pub phrase: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPrimaryPaperKeyArg {
    #[serde(rename = "sessionID")]
    pub session_id: i32,
    pub phrase: String,
}

/// Implemented by whatever drives the login prompts
#[async_trait::async_trait]
pub trait LoginUi: Send + Sync {
    async fn get_email_or_username(&self, ctx: Context, session_id: i32) -> Result<String, HandlerError>;

    /// Ask whether the paper key on `arg.device` should be revoked
    async fn prompt_revoke_paper_keys(
        &self,
        ctx: Context,
        arg: PromptRevokePaperKeysArg,
    ) -> Result<bool, HandlerError>;

    async fn display_paper_key_phrase(
        &self,
        ctx: Context,
        arg: DisplayPaperKeyPhraseArg,
    ) -> Result<(), HandlerError>;

    async fn display_primary_paper_key(
        &self,
        ctx: Context,
        arg: DisplayPrimaryPaperKeyArg,
    ) -> Result<(), HandlerError>;
}

/// Bind `ui` to the four `keybase.1.loginUi` methods
pub fn login_ui_protocol<C, T>(ui: Arc<T>) -> Protocol<C>
where
    C: Codec,
    T: LoginUi + ?Sized + 'static,
{
    let prompt = Arc::clone(&ui);
    let phrase = Arc::clone(&ui);
    let primary = Arc::clone(&ui);

    Protocol::new(PROTOCOL)
        .handle(&GET_EMAIL_OR_USERNAME, move |ctx, arg: GetEmailOrUsernameArg| {
            let ui = Arc::clone(&ui);
            async move { ui.get_email_or_username(ctx, arg.session_id).await }
        })
        .handle(&PROMPT_REVOKE_PAPER_KEYS, move |ctx, arg: PromptRevokePaperKeysArg| {
            let ui = Arc::clone(&prompt);
            async move { ui.prompt_revoke_paper_keys(ctx, arg).await }
        })
        .handle(&DISPLAY_PAPER_KEY_PHRASE, move |ctx, arg: DisplayPaperKeyPhraseArg| {
            let ui = Arc::clone(&phrase);
            async move { ui.display_paper_key_phrase(ctx, arg).await }
        })
        .handle(&DISPLAY_PRIMARY_PAPER_KEY, move |ctx, arg: DisplayPrimaryPaperKeyArg| {
            let ui = Arc::clone(&primary);
            async move { ui.display_primary_paper_key(ctx, arg).await }
        })
}

/// Calling side of `keybase.1.loginUi`
#[derive(Debug, Clone)]
pub struct LoginUiClient<T, C> {
    client: Client<T, C>,
}

impl<T: GenericClient, C: Codec> LoginUiClient<T, C> {
    pub fn new(client: Client<T, C>) -> Self {
        Self { client }
    }

    pub async fn get_email_or_username(
        &self,
        ctx: &Context,
        session_id: i32,
    ) -> switchboard_rpc::Result<String> {
        let arg = GetEmailOrUsernameArg { session_id };
        self.client.invoke(ctx, &GET_EMAIL_OR_USERNAME, &arg).await
    }

    pub async fn prompt_revoke_paper_keys(
        &self,
        ctx: &Context,
        arg: &PromptRevokePaperKeysArg,
    ) -> switchboard_rpc::Result<bool> {
        self.client.invoke(ctx, &PROMPT_REVOKE_PAPER_KEYS, arg).await
    }

    pub async fn display_paper_key_phrase(
        &self,
        ctx: &Context,
        arg: &DisplayPaperKeyPhraseArg,
    ) -> switchboard_rpc::Result<()> {
        self.client.invoke(ctx, &DISPLAY_PAPER_KEY_PHRASE, arg).await
    }

    pub async fn display_primary_paper_key(
        &self,
        ctx: &Context,
        arg: &DisplayPrimaryPaperKeyArg,
    ) -> switchboard_rpc::Result<()> {
        self.client.invoke(ctx, &DISPLAY_PRIMARY_PAPER_KEY, arg).await
    }
}
