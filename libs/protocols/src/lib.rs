//! Switchboard Protocols - typed bindings for the `keybase.1` protocols
//!
//! Each module declares a protocol's records, its [`Method`](switchboard_rpc::Method)
//! handles, a builder that binds an implementation into a
//! [`Protocol`](switchboard_rpc::Protocol), and a client stub.

pub mod common;
pub mod error;
pub mod install;
pub mod login_ui;

pub use common::{Device, Status, StringKVPair, Time};
pub use error::EnumError;
pub use install::{
    install_protocol, ComponentResult, FuseMountInfo, FuseStatus, InstallAction, InstallClient,
    InstallResult, InstallStatus, ServiceStatus, ServicesStatus, UninstallResult,
};
pub use login_ui::{
    login_ui_protocol, DisplayPaperKeyPhraseArg, DisplayPrimaryPaperKeyArg, GetEmailOrUsernameArg,
    LoginUi, LoginUiClient, PromptRevokePaperKeysArg,
};
