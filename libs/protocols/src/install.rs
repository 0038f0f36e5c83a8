//! `keybase.1.install` records
//!
//! The protocol currently exposes no methods; its types are shared with
//! other protocols that report install state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use switchboard_fabric::Codec;
use switchboard_rpc::{Client, GenericClient, Protocol};

use crate::common::Status;
use crate::error::EnumError;

pub const PROTOCOL: &str = "keybase.1.install";

/// Integer-backed enum that travels as its number and has a canonical name
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $value:literal => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "i32", try_from = "i32")]
        pub enum $name {
            #[default]
            $($variant = $value),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value as i32
            }
        }

        impl TryFrom<i32> for $name {
            type Error = EnumError;

            fn try_from(value: i32) -> Result<Self, EnumError> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => Err(EnumError::UnknownValue {
                        kind: stringify!($name),
                        value,
                    }),
                }
            }
        }

        impl FromStr for $name {
            type Err = EnumError;

            fn from_str(s: &str) -> Result<Self, EnumError> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(EnumError::UnknownName {
                        kind: stringify!($name),
                        name: s.to_string(),
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Install state of a component or service
    InstallStatus {
        Unknown = 0 => "UNKNOWN",
        Error = 1 => "ERROR",
        NotInstalled = 2 => "NOT_INSTALLED",
        Installed = 4 => "INSTALLED",
    }
}

wire_enum! {
    /// What the installer would do next for a component
    InstallAction {
        Unknown = 0 => "UNKNOWN",
        None = 1 => "NONE",
        Upgrade = 2 => "UPGRADE",
        Reinstall = 3 => "REINSTALL",
        Install = 4 => "INSTALL",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub version: String,
    pub label: String,
    pub pid: String,
    pub last_exit_status: String,
    pub bundle_version: String,
    pub install_status: InstallStatus,
    pub install_action: InstallAction,
    pub status: Status,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesStatus {
    pub service: Vec<ServiceStatus>,
    pub kbfs: Vec<ServiceStatus>,
    pub updater: Vec<ServiceStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuseMountInfo {
    pub path: String,
    pub fstype: String,
    pub output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuseStatus {
    pub version: String,
    pub bundle_version: String,
    #[serde(rename = "kextID")]
    pub kext_id: String,
    pub path: String,
    pub kext_started: bool,
    pub install_status: InstallStatus,
    pub install_action: InstallAction,
    pub mount_infos: Vec<FuseMountInfo>,
    pub status: Status,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentResult {
    pub name: String,
    pub status: Status,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResult {
    pub component_results: Vec<ComponentResult>,
    pub status: Status,
    pub fatal: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallResult {
    pub component_results: Vec<ComponentResult>,
    pub status: Status,
}

/// Registers the install protocol, which has no methods yet
pub fn install_protocol<C: Codec>() -> Protocol<C> {
    Protocol::new(PROTOCOL)
}

/// Calling side of `keybase.1.install`
#[derive(Debug, Clone)]
pub struct InstallClient<T, C> {
    client: Client<T, C>,
}

impl<T: GenericClient, C: Codec> InstallClient<T, C> {
    pub fn new(client: Client<T, C>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client<T, C> {
        &self.client
    }
}
