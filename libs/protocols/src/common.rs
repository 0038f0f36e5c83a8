use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch
pub type Time = i64;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringKVPair {
    pub key: String,
    pub value: String,
}

/// Outcome of an operation as reported by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub code: i32,
    pub name: String,
    pub desc: String,
    pub fields: Vec<StringKVPair>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            name: "OK".to_string(),
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "type")]
    pub device_type: String,
    pub name: String,
    #[serde(rename = "deviceID")]
    pub device_id: String,
    pub c_time: Time,
    pub m_time: Time,
    pub last_used_time: Time,
    pub encrypt_key: String,
    pub verify_key: String,
    pub status: i32,
}
