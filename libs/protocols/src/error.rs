use thiserror::Error;

/// A name or number that does not match any variant of a wire enum
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnumError {
    #[error("unknown {kind} name: {name}")]
    UnknownName { kind: &'static str, name: String },

    #[error("unknown {kind} value: {value}")]
    UnknownValue { kind: &'static str, value: i32 },
}
