use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{Error, Result};

/// Bincode codec for binary serialization
///
/// Fixed-width integers, little endian. A payload must be consumed exactly:
/// leftover bytes after decoding are an error, so a value never decodes into
/// a shape smaller than the one it was encoded from.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

impl Codec for BincodeCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        options()
            .serialize(value)
            .map_err(|e| Error::Codec(e.to_string()))
    }

    fn decode<T: for<'de> Deserialize<'de>>(&self, bytes: &[u8]) -> Result<T> {
        options()
            .deserialize(bytes)
            .map_err(|e| Error::Codec(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "bincode"
    }
}
