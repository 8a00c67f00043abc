use serde::{Serialize, de::DeserializeOwned};

use crate::error::BankError;

pub fn encode<T: Serialize>(what: &str, value: &T) -> Result<Vec<u8>, BankError> {
    serde_json::to_vec(value).map_err(|err| BankError::Deserialization {
        what: what.to_string(),
        reason: err.to_string(),
    })
}

pub fn decode<T: DeserializeOwned>(what: &str, bytes: &[u8]) -> Result<T, BankError> {
    serde_json::from_slice(bytes).map_err(|err| BankError::Deserialization {
        what: what.to_string(),
        reason: err.to_string(),
    })
}
