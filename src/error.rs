use std::fmt;

use thiserror::Error;

use crate::{
    command::CommandError,
    money::{Money, MoneyError},
    store::StoreError,
};

/// Everything that can abort an invocation. Any error returned by a service
/// discards that invocation's whole write-set.
#[derive(Debug, Error)]
pub enum BankError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("account {account} has insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        account: String,
        balance: Money,
        requested: Money,
    },
    #[error("unable to perform currency conversion: {0}")]
    ConversionFailed(String),
    #[error("unable to route transfer: {0}")]
    RoutingFailed(String),
    #[error("remote deposit failed: {0}")]
    RemoteDepositFailed(String),
    #[error("unable to decode {what}: {reason}")]
    Deserialization { what: String, reason: String },
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    InsufficientFunds,
    ConversionFailed,
    RoutingFailed,
    RemoteDepositFailed,
    DeserializationError,
    PersistenceError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl BankError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BankError::Validation(_) => ErrorKind::ValidationError,
            BankError::NotFound(_) => ErrorKind::NotFound,
            BankError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            BankError::ConversionFailed(_) => ErrorKind::ConversionFailed,
            BankError::RoutingFailed(_) => ErrorKind::RoutingFailed,
            BankError::RemoteDepositFailed(_) => ErrorKind::RemoteDepositFailed,
            BankError::Deserialization { .. } => ErrorKind::DeserializationError,
            BankError::Persistence(_) => ErrorKind::PersistenceError,
        }
    }
}

impl From<CommandError> for BankError {
    fn from(err: CommandError) -> Self {
        BankError::Validation(err.to_string())
    }
}

impl From<MoneyError> for BankError {
    fn from(err: MoneyError) -> Self {
        BankError::Validation(err.to_string())
    }
}
