use std::{collections::HashMap, fmt};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::{
    codec,
    error::BankError,
    store::{HistoryIter, LedgerStore, StateKey, StoreError, WriteSet},
};

pub mod in_memory_network;

/// Nested invocations deeper than this are refused.
pub const MAX_INVOCATION_DEPTH: usize = 16;

/// Name under which a service is deployed. Also the namespace of its keys.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ServiceRef(String);

impl ServiceRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceRef {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

/// Outcome of an invocation as seen across the service boundary. Callers
/// branch on `status` only; `message` is for humans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub payload: Option<Vec<u8>>,
    pub message: Option<String>,
}

impl Response {
    pub fn success(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            payload: None,
            message: Some(message.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    pub fn decode<T: DeserializeOwned>(&self, what: &str) -> Result<T, BankError> {
        let Some(payload) = &self.payload else {
            return Err(BankError::Deserialization {
                what: what.to_string(),
                reason: "empty payload".to_string(),
            });
        };
        codec::decode(what, payload)
    }
}

impl From<Result<Option<Vec<u8>>, BankError>> for Response {
    fn from(result: Result<Option<Vec<u8>>, BankError>) -> Self {
        match result {
            Ok(payload) => Response::success(payload),
            Err(err) => Response::error(err.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub service: ServiceRef,
    pub name: String,
    pub payload: Vec<u8>,
}

/// A deployed service. Services are stateless; all state lives in the store
/// and is reached through the [`Stub`].
pub trait Service {
    fn invoke(
        &self,
        stub: &mut Stub<'_>,
        operation: &str,
        args: &[String],
    ) -> Result<Option<Vec<u8>>, BankError>;
}

pub(crate) type Services = HashMap<ServiceRef, Box<dyn Service>>;

/// One service's view of the running invocation.
///
/// Reads see the invocation's own staged writes. Writes are staged in the
/// write-set shared by every service the invocation reaches.
pub struct Stub<'a> {
    store: &'a dyn LedgerStore,
    services: &'a Services,
    write_set: &'a mut WriteSet,
    events: &'a mut Vec<Event>,
    service: ServiceRef,
    depth: usize,
}

impl<'a> Stub<'a> {
    pub(crate) fn new(
        store: &'a dyn LedgerStore,
        services: &'a Services,
        write_set: &'a mut WriteSet,
        events: &'a mut Vec<Event>,
        service: ServiceRef,
    ) -> Self {
        Self {
            store,
            services,
            write_set,
            events,
            service,
            depth: 0,
        }
    }

    pub fn service_ref(&self) -> &ServiceRef {
        &self.service
    }

    fn state_key(&self, key: &str) -> Result<StateKey, StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        Ok(StateKey::new(self.service.as_str(), key))
    }

    pub fn get_state(&mut self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let key = self.state_key(key)?;
        if let Some(staged) = self.write_set.staged(&key) {
            return Ok(Some(staged.to_vec()));
        }
        let committed = self.store.get(&key)?;
        self.write_set
            .record_read(key, committed.as_ref().map_or(0, |versioned| versioned.version));
        Ok(committed.map(|versioned| versioned.value))
    }

    pub fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let key = self.state_key(key)?;
        self.write_set.stage(key, value);
        Ok(())
    }

    /// Committed history only; writes staged by this invocation are not part of it.
    pub fn history_for_key(&self, key: &str) -> Result<HistoryIter<'a>, StoreError> {
        let key = self.state_key(key)?;
        let store: &'a dyn LedgerStore = self.store;
        store.history(&key)
    }

    /// Published only if the invocation commits.
    pub fn set_event(&mut self, name: &str, payload: Vec<u8>) {
        self.events.push(Event {
            service: self.service.clone(),
            name: name.to_string(),
            payload,
        });
    }

    /// Runs `operation` on another service inside this invocation.
    ///
    /// If the nested call fails, whatever it staged is discarded before the
    /// failure is handed back; what the caller staged is kept.
    pub fn invoke_service(
        &mut self,
        target: &ServiceRef,
        operation: &str,
        args: &[String],
    ) -> Response {
        let services: &'a Services = self.services;
        let Some(service) = services.get(target) else {
            return Response::error(format!("service `{target}` is not deployed"));
        };
        if self.depth >= MAX_INVOCATION_DEPTH {
            return Response::error(format!(
                "invocation depth limit of {MAX_INVOCATION_DEPTH} reached calling `{target}`"
            ));
        }
        debug!(caller = %self.service, %target, operation, "nested invocation");

        let savepoint = self.write_set.savepoint();
        let events_before = self.events.len();
        let result = {
            let mut nested = Stub {
                store: self.store,
                services,
                write_set: &mut *self.write_set,
                events: &mut *self.events,
                service: target.clone(),
                depth: self.depth + 1,
            };
            service.invoke(&mut nested, operation, args)
        };
        if let Err(err) = &result {
            debug!(%target, operation, error = %err, "nested invocation failed");
            self.write_set.rollback(savepoint);
            self.events.truncate(events_before);
        }
        Response::from(result)
    }
}
