use tracing::{info, warn};

use crate::{
    error::BankError,
    store::{LedgerStore, WriteSet, in_memory_store::InMemoryStore},
};

use super::{Event, Response, Service, ServiceRef, Services, Stub};

/// Hosts deployed services over one [`InMemoryStore`].
///
/// Every top-level invocation gets its own write-set: it is committed when
/// the invocation succeeds and dropped otherwise. Events are published only
/// for committed invocations.
#[derive(Default)]
pub struct InMemoryNetwork {
    store: InMemoryStore,
    services: Services,
    events: Vec<Event>,
}

impl InMemoryNetwork {
    /// Replaces any service already deployed under the same name.
    pub fn deploy(&mut self, name: impl Into<ServiceRef>, service: impl Service + 'static) {
        self.services.insert(name.into(), Box::new(service));
    }

    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Events of committed invocations, in commit order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn invoke(&mut self, target: &ServiceRef, operation: &str, args: &[String]) -> Response {
        let Some(service) = self.services.get(target) else {
            return Response::error(format!("service `{target}` is not deployed"));
        };
        let result = execute(
            &mut self.store,
            &self.services,
            &mut self.events,
            target,
            operation,
            |stub| service.invoke(stub, operation, args),
        );
        Response::from(result)
    }

    /// Shorthand for [`Self::invoke`] with borrowed arguments.
    pub fn invoke_with(&mut self, target: &str, operation: &str, args: &[&str]) -> Response {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        self.invoke(&ServiceRef::from(target), operation, &args)
    }

    /// Runs `f` as a top-level invocation in the namespace of `target`, with
    /// the same commit rules as [`Self::invoke`].
    pub fn execute<T>(
        &mut self,
        target: &ServiceRef,
        f: impl FnOnce(&mut Stub<'_>) -> Result<T, BankError>,
    ) -> Result<T, BankError> {
        execute(
            &mut self.store,
            &self.services,
            &mut self.events,
            target,
            "execute",
            f,
        )
    }
}

fn execute<T>(
    store: &mut InMemoryStore,
    services: &Services,
    published: &mut Vec<Event>,
    target: &ServiceRef,
    operation: &str,
    f: impl FnOnce(&mut Stub<'_>) -> Result<T, BankError>,
) -> Result<T, BankError> {
    let mut write_set = WriteSet::default();
    let mut events = Vec::new();
    let result = {
        let mut stub = Stub::new(&*store, services, &mut write_set, &mut events, target.clone());
        f(&mut stub)
    };

    match result {
        Ok(value) => {
            let writes = write_set.len();
            match store.commit(write_set) {
                Ok(receipt) => {
                    info!(service = %target, operation, tx_id = %receipt.tx_id, writes, "invocation committed");
                    published.extend(events);
                    Ok(value)
                }
                Err(err) => {
                    warn!(service = %target, operation, error = %err, "commit rejected");
                    Err(err.into())
                }
            }
        }
        Err(err) => {
            warn!(service = %target, operation, kind = %err.kind(), error = %err, "invocation aborted");
            Err(err)
        }
    }
}
