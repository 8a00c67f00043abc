use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    codec,
    command::{InterbankTransfer, RegisterRoute, RegistryCommand},
    error::BankError,
    exchange::lookup_remote_rate,
    ledger::account::Account,
    money::{CurrencyCode, ExchangeRate, Money},
    network::{Service, ServiceRef, Stub},
};

/// How to reach another bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "name")]
    pub bank_id: String,
    #[serde(rename = "bankContract")]
    pub ledger_service: ServiceRef,
    #[serde(rename = "forexContract", default)]
    pub exchange_service: Option<ServiceRef>,
}

/// Bank ID to route bindings held by the registry the stub is scoped to.
///
/// Registration is not access controlled: anyone able to invoke the
/// registry can redirect any bank ID.
pub struct RoutingRegistry<'s, 'a> {
    stub: &'s mut Stub<'a>,
}

impl<'s, 'a> RoutingRegistry<'s, 'a> {
    pub fn new(stub: &'s mut Stub<'a>) -> Self {
        Self { stub }
    }

    /// Replaces any route already registered for the bank ID.
    pub fn register_route(&mut self, command: RegisterRoute) -> Result<Route, BankError> {
        let route = Route {
            bank_id: command.bank_id,
            ledger_service: command.ledger_service,
            exchange_service: command.exchange_service,
        };
        self.stub
            .put_state(&route.bank_id, codec::encode("route", &route)?)?;
        info!(bank_id = %route.bank_id, ledger = %route.ledger_service, "route registered");
        Ok(route)
    }

    pub fn resolve_route(&mut self, bank_id: &str) -> Result<Route, BankError> {
        let Some(bytes) = self.stub.get_state(bank_id)? else {
            return Err(BankError::NotFound(format!("route for bank {bank_id}")));
        };
        codec::decode(&format!("route for bank {bank_id}"), &bytes)
    }
}

/// Resolves `bank_id` through the registry deployed as `registry`.
pub fn resolve_remote_route(
    stub: &mut Stub<'_>,
    registry: &ServiceRef,
    bank_id: &str,
) -> Result<Route, BankError> {
    let response = stub.invoke_service(registry, "getRoute", &[bank_id.to_string()]);
    if !response.is_ok() {
        return Err(BankError::RoutingFailed(format!(
            "no route to bank {bank_id} via `{registry}`: {}",
            response.message()
        )));
    }
    response.decode(&format!("route for bank {bank_id}"))
}

/// A credit to an account on another ledger, with the rate already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCredit {
    pub ledger_service: ServiceRef,
    pub to_account: String,
    pub rate: ExchangeRate,
    pub amount: Money,
}

impl RemoteCredit {
    /// Reads the destination account through `route` and works out how much
    /// it receives for `amount` in `currency`.
    pub fn prepare(
        stub: &mut Stub<'_>,
        route: &Route,
        to_account: &str,
        amount: Money,
        currency: &CurrencyCode,
    ) -> Result<Self, BankError> {
        let response =
            stub.invoke_service(&route.ledger_service, "queryAccount", &[to_account.to_string()]);
        if !response.is_ok() {
            return Err(BankError::NotFound(format!(
                "account {to_account} at bank {}: {}",
                route.bank_id,
                response.message()
            )));
        }
        let account: Account = response.decode(&format!("account {to_account}"))?;

        let rate = if account.currency == *currency {
            ExchangeRate::ONE
        } else {
            let Some(exchange) = &route.exchange_service else {
                return Err(BankError::RoutingFailed(format!(
                    "route for bank {} has no exchange service to convert {currency} to {}",
                    route.bank_id, account.currency
                )));
            };
            lookup_remote_rate(stub, exchange, currency, &account.currency)?
        };
        let credited = amount
            .convert(rate)
            .map_err(|err| BankError::ConversionFailed(err.to_string()))?;
        debug!(
            bank_id = %route.bank_id,
            to_account,
            %amount,
            %rate,
            %credited,
            "remote credit prepared"
        );
        Ok(Self {
            ledger_service: route.ledger_service.clone(),
            to_account: to_account.to_string(),
            rate,
            amount: credited,
        })
    }

    /// Deposits on the remote ledger. A failure here must abort the caller's
    /// whole invocation.
    pub fn execute(&self, stub: &mut Stub<'_>) -> Result<(), BankError> {
        let args = [self.to_account.clone(), self.amount.to_string()];
        let response = stub.invoke_service(&self.ledger_service, "deposit", &args);
        if !response.is_ok() {
            return Err(BankError::RemoteDepositFailed(format!(
                "deposit of {} to account {} on `{}`: {}",
                self.amount,
                self.to_account,
                self.ledger_service,
                response.message()
            )));
        }
        Ok(())
    }
}

/// Serves `registerRoute`, `getRoute` and `interbankTransfer`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistryService;

impl RegistryService {
    fn interbank_transfer(
        stub: &mut Stub<'_>,
        command: InterbankTransfer,
    ) -> Result<(), BankError> {
        let route = RoutingRegistry::new(stub)
            .resolve_route(&command.to_bank_id)
            .map_err(|err| match err {
                BankError::NotFound(what) => BankError::RoutingFailed(format!("{what} not found")),
                other => other,
            })?;
        let credit = RemoteCredit::prepare(
            stub,
            &route,
            &command.to_account,
            command.amount,
            &command.currency,
        )?;
        credit.execute(stub)
    }
}

impl Service for RegistryService {
    fn invoke(
        &self,
        stub: &mut Stub<'_>,
        operation: &str,
        args: &[String],
    ) -> Result<Option<Vec<u8>>, BankError> {
        match RegistryCommand::parse_command(operation, args)? {
            RegistryCommand::RegisterRoute(command) => {
                RoutingRegistry::new(stub).register_route(command)?;
                Ok(None)
            }
            RegistryCommand::GetRoute { bank_id } => {
                let route = RoutingRegistry::new(stub).resolve_route(&bank_id)?;
                Ok(Some(codec::encode("route", &route)?))
            }
            RegistryCommand::InterbankTransfer(command) => {
                Self::interbank_transfer(stub, command)?;
                Ok(None)
            }
        }
    }
}
