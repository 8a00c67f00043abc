use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    codec,
    command::{ExchangeCommand, UpsertPair},
    error::BankError,
    money::{CurrencyCode, ExchangeRate},
    network::{Service, ServiceRef, Stub},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRatePair {
    pub pair: String,
    pub rate: ExchangeRate,
}

/// `GBP:USD` is a different pair from `USD:GBP`.
pub fn pair_key(base: &CurrencyCode, counter: &CurrencyCode) -> String {
    format!("{base}:{counter}")
}

/// Directional currency pairs of the exchange service the stub is scoped to.
pub struct ExchangeRateStore<'s, 'a> {
    stub: &'s mut Stub<'a>,
}

impl<'s, 'a> ExchangeRateStore<'s, 'a> {
    pub fn new(stub: &'s mut Stub<'a>) -> Self {
        Self { stub }
    }

    /// Never touches the inverse pair.
    pub fn upsert(&mut self, command: UpsertPair) -> Result<ExchangeRatePair, BankError> {
        let record = ExchangeRatePair {
            pair: pair_key(&command.base, &command.counter),
            rate: command.rate,
        };
        self.stub
            .put_state(&record.pair, codec::encode("exchange pair", &record)?)?;
        debug!(pair = %record.pair, rate = %record.rate, "exchange pair updated");
        Ok(record)
    }

    pub fn get_pair(
        &mut self,
        base: &CurrencyCode,
        counter: &CurrencyCode,
    ) -> Result<ExchangeRatePair, BankError> {
        let key = pair_key(base, counter);
        let Some(bytes) = self.stub.get_state(&key)? else {
            return Err(BankError::NotFound(format!("exchange pair {key}")));
        };
        codec::decode(&format!("exchange pair {key}"), &bytes)
    }

    pub fn lookup(
        &mut self,
        base: &CurrencyCode,
        counter: &CurrencyCode,
    ) -> Result<ExchangeRate, BankError> {
        self.get_pair(base, counter).map(|pair| pair.rate)
    }
}

/// Asks the exchange service deployed as `service` for the `base:counter`
/// rate. Every failure, including a missing pair, is a conversion failure.
pub fn lookup_remote_rate(
    stub: &mut Stub<'_>,
    service: &ServiceRef,
    base: &CurrencyCode,
    counter: &CurrencyCode,
) -> Result<ExchangeRate, BankError> {
    let args = [base.to_string(), counter.to_string()];
    let response = stub.invoke_service(service, "getForexPair", &args);
    if !response.is_ok() {
        return Err(BankError::ConversionFailed(format!(
            "unable to get exchange rate {} from `{service}`: {}",
            pair_key(base, counter),
            response.message()
        )));
    }
    let pair: ExchangeRatePair = response
        .decode("exchange pair")
        .map_err(|err| BankError::ConversionFailed(err.to_string()))?;
    Ok(pair.rate)
}

/// Serves `createUpdateForexPair` and `getForexPair`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExchangeService;

impl Service for ExchangeService {
    fn invoke(
        &self,
        stub: &mut Stub<'_>,
        operation: &str,
        args: &[String],
    ) -> Result<Option<Vec<u8>>, BankError> {
        let mut rates = ExchangeRateStore::new(stub);
        match ExchangeCommand::parse_command(operation, args)? {
            ExchangeCommand::CreateUpdateForexPair(command) => {
                rates.upsert(command)?;
                Ok(None)
            }
            ExchangeCommand::GetForexPair { base, counter } => {
                let pair = rates.get_pair(&base, &counter)?;
                Ok(Some(codec::encode("exchange pair", &pair)?))
            }
        }
    }
}
