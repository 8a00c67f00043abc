//! Moves funds out of a local account, into a local or remote one.
//!
//! Both branches stage the debit before the credit. Nothing is written
//! unless the whole invocation succeeds: the host discards the write-set,
//! including the local debit, when any step returns an error. A failed remote
//! deposit therefore never leaves a stranded debit behind.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    codec,
    command::Transfer,
    error::BankError,
    exchange::lookup_remote_rate,
    money::{CurrencyCode, ExchangeRate, Money},
    network::Stub,
    registry::{RemoteCredit, resolve_remote_route},
};

use super::{
    account::{Account, AccountLedger},
    bank::BankConfig,
};

pub const TRANSFER_EVENT: &str = "transfer-event";

/// Notification emitted by a committed transfer. Not stored as state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    #[serde(rename = "FromAccNumber")]
    pub from_account: String,
    #[serde(rename = "FromBankID")]
    pub from_bank_id: String,
    #[serde(rename = "ToAccNumber")]
    pub to_account: String,
    #[serde(rename = "ToBankID")]
    pub to_bank_id: String,
    /// Amount debited from the source account, before conversion.
    #[serde(rename = "Amount")]
    pub amount: Money,
}

/// Progress of one transfer. Whether it is finally committed or aborted is
/// decided by the host when the invocation returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    Validating,
    SameBankResolved,
    RemoteRouted,
    RateResolved,
    Debited,
    Credited,
    EventEmitted,
}

/// Checks the amount and the source account's funds. Runs before the bank
/// record is loaded, so an overdraft is reported as such on any ledger.
pub fn check_source(stub: &mut Stub<'_>, command: &Transfer) -> Result<Account, BankError> {
    if !command.amount.is_positive() {
        return Err(BankError::Validation(format!(
            "transfer amount must be a positive number, got {}",
            command.amount
        )));
    }

    let from = AccountLedger::new(stub).query_account(&command.from_account)?;
    if from.balance < command.amount {
        warn!(
            from = %command.from_account,
            balance = %from.balance,
            requested = %command.amount,
            "transfer rejected"
        );
        return Err(BankError::InsufficientFunds {
            account: from.account_number,
            balance: from.balance,
            requested: command.amount,
        });
    }
    Ok(from)
}

pub struct TransferCoordinator<'s, 'a> {
    stub: &'s mut Stub<'a>,
    config: BankConfig,
    stage: TransferStage,
}

impl<'s, 'a> TransferCoordinator<'s, 'a> {
    pub fn new(stub: &'s mut Stub<'a>, config: BankConfig) -> Self {
        Self {
            stub,
            config,
            stage: TransferStage::Validating,
        }
    }

    pub fn stage(&self) -> TransferStage {
        self.stage
    }

    /// Moves funds out of `from`, as returned by [`check_source`].
    pub fn transfer(
        &mut self,
        command: &Transfer,
        from: Account,
    ) -> Result<TransferRecord, BankError> {
        let result = self.run(command, from);
        if let Err(err) = &result {
            warn!(
                from = %command.from_account,
                to_bank = %command.to_bank_id,
                to = %command.to_account,
                stage = ?self.stage,
                kind = %err.kind(),
                error = %err,
                "transfer aborted"
            );
        }
        result
    }

    fn advance(&mut self, stage: TransferStage) {
        debug!(from = ?self.stage, to = ?stage, "transfer stage");
        self.stage = stage;
    }

    fn run(&mut self, command: &Transfer, from: Account) -> Result<TransferRecord, BankError> {
        if command.to_bank_id == self.config.bank_id {
            self.same_bank(command, from)?;
        } else {
            self.cross_bank(command, &from.currency)?;
        }

        let record = TransferRecord {
            from_account: command.from_account.clone(),
            from_bank_id: self.config.bank_id.clone(),
            to_account: command.to_account.clone(),
            to_bank_id: command.to_bank_id.clone(),
            amount: command.amount,
        };
        self.stub
            .set_event(TRANSFER_EVENT, codec::encode("transfer event", &record)?);
        self.advance(TransferStage::EventEmitted);
        Ok(record)
    }

    fn same_bank(&mut self, command: &Transfer, mut from: Account) -> Result<(), BankError> {
        if command.from_account == command.to_account {
            return Err(BankError::Validation(format!(
                "cannot transfer from account {} to itself",
                command.from_account
            )));
        }
        let mut to = AccountLedger::new(self.stub).query_account(&command.to_account)?;
        self.advance(TransferStage::SameBankResolved);

        let rate = if from.currency == to.currency {
            ExchangeRate::ONE
        } else {
            let Some(exchange) = self.config.exchange_service.clone() else {
                return Err(BankError::ConversionFailed(format!(
                    "bank {} has no exchange service to convert {} to {}",
                    self.config.bank_id, from.currency, to.currency
                )));
            };
            lookup_remote_rate(self.stub, &exchange, &from.currency, &to.currency)?
        };
        let credited = command
            .amount
            .convert(rate)
            .map_err(|err| BankError::ConversionFailed(err.to_string()))?;
        if !credited.is_positive() {
            return Err(BankError::ConversionFailed(format!(
                "rate {rate} turns {} {} into {credited} {}",
                command.amount, from.currency, to.currency
            )));
        }
        self.advance(TransferStage::RateResolved);

        from.debit(command.amount)?;
        AccountLedger::new(self.stub).store(&from)?;
        self.advance(TransferStage::Debited);

        to.credit(credited)?;
        AccountLedger::new(self.stub).store(&to)?;
        self.advance(TransferStage::Credited);
        debug!(
            from = %from.account_number,
            to = %to.account_number,
            debited = %command.amount,
            %credited,
            "same bank transfer staged"
        );
        Ok(())
    }

    fn cross_bank(&mut self, command: &Transfer, currency: &CurrencyCode) -> Result<(), BankError> {
        let Some(registry) = self.config.interbank_service.clone() else {
            return Err(BankError::RoutingFailed(format!(
                "bank {} has no interbank service to reach bank {}",
                self.config.bank_id, command.to_bank_id
            )));
        };
        let route = resolve_remote_route(self.stub, &registry, &command.to_bank_id)?;
        self.advance(TransferStage::RemoteRouted);

        let credit = RemoteCredit::prepare(
            self.stub,
            &route,
            &command.to_account,
            command.amount,
            currency,
        )?;
        self.advance(TransferStage::RateResolved);

        AccountLedger::new(self.stub).debit(&command.from_account, command.amount)?;
        self.advance(TransferStage::Debited);

        credit.execute(self.stub)?;
        self.advance(TransferStage::Credited);
        debug!(
            from = %command.from_account,
            to_bank = %route.bank_id,
            to = %credit.to_account,
            debited = %command.amount,
            credited = %credit.amount,
            "cross bank transfer staged"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        error::ErrorKind,
        exchange::ExchangeService,
        ledger::{LedgerService, account::Account, bank::load_config},
        network::{ServiceRef, in_memory_network::InMemoryNetwork},
        registry::RegistryService,
    };

    use super::*;

    fn money(value: &str) -> Money {
        Money::parse(value).unwrap()
    }

    fn ok(network: &mut InMemoryNetwork, service: &str, operation: &str, args: &[&str]) {
        let response = network.invoke_with(service, operation, args);
        assert!(response.is_ok(), "{operation} failed: {}", response.message());
    }

    fn balance(network: &mut InMemoryNetwork, ledger: &str, account: &str) -> Money {
        let account: Account = network
            .invoke_with(ledger, "queryAccount", &[account])
            .decode("account")
            .unwrap();
        account.balance
    }

    /// `bank` is 0001, `bank2` is 0002, both behind `ibank` and `forex`.
    fn network() -> InMemoryNetwork {
        let mut network = InMemoryNetwork::default();
        network.deploy("forex", ExchangeService);
        network.deploy("ibank", RegistryService);
        network.deploy("bank", LedgerService);
        network.deploy("bank2", LedgerService);
        ok(&mut network, "bank", "init", &["CloudBank", "0001", "forex", "ibank"]);
        ok(&mut network, "bank2", "init", &["Bank of Internet", "0002", "forex", "ibank"]);
        network
    }

    fn transfer(from: &str, to_bank: &str, to: &str, amount: &str) -> Transfer {
        Transfer {
            from_account: from.to_string(),
            to_bank_id: to_bank.to_string(),
            to_account: to.to_string(),
            amount: money(amount),
        }
    }

    /// Runs a transfer directly so the error kind and the stage are visible.
    fn run(
        network: &mut InMemoryNetwork,
        ledger: &str,
        command: Transfer,
    ) -> (Result<TransferRecord, BankError>, TransferStage) {
        let mut stage = TransferStage::Validating;
        let result = network.execute(&ServiceRef::from(ledger), |stub| {
            let from = check_source(stub, &command)?;
            let config = load_config(stub)?;
            let mut coordinator = TransferCoordinator::new(stub, config);
            let result = coordinator.transfer(&command, from);
            stage = coordinator.stage();
            result
        });
        (result, stage)
    }

    #[test]
    fn same_bank_transfer_with_conversion() {
        let mut network = network();
        ok(&mut network, "forex", "createUpdateForexPair", &["GBP", "USD", "1.20"]);
        ok(&mut network, "bank", "createAccount", &["Joe Blogs", "2", "100", "GBP"]);
        ok(&mut network, "bank", "createAccount", &["Bob Jones", "1", "0", "USD"]);

        ok(&mut network, "bank", "transfer", &["2", "0001", "1", "10"]);
        assert_eq!(balance(&mut network, "bank", "2"), money("90"));
        assert_eq!(balance(&mut network, "bank", "1"), money("12"));

        let events = network.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, TRANSFER_EVENT);
        let record: TransferRecord = serde_json::from_slice(&events[0].payload).unwrap();
        assert_eq!(
            record,
            TransferRecord {
                from_account: "2".to_string(),
                from_bank_id: "0001".to_string(),
                to_account: "1".to_string(),
                to_bank_id: "0001".to_string(),
                amount: money("10"),
            }
        );
        assert_eq!(
            String::from_utf8(events[0].payload.clone()).unwrap(),
            r#"{"FromAccNumber":"2","FromBankID":"0001","ToAccNumber":"1","ToBankID":"0001","Amount":"10"}"#
        );
    }

    #[test]
    fn same_currency_transfer_conserves_funds() {
        let mut network = network();
        ok(&mut network, "bank", "createAccount", &["A", "1", "75.25", "USD"]);
        ok(&mut network, "bank", "createAccount", &["B", "2", "10", "USD"]);

        let (result, stage) = run(&mut network, "bank", transfer("1", "0001", "2", "20.05"));
        result.unwrap();
        assert_eq!(stage, TransferStage::EventEmitted);

        let from = balance(&mut network, "bank", "1");
        let to = balance(&mut network, "bank", "2");
        assert_eq!(from, money("55.20"));
        assert_eq!(to, money("30.05"));
        assert_eq!(from.checked_add(to).unwrap(), money("85.25"));

        // the whole balance may be moved, leaving exactly zero
        ok(&mut network, "bank", "transfer", &["1", "0001", "2", "55.2"]);
        assert_eq!(balance(&mut network, "bank", "1"), Money::ZERO);
    }

    #[test]
    fn insufficient_funds_leave_both_accounts_unchanged() {
        let mut network = network();
        ok(&mut network, "bank", "createAccount", &["A", "1", "5", "USD"]);
        ok(&mut network, "bank", "createAccount", &["B", "2", "0", "USD"]);

        let (result, stage) = run(&mut network, "bank", transfer("1", "0001", "2", "5.01"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InsufficientFunds);
        assert_eq!(stage, TransferStage::Validating);
        assert_eq!(balance(&mut network, "bank", "1"), money("5"));
        assert_eq!(balance(&mut network, "bank", "2"), Money::ZERO);
        assert!(network.events().is_empty());
    }

    #[test]
    fn same_bank_failures() {
        let mut network = network();
        ok(&mut network, "bank", "createAccount", &["A", "1", "100", "USD"]);
        ok(&mut network, "bank", "createAccount", &["B", "2", "0", "GBP"]);

        let (result, _) = run(&mut network, "bank", transfer("9", "0001", "2", "1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);

        let (result, _) = run(&mut network, "bank", transfer("1", "0001", "9", "1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);

        let (result, _) = run(&mut network, "bank", transfer("1", "0001", "1", "1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ValidationError);

        let (result, _) = run(&mut network, "bank", transfer("1", "0001", "2", "0"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ValidationError);

        // no USD:GBP pair registered
        let (result, stage) = run(&mut network, "bank", transfer("1", "0001", "2", "1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ConversionFailed);
        assert_eq!(stage, TransferStage::SameBankResolved);

        // a non-positive rate never reaches the balances
        ok(&mut network, "forex", "createUpdateForexPair", &["USD", "GBP", "0"]);
        let (result, _) = run(&mut network, "bank", transfer("1", "0001", "2", "1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ConversionFailed);

        assert_eq!(balance(&mut network, "bank", "1"), money("100"));
        assert_eq!(balance(&mut network, "bank", "2"), Money::ZERO);
    }

    #[test]
    fn rates_are_not_inverted() {
        let mut network = network();
        ok(&mut network, "forex", "createUpdateForexPair", &["USD", "GBP", "0.80"]);
        ok(&mut network, "bank", "createAccount", &["A", "1", "100", "USD"]);
        ok(&mut network, "bank", "createAccount", &["B", "2", "100", "GBP"]);

        ok(&mut network, "bank", "transfer", &["1", "0001", "2", "10"]);
        assert_eq!(balance(&mut network, "bank", "2"), money("108"));

        let (result, _) = run(&mut network, "bank", transfer("2", "0001", "1", "10"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ConversionFailed);
    }

    #[test]
    fn conversion_without_exchange_service() {
        let mut network = network();
        network.deploy("bank3", LedgerService);
        ok(&mut network, "bank3", "init", &["Local Bank", "0003"]);
        ok(&mut network, "bank3", "createAccount", &["A", "1", "100", "USD"]);
        ok(&mut network, "bank3", "createAccount", &["B", "2", "0", "GBP"]);
        ok(&mut network, "bank3", "createAccount", &["C", "3", "0", "USD"]);

        let (result, _) = run(&mut network, "bank3", transfer("1", "0003", "2", "1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ConversionFailed);

        // same currency needs no exchange service
        ok(&mut network, "bank3", "transfer", &["1", "0003", "3", "1"]);

        let (result, _) = run(&mut network, "bank3", transfer("1", "0001", "1", "1"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RoutingFailed);
    }

    #[test]
    fn uninitialized_ledger_cannot_transfer() {
        let mut network = network();
        network.deploy("bare", LedgerService);
        ok(&mut network, "bare", "createAccount", &["A", "1", "100", "USD"]);
        ok(&mut network, "bare", "createAccount", &["B", "2", "0", "USD"]);
        let response = network.invoke_with("bare", "transfer", &["1", "0001", "2", "1"]);
        assert!(!response.is_ok());
        assert!(response.message().contains("not initialized"));

        // funds are checked before the bank record is needed
        let response = network.invoke_with("bare", "transfer", &["1", "0001", "2", "100.01"]);
        assert!(!response.is_ok());
        assert!(response.message().contains("insufficient funds"));
        let err = network
            .execute(&ServiceRef::from("bare"), |stub| {
                check_source(stub, &transfer("1", "0001", "2", "100.01"))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[test]
    fn cross_bank_transfer() {
        let mut network = network();
        ok(&mut network, "ibank", "registerRoute", &["0001", "bank", "forex"]);
        ok(&mut network, "bank", "createAccount", &["Bob Jones", "1", "0", "USD"]);
        ok(&mut network, "bank2", "createAccount", &["Joe Blogs", "1234567", "1000", "USD"]);

        ok(&mut network, "bank2", "transfer", &["1234567", "0001", "1", "1000"]);
        assert_eq!(balance(&mut network, "bank", "1"), money("1000"));
        assert_eq!(balance(&mut network, "bank2", "1234567"), Money::ZERO);

        let record: TransferRecord =
            serde_json::from_slice(&network.events().last().unwrap().payload).unwrap();
        assert_eq!(record.from_bank_id, "0002");
        assert_eq!(record.to_bank_id, "0001");
        assert_eq!(record.amount, money("1000"));
    }

    #[test]
    fn cross_bank_transfer_with_conversion() {
        let mut network = network();
        ok(&mut network, "forex", "createUpdateForexPair", &["USD", "GBP", "0.80"]);
        ok(&mut network, "ibank", "registerRoute", &["0001", "bank", "forex"]);
        ok(&mut network, "bank", "createAccount", &["Bob Jones", "1", "0", "GBP"]);
        ok(&mut network, "bank2", "createAccount", &["Joe Blogs", "7", "50", "USD"]);

        let (result, stage) = run(&mut network, "bank2", transfer("7", "0001", "1", "25"));
        result.unwrap();
        assert_eq!(stage, TransferStage::EventEmitted);
        assert_eq!(balance(&mut network, "bank", "1"), money("20"));
        assert_eq!(balance(&mut network, "bank2", "7"), money("25"));
    }

    #[test]
    fn cross_bank_routing_failures() {
        let mut network = network();
        ok(&mut network, "bank", "createAccount", &["Bob Jones", "1", "0", "GBP"]);
        ok(&mut network, "bank2", "createAccount", &["Joe Blogs", "7", "50", "USD"]);

        let (result, stage) = run(&mut network, "bank2", transfer("7", "0001", "1", "5"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RoutingFailed);
        assert_eq!(stage, TransferStage::Validating);

        // route without an exchange service, currencies differ
        ok(&mut network, "ibank", "registerRoute", &["0001", "bank", ""]);
        let (result, stage) = run(&mut network, "bank2", transfer("7", "0001", "1", "5"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RoutingFailed);
        assert_eq!(stage, TransferStage::RemoteRouted);

        // route to an unknown remote account
        ok(&mut network, "ibank", "registerRoute", &["0001", "bank", "forex"]);
        let (result, _) = run(&mut network, "bank2", transfer("7", "0001", "404", "5"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);

        assert_eq!(balance(&mut network, "bank2", "7"), money("50"));
        assert!(network.events().is_empty());
    }

    #[test]
    fn failed_remote_deposit_leaves_no_stranded_debit() {
        let mut network = network();
        // accepted by the exchange, rejected by the remote deposit
        ok(&mut network, "forex", "createUpdateForexPair", &["USD", "GBP", "-1"]);
        ok(&mut network, "ibank", "registerRoute", &["0001", "bank", "forex"]);
        ok(&mut network, "bank", "createAccount", &["Bob Jones", "1", "0", "GBP"]);
        ok(&mut network, "bank2", "createAccount", &["Joe Blogs", "7", "50", "USD"]);

        let (result, stage) = run(&mut network, "bank2", transfer("7", "0001", "1", "10"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RemoteDepositFailed);
        assert_eq!(stage, TransferStage::Debited);

        let response = network.invoke_with("bank2", "transfer", &["7", "0001", "1", "10"]);
        assert!(!response.is_ok());

        assert_eq!(balance(&mut network, "bank2", "7"), money("50"));
        assert_eq!(balance(&mut network, "bank", "1"), Money::ZERO);
        assert!(network.events().is_empty());

        // only the account creation was ever committed
        let history = network.invoke_with("bank2", "getTransactionHistory", &["7"]);
        let history: serde_json::Value = history.decode("history").unwrap();
        assert_eq!(history["transactions"].as_array().unwrap().len(), 1);
    }
}
