use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    codec,
    command::CreateAccount,
    error::BankError,
    money::{CurrencyCode, Money},
    network::Stub,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "name")]
    pub owner: String,
    #[serde(rename = "id")]
    pub account_number: String,
    pub balance: Money,
    pub currency: CurrencyCode,
}

impl Account {
    pub fn credit(&mut self, amount: Money) -> Result<(), BankError> {
        if !amount.is_positive() {
            return Err(BankError::Validation(format!(
                "credit to account {} must be a positive amount, got {amount}",
                self.account_number
            )));
        }
        self.balance = self.balance.checked_add(amount)?;
        Ok(())
    }

    pub fn debit(&mut self, amount: Money) -> Result<(), BankError> {
        if !amount.is_positive() {
            return Err(BankError::Validation(format!(
                "debit from account {} must be a positive amount, got {amount}",
                self.account_number
            )));
        }
        if self.balance < amount {
            return Err(BankError::InsufficientFunds {
                account: self.account_number.clone(),
                balance: self.balance,
                requested: amount,
            });
        }
        self.balance = self.balance.checked_sub(amount)?;
        Ok(())
    }
}

/// Account records of the ledger the stub is scoped to.
pub struct AccountLedger<'s, 'a> {
    stub: &'s mut Stub<'a>,
}

impl<'s, 'a> AccountLedger<'s, 'a> {
    pub fn new(stub: &'s mut Stub<'a>) -> Self {
        Self { stub }
    }

    /// Fails if the account number is already taken.
    pub fn create_account(&mut self, command: CreateAccount) -> Result<Account, BankError> {
        if self.stub.get_state(&command.account_number)?.is_some() {
            return Err(BankError::Validation(format!(
                "account {} already exists",
                command.account_number
            )));
        }
        let account = Account {
            owner: command.owner,
            account_number: command.account_number,
            balance: command.initial_balance,
            currency: command.currency,
        };
        self.store(&account)?;
        debug!(account = %account.account_number, balance = %account.balance, "account created");
        Ok(account)
    }

    pub fn query_account(&mut self, account_number: &str) -> Result<Account, BankError> {
        let Some(bytes) = self.stub.get_state(account_number)? else {
            return Err(BankError::NotFound(format!("account {account_number}")));
        };
        codec::decode(&format!("account {account_number}"), &bytes)
    }

    pub fn deposit(&mut self, account_number: &str, amount: Money) -> Result<Account, BankError> {
        let mut account = self.query_account(account_number)?;
        account.credit(amount)?;
        self.store(&account)?;
        debug!(account = account_number, %amount, balance = %account.balance, "deposited");
        Ok(account)
    }

    pub fn debit(&mut self, account_number: &str, amount: Money) -> Result<Account, BankError> {
        let mut account = self.query_account(account_number)?;
        account.debit(amount)?;
        self.store(&account)?;
        debug!(account = account_number, %amount, balance = %account.balance, "debited");
        Ok(account)
    }

    pub(crate) fn store(&mut self, account: &Account) -> Result<(), BankError> {
        let bytes = codec::encode("account", account)?;
        self.stub.put_state(&account.account_number, bytes)?;
        Ok(())
    }
}
