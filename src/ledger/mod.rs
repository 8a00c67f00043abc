use crate::{
    codec,
    command::LedgerCommand,
    error::BankError,
    network::{Service, Stub},
};

use account::AccountLedger;
use history::{TransactionHistory, account_history};
use transfer::{TransferCoordinator, check_source};

pub mod account;
pub mod bank;
pub mod history;
pub mod transfer;

/// A bank: accounts, its own identity record, and transfers out of it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LedgerService;

impl Service for LedgerService {
    fn invoke(
        &self,
        stub: &mut Stub<'_>,
        operation: &str,
        args: &[String],
    ) -> Result<Option<Vec<u8>>, BankError> {
        match LedgerCommand::parse_command(operation, args)? {
            LedgerCommand::Init(command) => {
                bank::initialize(stub, command)?;
                Ok(None)
            }
            LedgerCommand::CreateAccount(command) => {
                AccountLedger::new(stub).create_account(command)?;
                Ok(None)
            }
            LedgerCommand::QueryAccount { account_number } => {
                let account = AccountLedger::new(stub).query_account(&account_number)?;
                Ok(Some(codec::encode("account", &account)?))
            }
            LedgerCommand::Deposit(command) => {
                AccountLedger::new(stub).deposit(&command.account_number, command.amount)?;
                Ok(None)
            }
            LedgerCommand::Transfer(command) => {
                let from = check_source(stub, &command)?;
                let config = bank::load_config(stub)?;
                TransferCoordinator::new(stub, config).transfer(&command, from)?;
                Ok(None)
            }
            LedgerCommand::GetTransactionHistory { account_number } => {
                let history = TransactionHistory {
                    transactions: account_history(stub, &account_number)?.collect(),
                };
                Ok(Some(codec::encode("transaction history", &history)?))
            }
        }
    }
}
