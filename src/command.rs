use thiserror::Error;

use crate::{
    ledger::bank::BANK_RECORD_KEY,
    money::{CurrencyCode, ExchangeRate, Money, MoneyError},
    network::ServiceRef,
};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid function `{operation}`")]
    UnknownOperation { operation: String },
    #[error("incorrect arguments for `{operation}`, expecting {expected}")]
    ArgumentCount {
        operation: &'static str,
        expected: &'static str,
    },
    #[error("invalid {field} for `{operation}`: {source}")]
    InvalidAmount {
        operation: &'static str,
        field: &'static str,
        #[source]
        source: MoneyError,
    },
    #[error("invalid {field} for `{operation}`: {reason}")]
    InvalidArgument {
        operation: &'static str,
        field: &'static str,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitBank {
    pub display_name: String,
    pub bank_id: String,
    pub exchange_service: Option<ServiceRef>,
    pub interbank_service: Option<ServiceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccount {
    pub owner: String,
    pub account_number: String,
    pub initial_balance: Money,
    pub currency: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub account_number: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub from_account: String,
    pub to_bank_id: String,
    pub to_account: String,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerCommand {
    Init(InitBank),
    CreateAccount(CreateAccount),
    QueryAccount { account_number: String },
    Deposit(Deposit),
    Transfer(Transfer),
    GetTransactionHistory { account_number: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertPair {
    pub base: CurrencyCode,
    pub counter: CurrencyCode,
    pub rate: ExchangeRate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeCommand {
    CreateUpdateForexPair(UpsertPair),
    GetForexPair {
        base: CurrencyCode,
        counter: CurrencyCode,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRoute {
    pub bank_id: String,
    pub ledger_service: ServiceRef,
    pub exchange_service: Option<ServiceRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterbankTransfer {
    pub to_account: String,
    pub to_bank_id: String,
    pub amount: Money,
    pub currency: CurrencyCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryCommand {
    RegisterRoute(RegisterRoute),
    GetRoute { bank_id: String },
    InterbankTransfer(InterbankTransfer),
}

impl LedgerCommand {
    pub fn parse_command(operation: &str, args: &[String]) -> Result<Self, CommandError> {
        match operation {
            "init" => {
                let operation = "init";
                if !(2..=4).contains(&args.len()) {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "a bank name, ID, and optionally the exchange and interbank services",
                    });
                }
                Ok(Self::Init(InitBank {
                    display_name: required(operation, "bank name", &args[0])?,
                    bank_id: required(operation, "bank ID", &args[1])?,
                    exchange_service: optional_service(args.get(2)),
                    interbank_service: optional_service(args.get(3)),
                }))
            }
            "createAccount" => {
                let operation = "createAccount";
                let [owner, account_number, balance, currency] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "customer name, account number, balance and currency",
                    });
                };
                Ok(Self::CreateAccount(CreateAccount {
                    owner: required(operation, "customer name", owner)?,
                    account_number: parse_account_number(operation, account_number)?,
                    initial_balance: Money::parse_non_negative(balance).map_err(|source| {
                        CommandError::InvalidAmount {
                            operation,
                            field: "balance",
                            source,
                        }
                    })?,
                    currency: parse_currency(operation, currency)?,
                }))
            }
            "queryAccount" => {
                let operation = "queryAccount";
                let [account_number] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "the account number",
                    });
                };
                Ok(Self::QueryAccount {
                    account_number: parse_account_number(operation, account_number)?,
                })
            }
            "deposit" => {
                let operation = "deposit";
                let [account_number, amount] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "account number and amount",
                    });
                };
                Ok(Self::Deposit(Deposit {
                    account_number: parse_account_number(operation, account_number)?,
                    amount: parse_positive(operation, amount)?,
                }))
            }
            "transfer" => {
                let operation = "transfer";
                let [from_account, to_bank_id, to_account, amount] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "fromAccount, toBank, toAccount, amount",
                    });
                };
                Ok(Self::Transfer(Transfer {
                    from_account: parse_account_number(operation, from_account)?,
                    to_bank_id: required(operation, "bank ID", to_bank_id)?,
                    to_account: required(operation, "account number", to_account)?,
                    amount: parse_positive(operation, amount)?,
                }))
            }
            "getTransactionHistory" => {
                let operation = "getTransactionHistory";
                let [account_number] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "the account number",
                    });
                };
                Ok(Self::GetTransactionHistory {
                    account_number: parse_account_number(operation, account_number)?,
                })
            }
            _ => Err(CommandError::UnknownOperation {
                operation: operation.to_string(),
            }),
        }
    }
}

impl ExchangeCommand {
    pub fn parse_command(operation: &str, args: &[String]) -> Result<Self, CommandError> {
        match operation {
            "createUpdateForexPair" => {
                let operation = "createUpdateForexPair";
                let [base, counter, rate] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "base currency, counter currency, rate",
                    });
                };
                Ok(Self::CreateUpdateForexPair(UpsertPair {
                    base: parse_currency(operation, base)?,
                    counter: parse_currency(operation, counter)?,
                    rate: rate
                        .parse()
                        .map_err(|source| CommandError::InvalidAmount {
                            operation,
                            field: "rate",
                            source,
                        })?,
                }))
            }
            "getForexPair" => {
                let operation = "getForexPair";
                let [base, counter] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "the base currency and counter currency",
                    });
                };
                Ok(Self::GetForexPair {
                    base: parse_currency(operation, base)?,
                    counter: parse_currency(operation, counter)?,
                })
            }
            _ => Err(CommandError::UnknownOperation {
                operation: operation.to_string(),
            }),
        }
    }
}

impl RegistryCommand {
    pub fn parse_command(operation: &str, args: &[String]) -> Result<Self, CommandError> {
        match operation {
            "registerRoute" => {
                let operation = "registerRoute";
                let [bank_id, ledger_service, exchange_service] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "bank ID, ledger service, exchange service",
                    });
                };
                Ok(Self::RegisterRoute(RegisterRoute {
                    bank_id: required(operation, "bank ID", bank_id)?,
                    ledger_service: ServiceRef::new(required(
                        operation,
                        "ledger service",
                        ledger_service,
                    )?),
                    exchange_service: optional_service(Some(exchange_service)),
                }))
            }
            "getRoute" => {
                let operation = "getRoute";
                let [bank_id] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "the bank ID",
                    });
                };
                Ok(Self::GetRoute {
                    bank_id: required(operation, "bank ID", bank_id)?,
                })
            }
            "interbankTransfer" => {
                let operation = "interbankTransfer";
                let [to_account, to_bank_id, amount, currency] = args else {
                    return Err(CommandError::ArgumentCount {
                        operation,
                        expected: "toAccount, toBankID, amount, currency",
                    });
                };
                Ok(Self::InterbankTransfer(InterbankTransfer {
                    to_account: required(operation, "account number", to_account)?,
                    to_bank_id: required(operation, "bank ID", to_bank_id)?,
                    amount: parse_positive(operation, amount)?,
                    currency: parse_currency(operation, currency)?,
                }))
            }
            _ => Err(CommandError::UnknownOperation {
                operation: operation.to_string(),
            }),
        }
    }
}

fn required(
    operation: &'static str,
    field: &'static str,
    value: &str,
) -> Result<String, CommandError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CommandError::InvalidArgument {
            operation,
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(value.to_string())
}

/// Local account numbers share the key space with the bank record.
fn parse_account_number(operation: &'static str, value: &str) -> Result<String, CommandError> {
    let account_number = required(operation, "account number", value)?;
    if account_number == BANK_RECORD_KEY {
        return Err(CommandError::InvalidArgument {
            operation,
            field: "account number",
            reason: format!("`{BANK_RECORD_KEY}` is reserved"),
        });
    }
    Ok(account_number)
}

fn parse_positive(operation: &'static str, value: &str) -> Result<Money, CommandError> {
    Money::parse_positive(value).map_err(|source| CommandError::InvalidAmount {
        operation,
        field: "amount",
        source,
    })
}

fn parse_currency(operation: &'static str, value: &str) -> Result<CurrencyCode, CommandError> {
    value
        .parse()
        .map_err(|reason| CommandError::InvalidArgument {
            operation,
            field: "currency",
            reason,
        })
}

/// An empty reference means "not configured".
fn optional_service(value: Option<&String>) -> Option<ServiceRef> {
    value
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(ServiceRef::from)
}
