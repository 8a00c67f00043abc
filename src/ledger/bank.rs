use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    codec,
    command::InitBank,
    error::BankError,
    network::{ServiceRef, Stub},
};

/// Key of the bank record inside the ledger's namespace.
pub const BANK_RECORD_KEY: &str = "bank";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankRecord {
    #[serde(rename = "name")]
    pub display_name: String,
    #[serde(rename = "bankID")]
    pub bank_id: String,
    #[serde(rename = "forexContract", default)]
    pub default_exchange_service: Option<ServiceRef>,
    #[serde(rename = "interbankContract", default)]
    pub default_interbank_service: Option<ServiceRef>,
}

/// What a transfer needs to know about the bank it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankConfig {
    pub bank_id: String,
    pub exchange_service: Option<ServiceRef>,
    pub interbank_service: Option<ServiceRef>,
}

impl From<BankRecord> for BankConfig {
    fn from(record: BankRecord) -> Self {
        Self {
            bank_id: record.bank_id,
            exchange_service: record.default_exchange_service,
            interbank_service: record.default_interbank_service,
        }
    }
}

/// Writes the bank record, replacing any previous one.
pub fn initialize(stub: &mut Stub<'_>, command: InitBank) -> Result<BankRecord, BankError> {
    let record = BankRecord {
        display_name: command.display_name,
        bank_id: command.bank_id,
        default_exchange_service: command.exchange_service,
        default_interbank_service: command.interbank_service,
    };
    stub.put_state(BANK_RECORD_KEY, codec::encode("bank record", &record)?)?;
    info!(
        ledger = %stub.service_ref(),
        bank_id = %record.bank_id,
        name = %record.display_name,
        "bank initialized"
    );
    Ok(record)
}

pub fn load_record(stub: &mut Stub<'_>) -> Result<BankRecord, BankError> {
    let Some(bytes) = stub.get_state(BANK_RECORD_KEY)? else {
        return Err(BankError::NotFound(format!(
            "bank record of ledger `{}` (ledger is not initialized)",
            stub.service_ref()
        )));
    };
    codec::decode("bank record", &bytes)
}

pub fn load_config(stub: &mut Stub<'_>) -> Result<BankConfig, BankError> {
    load_record(stub).map(BankConfig::from)
}
