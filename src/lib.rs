/// Exact decimal money, exchange rates and currency codes.
pub mod money;

/// Error kinds surfaced to callers of every service operation.
pub mod error;

/// Typed commands for every service, parsed from positional string
/// arguments before they reach any business logic.
pub mod command;

/// Versioned key-value store interface, plus "in memory" implementation.
/// One write-set per invocation, committed as a whole or not at all.
pub mod store;

/// Invocation host: deploys services, routes nested invocations between
/// them and commits each top-level invocation's write-set.
pub mod network;

/// A bank's ledger: accounts, history, bank registration and the transfer
/// protocol.
pub mod ledger;

/// Directional currency exchange rates.
pub mod exchange;

/// Bank ID to ledger/exchange service routes, and the credit leg of
/// transfers between banks.
pub mod registry;

/// JSON encoding of stored records and response payloads.
mod codec;

/// Script runner used by the binary. Kept in the library so the
/// integration tests can drive it.
pub mod bin_utils;
