//! Replays invocation scripts against an [`InMemoryNetwork`]. Shared by the
//! binary and the integration tests.

use std::io::{Read, Write};

use anyhow::Result;
use tracing::debug;

use crate::{
    exchange::ExchangeService,
    ledger::LedgerService,
    network::{Response, in_memory_network::InMemoryNetwork},
    registry::RegistryService,
};
use result_printer::{ResultRow, print_results};
use script_parser::{ScriptLine, ScriptParser, ServiceKind};

pub mod result_printer;
pub mod script_parser;

pub struct ScriptRunner<'w, R, W: 'w> {
    pub input: R,
    pub output: &'w mut W,
    pub network: InMemoryNetwork,
    /// Called for script lines that cannot be parsed.
    pub error_printer: Box<dyn FnMut(u64, anyhow::Error)>,
}

impl<'w, R, W> ScriptRunner<'w, R, W>
where
    R: Read,
    W: Write + 'w,
{
    /// Returns the network so callers can inspect the final state.
    pub fn run(mut self) -> Result<InMemoryNetwork> {
        let mut rows = Vec::new();
        for (line, parsed) in ScriptParser::new(self.input) {
            let script_line = match parsed {
                Ok(script_line) => script_line,
                Err(err) => {
                    (self.error_printer)(line, err);
                    continue;
                }
            };
            match script_line {
                ScriptLine::Deploy { name, kind } => {
                    debug!(%name, ?kind, "deploying service");
                    match kind {
                        ServiceKind::Ledger => self.network.deploy(name.clone(), LedgerService),
                        ServiceKind::Exchange => {
                            self.network.deploy(name.clone(), ExchangeService)
                        }
                        ServiceKind::Registry => {
                            self.network.deploy(name.clone(), RegistryService)
                        }
                    }
                    rows.push(ResultRow {
                        line,
                        service: name.to_string(),
                        operation: "deploy".to_string(),
                        status: "ok",
                        output: String::new(),
                    });
                }
                ScriptLine::Invoke {
                    service,
                    operation,
                    args,
                } => {
                    let events_before = self.network.events().len();
                    let response = self.network.invoke(&service, &operation, &args);
                    rows.push(ResultRow {
                        line,
                        service: service.to_string(),
                        operation,
                        status: if response.is_ok() { "ok" } else { "error" },
                        output: response_output(&response),
                    });
                    rows.extend(self.network.events()[events_before..].iter().map(|event| {
                        ResultRow {
                            line,
                            service: event.service.to_string(),
                            operation: event.name.clone(),
                            status: "event",
                            output: String::from_utf8_lossy(&event.payload).into_owned(),
                        }
                    }));
                }
            }
        }

        print_results(self.output, rows.into_iter())?;
        Ok(self.network)
    }
}

fn response_output(response: &Response) -> String {
    if response.is_ok() {
        response
            .payload
            .as_deref()
            .map(|payload| String::from_utf8_lossy(payload).into_owned())
            .unwrap_or_default()
    } else {
        response.message().to_string()
    }
}
