use std::{io::Read, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};
use csv::{StringRecord, StringRecordsIntoIter, Trim};

use crate::network::ServiceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Ledger,
    Exchange,
    Registry,
}

impl FromStr for ServiceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ledger" => Ok(Self::Ledger),
            "exchange" => Ok(Self::Exchange),
            "registry" => Ok(Self::Registry),
            other => Err(anyhow!(
                "unknown service kind `{other}`, expecting ledger, exchange or registry"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptLine {
    Deploy {
        name: ServiceRef,
        kind: ServiceKind,
    },
    Invoke {
        service: ServiceRef,
        operation: String,
        args: Vec<String>,
    },
}

impl TryFrom<&StringRecord> for ScriptLine {
    type Error = anyhow::Error;

    fn try_from(record: &StringRecord) -> Result<Self> {
        let mut fields = record.iter();
        let service = fields.next().context("missing service")?;
        let operation = fields.next().context("missing operation")?;
        if service.is_empty() || operation.is_empty() {
            bail!("service and operation must not be empty");
        }
        if service == "deploy" {
            let kind = fields.next().context("missing service kind for deploy")?;
            return Ok(Self::Deploy {
                name: ServiceRef::from(operation),
                kind: kind.parse()?,
            });
        }
        Ok(Self::Invoke {
            service: ServiceRef::from(service),
            operation: operation.to_string(),
            args: fields.map(ToString::to_string).collect(),
        })
    }
}

/// Parses an invocation script in CSV format.
///
/// Each row is either `deploy,<name>,<kind>` or
/// `<service>,<operation>,<arg>...`. Lines starting with `#` are ignored.
pub struct ScriptParser<R> {
    records: StringRecordsIntoIter<R>,
}

impl<R> ScriptParser<R>
where
    R: Read,
{
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(Trim::All)
            .flexible(true)
            .comment(Some(b'#'))
            .from_reader(source);

        Self {
            records: reader.into_records(),
        }
    }
}

impl<R> Iterator for ScriptParser<R>
where
    R: Read,
{
    type Item = (u64, Result<ScriptLine>);

    fn next(&mut self) -> Option<Self::Item> {
        let fallback_line = self.records.reader().position().line();
        self.records.next().map(|record| match record {
            Ok(record) => {
                let line = record.position().map_or(fallback_line, |pos| pos.line());
                (line, ScriptLine::try_from(&record))
            }
            Err(err) => (fallback_line, Err(err.into())),
        })
    }
}
