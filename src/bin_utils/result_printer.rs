use std::io::Write;

use anyhow::Context;
use csv::Writer;
use serde::Serialize;

/// One line of output: the outcome of an invocation, or an emitted event.
#[derive(Debug, Serialize)]
pub struct ResultRow {
    pub line: u64,
    pub service: String,
    pub operation: String,
    pub status: &'static str,
    pub output: String,
}

pub fn print_results<W>(
    output: &mut W,
    rows: impl Iterator<Item = ResultRow>,
) -> anyhow::Result<()>
where
    W: Write,
{
    let mut writer = Writer::from_writer(output);
    for row in rows {
        let line = row.line;
        writer
            .serialize(row)
            .with_context(|| format!("writing result of line {line}"))?;
    }
    writer.flush().context("flushing results")?;
    Ok(())
}
