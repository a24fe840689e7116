use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::{Balance, Coins, Credits, RedemptionCommand, UserId};

/// Errors that can occur when reading or writing csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("failed to open {path}: {source}")]
    Open { path: String, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: redemption for user '{user}' missing amount")]
    MissingAmount { line: usize, user: String },

    #[error("failed to write row: {0}")]
    Write(#[from] csv::Error),

    #[error("failed to flush output: {0}")]
    Flush(#[from] io::Error),
}

#[derive(Debug, Deserialize)]
struct RedemptionRow {
    user: String,
    amount: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceRow {
    user: String,
    credits: u64,
    coins: Option<u64>,
}

#[derive(Debug, Serialize)]
struct OutputRow<'a> {
    user: &'a str,
    credits: Credits,
    coins: Coins,
}

fn reader(path: &Path) -> Result<csv::Reader<std::fs::File>, CsvError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.display().to_string(),
            source,
        })
}

/// Read redemption commands (`user,amount`) from a csv file.
///
/// Amounts are kept as free text; they are validated by the ledger.
pub fn read_redemptions(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<RedemptionCommand, CsvError>>, CsvError> {
    let reader = reader(path.as_ref())?;

    Ok(reader
        .into_deserialize::<RedemptionRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            let amount = row.amount.ok_or_else(|| CsvError::MissingAmount {
                line,
                user: row.user.clone(),
            })?;
            Ok(RedemptionCommand {
                user: UserId::new(row.user),
                amount,
            })
        }))
}

/// Read seed balances (`user,credits,coins`) from a csv file.
pub fn read_balances(path: impl AsRef<Path>) -> Result<Vec<(UserId, Balance)>, CsvError> {
    let reader = reader(path.as_ref())?;

    reader
        .into_deserialize::<BalanceRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2;
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            Ok((
                UserId::new(row.user),
                Balance::new(row.credits, row.coins.unwrap_or(0)),
            ))
        })
        .collect()
}

/// Write balances as csv (`user,credits,coins`).
pub fn write_balances<'a, W: io::Write>(
    balances: impl IntoIterator<Item = &'a (UserId, Balance)>,
    output: W,
) -> Result<(), CsvError> {
    let mut writer = csv::Writer::from_writer(output);

    for (user, balance) in balances {
        writer.serialize(OutputRow {
            user: user.as_str(),
            credits: balance.credits,
            coins: balance.coins,
        })?;
    }

    writer.flush()?;
    Ok(())
}
