//! Transaction history reconstruction.
//!
//! The ledger keeps a per-account append-only record store; nothing is
//! persisted locally, so history is rebuilt from the contract on every
//! request: read the record count, fetch each record by ascending index,
//! then reverse for display. A record confirmed after the count was read is
//! simply absent from that reconstruction — never a torn read.

use chrono::{DateTime, TimeZone, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;

use crate::error::Web3Error;
use crate::ledger::{LedgerClient, LedgerRecord, TransferDirection};
use crate::units::Wei;

/// One reconstructed transfer, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    /// Ascending position in the ledger's record store.
    pub sequence_index: u64,
    pub direction: TransferDirection,
    pub amount: Wei,
    pub timestamp: DateTime<Utc>,
    /// Abbreviated display id derived from the recorded block number.
    pub transaction_id: String,
    pub block_number: u64,
}

impl HistoryEntry {
    fn from_record(index: u64, record: LedgerRecord) -> Result<Self, Web3Error> {
        let timestamp = Utc
            .timestamp_opt(record.timestamp as i64, 0)
            .single()
            .ok_or_else(|| {
                Web3Error::HistoryUnavailable(format!(
                    "record {} carries invalid timestamp {}",
                    index, record.timestamp
                ))
            })?;
        Ok(Self {
            sequence_index: index,
            direction: if record.is_deposit {
                TransferDirection::Deposit
            } else {
                TransferDirection::Withdraw
            },
            amount: record.amount,
            timestamp,
            transaction_id: display_id(record.block_number),
            block_number: record.block_number,
        })
    }
}

/// The ledger records a block number rather than a transaction hash; the UI
/// has always shown it in abbreviated `head...tail` form.
fn display_id(block_number: u64) -> String {
    if block_number == 0 {
        return "0x0000...0000".to_string();
    }
    let digits = block_number.to_string();
    if digits.len() <= 10 {
        return digits;
    }
    format!("{}...{}", &digits[..6], &digits[digits.len() - 4..])
}

/// Rebuild the full history for an account, newest first.
///
/// Fails as a whole with `HistoryUnavailable` on any mid-reconstruction
/// read error; partial results are never returned.
pub async fn reconstruct(
    ledger: &LedgerClient,
    account: &str,
) -> Result<Vec<HistoryEntry>, Web3Error> {
    let count = ledger
        .transaction_count(account)
        .await
        .map_err(history_unavailable)?;
    log::debug!("reconstructing {} ledger records for {}", count, account);

    let mut entries: Vec<HistoryEntry> = stream::iter(0..count)
        .then(|index| async move {
            let record = ledger
                .transaction_at(account, index)
                .await
                .map_err(history_unavailable)?;
            HistoryEntry::from_record(index, record)
        })
        .try_collect()
        .await?;

    entries.reverse();
    Ok(entries)
}

fn history_unavailable(err: Web3Error) -> Web3Error {
    match err {
        already @ Web3Error::HistoryUnavailable(_) => already,
        other => Web3Error::HistoryUnavailable(other.to_string()),
    }
}
