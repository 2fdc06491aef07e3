//! Transaction deduplication and per-destination selection.
//!
//! Pure set logic over a freshly fetched batch: which records are new,
//! and which of the new records each destination should receive. Marking
//! records seen is the caller's job and covers the WHOLE fetched batch;
//! filtering affects delivery, never the seen-set.

use std::collections::{BTreeMap, HashSet};

use crate::data::models::{Transaction, TransactionKind, User};

/// Records in the batch that have never been seen, in announcement order
/// (date, then provider id).
pub fn partition_new(batch: &[Transaction], known: &HashSet<i64>) -> Vec<Transaction> {
    let mut fresh: Vec<Transaction> = batch
        .iter()
        .filter(|tx| !known.contains(&tx.transaction_id))
        .cloned()
        .collect();
    fresh.sort_by_key(|tx| (tx.transaction_date, tx.transaction_id));
    fresh
}

/// Group records by classification.
pub fn group_by_kind(
    transactions: &[Transaction],
) -> BTreeMap<TransactionKind, Vec<&Transaction>> {
    let mut groups: BTreeMap<TransactionKind, Vec<&Transaction>> = BTreeMap::new();
    for tx in transactions {
        groups.entry(tx.kind()).or_default().push(tx);
    }
    groups
}

/// The subset of new records this user should receive: intersection of
/// present kinds with the user's enabled kinds, minus minor-league moves
/// when the major-league-only filter is set.
pub fn select_for_user(transactions: &[Transaction], user: &User) -> Vec<Transaction> {
    if !user.subscribed {
        return Vec::new();
    }
    transactions
        .iter()
        .filter(|tx| user.wants(tx))
        .cloned()
        .collect()
}
