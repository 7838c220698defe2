//! Zero-confirmation (zdag) overlay of the mempool.
//!
//! Tracks the projected balance of every sender with unconfirmed allocation
//! sends, when each of those sends arrived, and which senders produced a
//! double-spend-shaped conflict. Everything here is transient: confirmed
//! blocks reset senders and a resync pass drops whatever the mempool no
//! longer backs.
//!
//! Lock order is arrival table first, then balances. Callers holding the
//! driver's validation lock take both through [`ZdagOverlay::lock`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use paydayd_consensus::constants::{DEFAULT_ZDAG_EXPIRY_MS, DEFAULT_ZDAG_SETTLE_MS};
use paydayd_consensus::{Amount, Hash256};
use paydayd_log::Category;

use crate::allocation::AllocationTuple;
use crate::context::MempoolView;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ZdagPolicy {
    /// An arrival younger than this may still be double spent.
    pub settle_ms: i64,
    /// Arrivals older than this, against tip median time, are dropped.
    pub expiry_ms: i64,
}

impl Default for ZdagPolicy {
    fn default() -> Self {
        Self {
            settle_ms: DEFAULT_ZDAG_SETTLE_MS,
            expiry_ms: DEFAULT_ZDAG_EXPIRY_MS,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ZdagStatus {
    NotFound,
    Ok,
    MinorConflict,
    /// Reserved for conflicts detected at the coin level.
    MajorConflict,
}

impl ZdagStatus {
    pub fn code(self) -> i8 {
        match self {
            ZdagStatus::NotFound => -1,
            ZdagStatus::Ok => 0,
            ZdagStatus::MinorConflict => 1,
            ZdagStatus::MajorConflict => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ZdagStatus::NotFound => "not_found",
            ZdagStatus::Ok => "ok",
            ZdagStatus::MinorConflict => "minor_conflict",
            ZdagStatus::MajorConflict => "major_conflict",
        }
    }
}

/// Overlay state of one sender as saved across restarts. Conflicts are not
/// carried over.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SavedSender {
    pub tuple: AllocationTuple,
    pub balance: Amount,
    pub arrivals: Vec<(Hash256, i64)>,
}

#[derive(Debug, Default)]
struct ArrivalTable {
    arrivals: HashMap<AllocationTuple, HashMap<Hash256, i64>>,
    /// Sender -> time its first conflict was seen.
    conflicts: HashMap<AllocationTuple, i64>,
}

impl ArrivalTable {
    fn forget(&mut self, tuple: &AllocationTuple) {
        self.arrivals.remove(tuple);
        self.conflicts.remove(tuple);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Default)]
pub struct ZdagOverlay {
    policy: ZdagPolicy,
    table: Mutex<ArrivalTable>,
    balances: Mutex<HashMap<AllocationTuple, Amount>>,
}

/// Both overlay locks, held for the duration of one mempool check.
pub struct OverlayGuard<'a> {
    table: MutexGuard<'a, ArrivalTable>,
    balances: MutexGuard<'a, HashMap<AllocationTuple, Amount>>,
}

impl OverlayGuard<'_> {
    /// Starts tracking `tuple` at its persisted balance. Returns whether the
    /// entry was created by this call.
    pub fn seed(&mut self, tuple: &AllocationTuple, persisted: Amount) -> bool {
        if self.balances.contains_key(tuple) {
            return false;
        }
        self.balances.insert(tuple.clone(), persisted);
        true
    }

    pub fn balance(&self, tuple: &AllocationTuple) -> Option<Amount> {
        self.balances.get(tuple).copied()
    }

    pub fn set_balance(&mut self, tuple: &AllocationTuple, balance: Amount) {
        self.balances.insert(tuple.clone(), balance);
    }

    pub fn remove_balance(&mut self, tuple: &AllocationTuple) {
        self.balances.remove(tuple);
    }

    /// Adds `amount` to the projected balance of a receiver, seeding it
    /// from `persisted` first.
    pub fn credit(&mut self, tuple: &AllocationTuple, persisted: Amount, amount: Amount) {
        let balance = self.balances.entry(tuple.clone()).or_insert(persisted);
        *balance = balance.saturating_add(amount);
    }

    pub fn mark_conflict(&mut self, tuple: &AllocationTuple, now_ms: i64) {
        if !self.table.conflicts.contains_key(tuple) {
            paydayd_log::log_category!(Category::Zdag, "sender {tuple} is now conflicted");
            self.table.conflicts.insert(tuple.clone(), now_ms);
        }
    }

    pub fn has_arrival(&self, tuple: &AllocationTuple, txid: &Hash256) -> bool {
        self.table
            .arrivals
            .get(tuple)
            .is_some_and(|arrivals| arrivals.contains_key(txid))
    }

    pub fn record_arrival(&mut self, tuple: &AllocationTuple, txid: Hash256, now_ms: i64) {
        self.table
            .arrivals
            .entry(tuple.clone())
            .or_default()
            .insert(txid, now_ms);
    }
}

impl ZdagOverlay {
    pub fn new(policy: ZdagPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn policy(&self) -> ZdagPolicy {
        self.policy
    }

    pub fn lock(&self) -> OverlayGuard<'_> {
        let table = lock(&self.table);
        let balances = lock(&self.balances);
        OverlayGuard { table, balances }
    }

    pub fn balance(&self, tuple: &AllocationTuple) -> Option<Amount> {
        lock(&self.balances).get(tuple).copied()
    }

    pub fn is_conflicted(&self, tuple: &AllocationTuple) -> bool {
        lock(&self.table).conflicts.contains_key(tuple)
    }

    /// Status of one zdag transaction sent by `sender`.
    pub fn tx_status(&self, sender: &AllocationTuple, txid: &Hash256, now_ms: i64) -> ZdagStatus {
        let table = lock(&self.table);
        let conflict_at = table.conflicts.get(sender).copied();
        let arrivals = table.arrivals.get(sender);
        match arrivals.and_then(|arrivals| arrivals.get(txid)) {
            Some(arrival) => {
                let young = now_ms - arrival <= self.policy.settle_ms;
                let after_conflict = conflict_at.is_some_and(|at| at < *arrival);
                if young || after_conflict {
                    ZdagStatus::MinorConflict
                } else {
                    ZdagStatus::Ok
                }
            }
            None => {
                let any_young = arrivals.is_some_and(|arrivals| {
                    arrivals
                        .values()
                        .any(|arrival| now_ms - arrival <= self.policy.settle_ms)
                });
                if conflict_at.is_some() || any_young {
                    ZdagStatus::MinorConflict
                } else {
                    ZdagStatus::NotFound
                }
            }
        }
    }

    /// Status of a sender across all of its zdag transactions.
    pub fn sender_status(&self, sender: &AllocationTuple, now_ms: i64) -> ZdagStatus {
        let table = lock(&self.table);
        let arrivals = table.arrivals.get(sender).filter(|arrivals| !arrivals.is_empty());
        let any_young = arrivals.is_some_and(|arrivals| {
            arrivals
                .values()
                .any(|arrival| now_ms - arrival <= self.policy.settle_ms)
        });
        if table.conflicts.contains_key(sender) || any_young {
            ZdagStatus::MinorConflict
        } else if arrivals.is_some() {
            ZdagStatus::Ok
        } else {
            ZdagStatus::NotFound
        }
    }

    /// Settles `tuple` after `txid` was confirmed by a block. The sender is
    /// forgotten entirely once none of its arrivals is still live; with
    /// `expiry_only` arrivals missing from the mempool are ignored and the
    /// confirmed txid is not removed individually. Returns whether the sender
    /// was forgotten.
    pub fn reset_sender(
        &self,
        tuple: &AllocationTuple,
        txid: &Hash256,
        miner: bool,
        expiry_only: bool,
        median_time_ms: i64,
        mempool: &dyn MempoolView,
    ) -> bool {
        if miner {
            return true;
        }
        let mut table = lock(&self.table);
        let mut forget = match table.arrivals.get(tuple) {
            Some(arrivals) => !arrivals.iter().any(|(arrival_txid, arrival)| {
                if expiry_only && !mempool.contains(arrival_txid) {
                    return false;
                }
                median_time_ms - arrival <= self.policy.expiry_ms
            }),
            None => true,
        };
        if forget {
            table.forget(tuple);
        } else if !expiry_only {
            if let Some(arrivals) = table.arrivals.get_mut(tuple) {
                arrivals.remove(txid);
                if arrivals.is_empty() {
                    forget = true;
                }
            }
            if forget {
                table.forget(tuple);
            }
        }
        if forget {
            lock(&self.balances).remove(tuple);
            paydayd_log::log_category!(Category::Zdag, "reset zdag state of {tuple}");
        }
        forget
    }

    /// Drops overlay state no longer backed by the mempool or older than the
    /// expiry window. Returns the number of senders dropped.
    pub fn resync(&self, mempool: &dyn MempoolView, median_time_ms: i64) -> usize {
        let mut table = lock(&self.table);
        let mut balances = lock(&self.balances);
        let mut dropped = Vec::new();
        for tuple in balances.keys() {
            let Some(arrivals) = table.arrivals.get_mut(tuple) else {
                dropped.push(tuple.clone());
                continue;
            };
            arrivals.retain(|txid, arrival| {
                mempool.contains(txid) && median_time_ms - *arrival <= self.policy.expiry_ms
            });
            if arrivals.is_empty() {
                dropped.push(tuple.clone());
            }
        }
        for tuple in &dropped {
            balances.remove(tuple);
            table.forget(tuple);
        }
        if !dropped.is_empty() {
            paydayd_log::log_category!(
                Category::Zdag,
                "resync removed {} expired senders from the zdag overlay",
                dropped.len()
            );
        }
        dropped.len()
    }

    /// Projected balances and arrivals of every tracked sender, in tuple
    /// order.
    pub fn snapshot(&self) -> Vec<SavedSender> {
        let table = lock(&self.table);
        let balances = lock(&self.balances);
        let mut saved: Vec<SavedSender> = balances
            .iter()
            .map(|(tuple, balance)| {
                let mut arrivals: Vec<(Hash256, i64)> = table
                    .arrivals
                    .get(tuple)
                    .map(|arrivals| arrivals.iter().map(|(txid, at)| (*txid, *at)).collect())
                    .unwrap_or_default();
                arrivals.sort();
                SavedSender {
                    tuple: tuple.clone(),
                    balance: *balance,
                    arrivals,
                }
            })
            .collect();
        saved.sort_by(|a, b| a.tuple.cmp(&b.tuple));
        saved
    }

    pub fn restore(&self, saved: Vec<SavedSender>) {
        let mut table = lock(&self.table);
        let mut balances = lock(&self.balances);
        for sender in saved {
            if !sender.arrivals.is_empty() {
                table
                    .arrivals
                    .entry(sender.tuple.clone())
                    .or_default()
                    .extend(sender.arrivals);
            }
            balances.insert(sender.tuple, sender.balance);
        }
    }

    pub fn tracked_senders(&self) -> usize {
        lock(&self.balances).len()
    }
}
