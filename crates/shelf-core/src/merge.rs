//! Snapshot reconciliation: whole-entity last-write-wins over a key union

use crate::clock::{Clock, SystemClock};
use crate::model::{Item, Snapshot, Transaction};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::trace;

/// Which side keeps a shared key when both copies carry the same stamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The remote copy wins equal stamps
    #[default]
    Remote,
    /// The local copy wins equal stamps
    Local,
}

impl std::str::FromStr for TieBreak {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote" => Ok(TieBreak::Remote),
            "local" => Ok(TieBreak::Local),
            _ => Err(format!("Unknown tie-break rule: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Local,
    Remote,
}

/// Per-collection counts of where the merged entities came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnionStats {
    pub local_only: usize,
    pub remote_only: usize,
    pub local_won: usize,
    pub remote_won: usize,
}

impl UnionStats {
    pub fn total(&self) -> usize {
        self.local_only + self.remote_only + self.local_won + self.remote_won
    }
}

/// Summary of one merge, for logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub items: UnionStats,
    pub transactions: UnionStats,
    /// True when logo and company name were taken from the remote side
    pub branding_from_remote: bool,
}

/// Deterministic reconciliation of a local and a remote snapshot
#[derive(Clone)]
pub struct MergeEngine {
    clock: Arc<dyn Clock>,
    tie_break: TieBreak,
}

impl MergeEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tie_break: TieBreak::default(),
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Merge two snapshots into a new one
    pub fn merge(&self, local: &Snapshot, remote: &Snapshot) -> Snapshot {
        self.merge_with_report(local, remote).0
    }

    /// Merge two snapshots and report which side each entity came from.
    ///
    /// Output order is local entities in local order, then remote-only
    /// entities in remote order. Transactions are then stable-sorted by `ts`.
    pub fn merge_with_report(&self, local: &Snapshot, remote: &Snapshot) -> (Snapshot, MergeReport) {
        let (items, item_stats) = self.union(
            &local.items,
            &remote.items,
            |i: &Item| i.sku.as_str(),
            |i: &Item| i.updated_at,
        );

        let (mut transactions, tx_stats) = self.union(
            &local.transactions,
            &remote.transactions,
            |t: &Transaction| t.id.as_str(),
            Transaction::effective_updated_at,
        );
        // Vec::sort_by_key is stable
        transactions.sort_by_key(|t| t.ts);

        let branding_from_remote = self.remote_wins(local.last_write_ts, remote.last_write_ts);
        let branding = if branding_from_remote { remote } else { local };

        let merged = Snapshot {
            // Remote versions are below u64::MAX once validated; saturate so a
            // corrupt local record cannot wrap to 0
            version: local.version.max(remote.version).saturating_add(1),
            last_write_ts: self.clock.now_ms(),
            items,
            transactions,
            logo_data_url: branding.logo_data_url.clone(),
            company_name: branding.company_name.clone(),
        };

        let report = MergeReport {
            items: item_stats,
            transactions: tx_stats,
            branding_from_remote,
        };
        trace!(
            version = merged.version,
            items = merged.items.len(),
            transactions = merged.transactions.len(),
            branding_from_remote,
            "Snapshots merged"
        );

        (merged, report)
    }

    fn remote_wins(&self, local_ts: u64, remote_ts: u64) -> bool {
        match remote_ts.cmp(&local_ts) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => self.tie_break == TieBreak::Remote,
        }
    }

    fn union<T, K, S>(&self, local: &[T], remote: &[T], key: K, stamp: S) -> (Vec<T>, UnionStats)
    where
        T: Clone,
        K: Fn(&T) -> &str,
        S: Fn(&T) -> u64,
    {
        let mut slots: Vec<(T, Side)> = Vec::with_capacity(local.len() + remote.len());
        let mut index: HashMap<&str, usize> = HashMap::with_capacity(local.len() + remote.len());

        for (side, entities) in [(Side::Local, local), (Side::Remote, remote)] {
            for entity in entities {
                match index.get(key(entity)) {
                    None => {
                        index.insert(key(entity), slots.len());
                        slots.push((entity.clone(), side));
                    }
                    Some(&at) => {
                        let (existing, existing_side) = &slots[at];
                        let replace = if *existing_side == side {
                            // Duplicate key within one side: the later copy wins ties
                            stamp(entity) >= stamp(existing)
                        } else {
                            self.remote_wins(stamp(existing), stamp(entity))
                        };
                        if replace {
                            slots[at] = (entity.clone(), side);
                        }
                    }
                }
            }
        }

        let local_keys: HashSet<&str> = local.iter().map(&key).collect();
        let remote_keys: HashSet<&str> = remote.iter().map(&key).collect();

        let mut stats = UnionStats::default();
        for (entity, side) in &slots {
            let k = key(entity);
            let shared = local_keys.contains(k) && remote_keys.contains(k);
            match (shared, side) {
                (false, Side::Local) => stats.local_only += 1,
                (false, Side::Remote) => stats.remote_only += 1,
                (true, Side::Local) => stats.local_won += 1,
                (true, Side::Remote) => stats.remote_won += 1,
            }
        }

        (slots.into_iter().map(|(entity, _)| entity).collect(), stats)
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl std::fmt::Debug for MergeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeEngine")
            .field("tie_break", &self.tie_break)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::TxKind;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn engine() -> MergeEngine {
        MergeEngine::new(Arc::new(ManualClock::new(9_999)))
    }

    fn item(sku: &str, updated_at: u64) -> Item {
        let mut item = Item::placeholder(sku);
        item.updated_at = updated_at;
        item
    }

    fn tx(id: &str, ts: u64, updated_at: Option<u64>) -> Transaction {
        Transaction {
            id: id.into(),
            ts,
            sku: "A1".into(),
            kind: TxKind::In,
            qty: 1.0,
            price: 0.0,
            confirmed: true,
            updated_at,
        }
    }

    fn snapshot(version: u64, last_write_ts: u64, items: Vec<Item>) -> Snapshot {
        Snapshot {
            version,
            last_write_ts,
            items,
            ..Default::default()
        }
    }

    #[test]
    fn test_reference_scenario() {
        let local = snapshot(5, 0, vec![item("A1", 100)]);
        let remote = snapshot(7, 0, vec![item("A1", 200), item("B2", 50)]);

        let merged = engine().merge(&local, &remote);

        assert_eq!(merged.version, 8);
        assert_eq!(merged.items.len(), 2);
        assert_eq!(merged.item("A1").unwrap().updated_at, 200);
        assert_eq!(merged.item("B2").unwrap().updated_at, 50);
        assert_eq!(merged.last_write_ts, 9_999);
    }

    #[test]
    fn test_newer_local_wins() {
        let mut newer = item("A1", 300);
        newer.name = "local name".into();
        let local = snapshot(1, 0, vec![newer]);
        let remote = snapshot(1, 0, vec![item("A1", 200)]);

        let (merged, report) = engine().merge_with_report(&local, &remote);
        assert_eq!(merged.item("A1").unwrap().name, "local name");
        assert_eq!(report.items.local_won, 1);
        assert_eq!(report.items.remote_won, 0);
    }

    #[test]
    fn test_tie_break_rules() {
        let mut l = item("A1", 100);
        l.name = "local".into();
        let mut r = item("A1", 100);
        r.name = "remote".into();
        let local = snapshot(1, 0, vec![l]);
        let remote = snapshot(1, 0, vec![r]);

        let merged = engine().merge(&local, &remote);
        assert_eq!(merged.item("A1").unwrap().name, "remote");

        let merged = engine().with_tie_break(TieBreak::Local).merge(&local, &remote);
        assert_eq!(merged.item("A1").unwrap().name, "local");
    }

    #[test]
    fn test_transactions_fall_back_to_ts_and_sort() {
        let mut local = Snapshot::new();
        local.transactions = vec![tx("T1", 10, None), tx("T3", 30, Some(31))];

        let mut remote = Snapshot::new();
        let mut edited = tx("T1", 10, Some(50));
        edited.confirmed = false;
        remote.transactions = vec![tx("T2", 20, None), edited, tx("T0", 5, None)];

        let merged = engine().merge(&local, &remote);
        let ids: Vec<&str> = merged.transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["T0", "T1", "T2", "T3"]);
        // Remote T1 has updatedAt 50 > local fallback ts 10
        assert!(!merged.transaction("T1").unwrap().confirmed);
    }

    #[test]
    fn test_equal_ts_keeps_union_order() {
        let mut local = Snapshot::new();
        local.transactions = vec![tx("L1", 10, None), tx("L2", 10, None)];
        let mut remote = Snapshot::new();
        remote.transactions = vec![tx("R1", 10, None), tx("R0", 5, None)];

        let merged = engine().merge(&local, &remote);
        let ids: Vec<&str> = merged.transactions.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["R0", "L1", "L2", "R1"]);
    }

    #[test]
    fn test_branding_is_taken_as_a_pair() {
        let mut local = snapshot(1, 500, vec![]);
        local.company_name = "Local Co".into();
        local.logo_data_url = String::new();

        let mut remote = snapshot(1, 400, vec![]);
        remote.company_name = "Remote Co".into();
        remote.logo_data_url = "data:image/png;base64,AAAA".into();

        let (merged, report) = engine().merge_with_report(&local, &remote);
        assert!(!report.branding_from_remote);
        assert_eq!(merged.branding(), ("", "Local Co"));

        remote.last_write_ts = 600;
        let merged = engine().merge(&local, &remote);
        assert_eq!(merged.branding(), ("data:image/png;base64,AAAA", "Remote Co"));
    }

    #[test]
    fn test_duplicate_keys_collapse() {
        let local = snapshot(1, 0, vec![item("A1", 10), item("A1", 40), item("A1", 20)]);
        let merged = engine().merge(&local, &Snapshot::new());
        assert_eq!(merged.items.len(), 1);
        assert_eq!(merged.items[0].updated_at, 40);
    }

    #[test]
    fn test_version_never_wraps() {
        let top = snapshot(u64::MAX, 0, vec![item("A1", 1)]);
        let merged = engine().merge(&Snapshot::new(), &top);
        assert_eq!(merged.version, u64::MAX);
        assert_eq!(merged.items.len(), 1);

        let merged = engine().merge(&snapshot(u64::MAX - 1, 0, vec![]), &Snapshot::new());
        assert_eq!(merged.version, u64::MAX);
    }

    #[test]
    fn test_merge_with_empty() {
        let local = snapshot(3, 100, vec![item("A1", 1), item("B2", 2)]);
        let merged = engine().merge(&local, &Snapshot::new());
        assert_eq!(merged.items, local.items);
        assert_eq!(merged.version, 4);

        let merged = engine().merge(&Snapshot::new(), &local);
        assert_eq!(merged.items, local.items);
    }

    fn arb_snapshot() -> impl Strategy<Value = Snapshot> {
        let items = prop::collection::btree_map("[A-E][0-9]", 0u64..50, 0..8);
        let txs = prop::collection::btree_map(
            "T[0-9]{2}",
            (0u64..100, prop::option::of(0u64..200)),
            0..8,
        );
        (0u64..20, 0u64..1000, items, txs).prop_map(|(version, last_write_ts, items, txs)| {
            let mut snap = Snapshot {
                version,
                last_write_ts,
                items: items.into_iter().map(|(sku, ts)| item(&sku, ts)).collect(),
                transactions: txs
                    .into_iter()
                    .map(|(id, (ts, updated_at))| tx(&id, ts, updated_at))
                    .collect(),
                ..Default::default()
            };
            snap.transactions.sort_by_key(|t| t.ts);
            snap
        })
    }

    fn item_keys(snap: &Snapshot) -> BTreeSet<String> {
        snap.items.iter().map(|i| i.sku.clone()).collect()
    }

    proptest! {
        #[test]
        fn prop_self_merge_is_idempotent(a in arb_snapshot()) {
            let merged = engine().merge(&a, &a);
            prop_assert_eq!(&merged.items, &a.items);
            prop_assert_eq!(&merged.transactions, &a.transactions);
            prop_assert_eq!(merged.branding(), a.branding());
            prop_assert_eq!(merged.version, a.version + 1);
        }

        #[test]
        fn prop_union_has_every_key_once(a in arb_snapshot(), b in arb_snapshot()) {
            let merged = engine().merge(&a, &b);
            let expected: BTreeSet<String> = item_keys(&a).union(&item_keys(&b)).cloned().collect();
            prop_assert_eq!(merged.items.len(), expected.len());
            prop_assert_eq!(item_keys(&merged), expected);
        }

        #[test]
        fn prop_shared_key_takes_newer(a in arb_snapshot(), b in arb_snapshot()) {
            let merged = engine().merge(&a, &b);
            for k in item_keys(&a).intersection(&item_keys(&b)) {
                let (ai, bi) = (a.item(k).unwrap(), b.item(k).unwrap());
                let expected = if ai.updated_at > bi.updated_at { ai } else { bi };
                prop_assert_eq!(merged.item(k).unwrap(), expected);
            }
        }

        #[test]
        fn prop_version_grows(a in arb_snapshot(), b in arb_snapshot()) {
            let merged = engine().merge(&a, &b);
            prop_assert_eq!(merged.version, a.version.max(b.version) + 1);
            prop_assert!(merged.transactions.windows(2).all(|w| w[0].ts <= w[1].ts));
        }

        #[test]
        fn prop_key_union_is_associative(a in arb_snapshot(), b in arb_snapshot(), c in arb_snapshot()) {
            let e = engine();
            let left = e.merge(&e.merge(&a, &b), &c);
            let right = e.merge(&a, &e.merge(&b, &c));
            prop_assert_eq!(item_keys(&left), item_keys(&right));

            let left_tx: BTreeSet<String> = left.transactions.iter().map(|t| t.id.clone()).collect();
            let right_tx: BTreeSet<String> = right.transactions.iter().map(|t| t.id.clone()).collect();
            prop_assert_eq!(left_tx, right_tx);
        }
    }
}
