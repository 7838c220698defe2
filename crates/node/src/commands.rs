//! Read-only queries and startup maintenance, rendered as JSON.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use paydayd_assets::{
    AllocationTuple, Asset, AssetAllocation, AssetEngine, IndexKey, ManualChain, MempoolSet,
};
use paydayd_bridge::{MissingRange, SyncHeights};
use paydayd_consensus::params::consensus_params;
use paydayd_consensus::Amount;
use paydayd_log::Category;
use paydayd_primitives::hash_to_hex;
use paydayd_storage::{KeyValueStore, StoreError};

use crate::config::{Command, Config};

fn store_err(err: StoreError) -> String {
    err.to_string()
}

/// Engine over `store` for an offline process: no mempool, tip height 0,
/// wall-clock time.
pub fn build_engine<S: KeyValueStore>(config: &Config, store: Arc<S>) -> AssetEngine<S> {
    AssetEngine::new(
        store,
        consensus_params(config.network),
        config.assets.clone(),
        Arc::new(ManualChain::at_system_time(0)),
        Arc::new(MempoolSet::new()),
    )
    .with_bridge_settings(config.bridge)
}

/// Points the sync cursor at the highest stored external root.
fn load_cursor<S: KeyValueStore>(engine: &AssetEngine<S>) -> Result<usize, String> {
    let roots = engine.stores().roots().all().map_err(store_err)?;
    let top = roots.last().map(|(height, _)| *height).unwrap_or(0);
    engine.cursor().set_heights(SyncHeights {
        sync: top,
        current: top,
    });
    engine.cursor().set_loaded(true);
    Ok(roots.len())
}

#[derive(Debug, Serialize)]
struct MaintenanceReport {
    network: &'static str,
    zdag_senders_kept: usize,
    pruned_allocations: usize,
    external_roots: usize,
    missing_root_ranges: Vec<[u32; 2]>,
}

fn ranges(missing: &[MissingRange]) -> Vec<[u32; 2]> {
    missing.iter().map(|range| [range.from, range.to]).collect()
}

pub fn execute<S: KeyValueStore>(
    config: &Config,
    engine: &AssetEngine<S>,
    command: &Command,
) -> Result<Value, String> {
    match command {
        Command::Maintain => maintain(config, engine),
        Command::GetAsset(guid) => {
            let asset = engine
                .get_asset(*guid)
                .map_err(store_err)?
                .ok_or_else(|| format!("asset {guid} not found"))?;
            Ok(asset_json(&asset))
        }
        Command::ListAssets => {
            let assets = engine.stores().all_assets().map_err(store_err)?;
            Ok(Value::Array(assets.iter().map(asset_json).collect()))
        }
        Command::GetAssetAllocation(tuple) => {
            let precision = precision_of(engine, tuple.guid)?;
            let allocation = engine
                .get_asset_allocation(tuple)
                .map_err(store_err)?
                .unwrap_or_else(|| AssetAllocation::new(tuple.clone()));
            Ok(allocation_json(&allocation, precision))
        }
        Command::ListAssetAllocations(guid) => {
            let precision = precision_of(engine, *guid)?;
            let allocations = engine.stores().allocations_of(*guid).map_err(store_err)?;
            Ok(Value::Array(
                allocations
                    .iter()
                    .map(|allocation| allocation_json(allocation, precision))
                    .collect(),
            ))
        }
        Command::SenderStatus(tuple) => {
            inspect_overlay(engine)?;
            let status = engine.sender_status(tuple);
            let precision = precision_of(engine, tuple.guid)?;
            let balance = engine.zdag_balance(tuple).map_err(store_err)?;
            Ok(json!({
                "sender": tuple.to_string(),
                "status": status.as_str(),
                "status_code": status.code(),
                "zdag_balance": format_amount(balance, precision),
            }))
        }
        Command::TxStatus(tuple, txid) => {
            inspect_overlay(engine)?;
            let status = engine.tx_status(tuple, txid);
            Ok(json!({
                "sender": tuple.to_string(),
                "txid": hash_to_hex(txid),
                "status": status.as_str(),
                "status_code": status.code(),
            }))
        }
        Command::History(key) => {
            if !config.assets.indexes(key.guid()) {
                return Err(format!(
                    "asset {} is not indexed (enable assetindex)",
                    key.guid()
                ));
            }
            let entries = engine.stores().index_entries(key).map_err(store_err)?;
            let subject = match key {
                IndexKey::Asset(guid) => guid.to_string(),
                IndexKey::Allocation(tuple) => tuple.to_string(),
            };
            Ok(json!({
                "key": subject,
                "transactions": entries
                    .iter()
                    .map(|entry| json!({
                        "txid": hash_to_hex(&entry.txid),
                        "height": entry.height,
                        "blockhash": hash_to_hex(&entry.block_hash),
                    }))
                    .collect::<Vec<_>>(),
            }))
        }
        Command::AuditRoots => {
            let stored = load_cursor(engine)?;
            let missing = engine
                .stores()
                .roots()
                .audit(engine.cursor())
                .map_err(store_err)?;
            Ok(json!({
                "external_roots": stored,
                "sync_height": engine.cursor().heights().sync,
                "missing_root_ranges": ranges(&missing),
            }))
        }
    }
}

/// Startup pass: restores the saved zdag overlay (resynced against the
/// empty mempool of a fresh process), prunes null allocations and audits the
/// external roots. The kept overlay is saved again.
fn maintain<S: KeyValueStore>(config: &Config, engine: &AssetEngine<S>) -> Result<Value, String> {
    let kept = engine.restore_overlay().map_err(store_err)?;
    let pruned = engine
        .stores()
        .prune_null_allocations()
        .map_err(store_err)?;
    let stored = load_cursor(engine)?;
    let missing = engine
        .stores()
        .roots()
        .audit(engine.cursor())
        .map_err(store_err)?;
    if !missing.is_empty() {
        paydayd_log::log_category!(
            Category::Bridge,
            "external root audit found {} ranges to fetch again",
            missing.len()
        );
    }
    engine.save_overlay().map_err(store_err)?;

    let report = MaintenanceReport {
        network: config.network.as_str(),
        zdag_senders_kept: kept,
        pruned_allocations: pruned,
        external_roots: stored,
        missing_root_ranges: ranges(&missing),
    };
    paydayd_log::log_info!(
        "Maintenance done: {} zdag senders kept, {} allocations pruned, {} root ranges missing",
        report.zdag_senders_kept,
        report.pruned_allocations,
        report.missing_root_ranges.len()
    );
    serde_json::to_value(&report).map_err(|err| err.to_string())
}

/// Loads the saved overlay for inspection without consuming it.
fn inspect_overlay<S: KeyValueStore>(engine: &AssetEngine<S>) -> Result<(), String> {
    let saved = engine.stores().read_overlay().map_err(store_err)?;
    engine.overlay().restore(saved);
    Ok(())
}

fn precision_of<S: KeyValueStore>(engine: &AssetEngine<S>, guid: u32) -> Result<u8, String> {
    Ok(engine
        .get_asset(guid)
        .map_err(store_err)?
        .map(|asset| asset.precision)
        .unwrap_or(8))
}

fn hex_bytes(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

pub fn format_amount(amount: Amount, precision: u8) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    if precision == 0 {
        return format!("{sign}{abs}");
    }
    let unit = 10u64.pow(u32::from(precision));
    let width = usize::from(precision);
    format!("{sign}{}.{:0width$}", abs / unit, abs % unit)
}

fn asset_json(asset: &Asset) -> Value {
    json!({
        "asset_guid": asset.guid,
        "symbol": asset.symbol,
        "owner": asset.owner.to_string(),
        "public_value": String::from_utf8_lossy(&asset.public_data),
        "contract": hex_bytes(&asset.contract),
        "precision": asset.precision,
        "balance": format_amount(asset.balance, asset.precision),
        "total_supply": format_amount(asset.total_supply, asset.precision),
        "max_supply": format_amount(asset.max_supply, asset.precision),
        "updatecapability_flags": asset.update_flags,
        "height": asset.height,
        "txid": hash_to_hex(&asset.txid),
    })
}

fn allocation_json(allocation: &AssetAllocation, precision: u8) -> Value {
    let tuple: &AllocationTuple = &allocation.tuple;
    let locked = if allocation.locked_outpoint.is_null() {
        Value::Null
    } else {
        Value::String(allocation.locked_outpoint.to_string())
    };
    json!({
        "asset_allocation": tuple.to_string(),
        "asset_guid": tuple.guid,
        "address": tuple.address.to_string(),
        "balance": format_amount(allocation.balance, precision),
        "locked_outpoint": locked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use paydayd_assets::ZdagStatus;
    use paydayd_assets::SavedSender;
    use paydayd_primitives::WitnessAddress;
    use paydayd_storage::memory::MemoryStore;
    use paydayd_storage::Column;

    use crate::config::{parse_args_from, CliAction};

    fn memory_config() -> Config {
        let dir = tempfile::tempdir().expect("tempdir");
        let conf = dir.path().join("paydayd.conf");
        std::fs::write(&conf, "backend=memory\nassetindex=1\n").expect("write conf");
        let items = vec!["--conf".to_string(), conf.to_string_lossy().to_string()];
        match parse_args_from(items).expect("parse") {
            CliAction::Run(config, _) => *config,
            other => panic!("unexpected action {other:?}"),
        }
    }

    fn tuple(byte: u8) -> AllocationTuple {
        AllocationTuple::new(700, WitnessAddress::new(0, vec![byte; 20]))
    }

    fn seeded() -> (Config, AssetEngine<MemoryStore>) {
        let config = memory_config();
        let store = Arc::new(MemoryStore::new());
        let asset = Asset {
            guid: 700,
            owner: WitnessAddress::new(0, vec![0xa1; 20]),
            symbol: "PAY".to_string(),
            public_data: b"payday".to_vec(),
            precision: 2,
            balance: 12_345,
            total_supply: 20_000,
            max_supply: 100_000,
            ..Asset::default()
        };
        store
            .put(Column::Asset, &700u32.to_be_bytes(), &asset.to_bytes())
            .expect("seed asset");
        let mut allocation = AssetAllocation::new(tuple(0xb2));
        allocation.balance = 7_655;
        store
            .put(
                Column::AssetAllocation,
                &allocation.tuple.key(),
                &allocation.to_bytes(),
            )
            .expect("seed allocation");
        let mut emptied = AssetAllocation::new(tuple(0xc3));
        emptied.set_null();
        store
            .put(Column::AssetAllocation, &emptied.tuple.key(), &emptied.to_bytes())
            .expect("seed null allocation");
        let engine = build_engine(&config, store);
        (config, engine)
    }

    #[test]
    fn amounts_follow_precision() {
        assert_eq!(format_amount(12_345, 2), "123.45");
        assert_eq!(format_amount(5, 8), "0.00000005");
        assert_eq!(format_amount(-150, 2), "-1.50");
        assert_eq!(format_amount(42, 0), "42");
    }

    #[test]
    fn asset_queries() {
        let (config, engine) = seeded();
        let asset = execute(&config, &engine, &Command::GetAsset(700)).expect("asset");
        assert_eq!(asset["symbol"], "PAY");
        assert_eq!(asset["balance"], "123.45");
        assert_eq!(asset["public_value"], "payday");
        assert!(execute(&config, &engine, &Command::GetAsset(701)).is_err());

        let all = execute(&config, &engine, &Command::ListAssets).expect("list");
        assert_eq!(all.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn allocation_queries() {
        let (config, engine) = seeded();
        let allocation = execute(&config, &engine, &Command::GetAssetAllocation(tuple(0xb2)))
            .expect("allocation");
        assert_eq!(allocation["balance"], "76.55");
        assert_eq!(allocation["locked_outpoint"], Value::Null);

        let absent = execute(&config, &engine, &Command::GetAssetAllocation(tuple(0xd4)))
            .expect("absent allocation");
        assert_eq!(absent["balance"], "0.00");

        let listed = execute(&config, &engine, &Command::ListAssetAllocations(700)).expect("list");
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn maintenance_prunes_and_drops_unbacked_overlay() {
        let (config, engine) = seeded();
        engine
            .stores()
            .save_overlay(&[SavedSender {
                tuple: tuple(0xb2),
                balance: 5_000,
                arrivals: vec![([9; 32], 1_000)],
            }])
            .expect("save overlay");

        let report = execute(&config, &engine, &Command::Maintain).expect("maintain");
        assert_eq!(report["pruned_allocations"], 1);
        assert_eq!(report["zdag_senders_kept"], 0);
        assert_eq!(report["external_roots"], 0);
        assert_eq!(report["network"], "main");
        assert!(engine.stores().read_overlay().expect("read").is_empty());
    }

    #[test]
    fn zdag_status_reads_the_saved_overlay() {
        let (config, engine) = seeded();
        let sender = tuple(0xb2);
        engine
            .stores()
            .save_overlay(&[SavedSender {
                tuple: sender.clone(),
                balance: 5_000,
                arrivals: vec![([9; 32], 1_000)],
            }])
            .expect("save overlay");

        let status = execute(&config, &engine, &Command::SenderStatus(sender.clone()))
            .expect("sender status");
        assert_eq!(status["status"], ZdagStatus::Ok.as_str());
        assert_eq!(status["zdag_balance"], "50.00");

        let status = execute(&config, &engine, &Command::TxStatus(sender, [8; 32]))
            .expect("tx status");
        assert_eq!(status["status"], ZdagStatus::NotFound.as_str());
        assert_eq!(engine.stores().read_overlay().expect("read").len(), 1);
    }

    #[test]
    fn history_requires_the_index() {
        let (mut config, engine) = seeded();
        let history = execute(&config, &engine, &Command::History(IndexKey::Asset(700)))
            .expect("history");
        assert_eq!(history["transactions"].as_array().map(Vec::len), Some(0));

        config.assets.asset_index = false;
        assert!(execute(&config, &engine, &Command::History(IndexKey::Asset(700))).is_err());
    }
}
