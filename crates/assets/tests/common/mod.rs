#![allow(dead_code)]

use std::sync::Arc;

use paydayd_assets::{
    AllocationPayload, AllocationTuple, Asset, AssetConfig, AssetEngine, BlockMode, BridgeSettings, BlockOutcome,
    BurnData, ChainContext, Coin, DriverError, LedgerBlock, LedgerDriver, ManualChain,
    MemoryCoinView, MempoolSet, MempoolView, MintPayload,
};
use paydayd_bridge::rlp::{encode_bytes, encode_list, encode_u64};
use paydayd_bridge::trie::{encode_hex_prefix, to_nibbles};
use paydayd_bridge::{encode_burn_call, BurnCall, SyncCursor};
use paydayd_consensus::constants::{
    ASSET_UPDATE_ALL, TX_VERSION_ALLOCATION_BURN, TX_VERSION_ASSET_ACTIVATE,
};
use paydayd_consensus::{consensus_params, Amount, ConsensusParams, Hash256, Network};
use paydayd_primitives::script::{op_return_script, witness_program_script};
use paydayd_primitives::{keccak256, OutPoint, Transaction, TxIn, TxOut, WitnessAddress};
use paydayd_storage::memory::MemoryStore;

pub const GUID: u32 = 1_000_000_001;
pub const START_HEIGHT: u32 = 200;
pub const NOW_MS: i64 = 1_700_000_000_000;
pub const CONTRACT: [u8; 20] = [0xcc; 20];

pub fn address(byte: u8) -> WitnessAddress {
    WitnessAddress::new(0, vec![byte; 20])
}

pub fn tuple(byte: u8) -> AllocationTuple {
    AllocationTuple::new(GUID, address(byte))
}

pub fn sample_asset(owner: &WitnessAddress, balance: Amount, max_supply: Amount) -> Asset {
    Asset {
        guid: GUID,
        owner: owner.clone(),
        symbol: "SYM".to_string(),
        public_data: b"{\"desc\":\"test token\"}".to_vec(),
        contract: CONTRACT.to_vec(),
        precision: 8,
        balance,
        max_supply,
        update_flags: ASSET_UPDATE_ALL,
        ..Asset::default()
    }
}

pub fn ledger_tx(version: i32, inputs: &[OutPoint], payload: &[u8]) -> Transaction {
    Transaction {
        version,
        vin: inputs.iter().cloned().map(TxIn::spending).collect(),
        vout: vec![TxOut {
            value: 0,
            script_pubkey: op_return_script(payload),
        }],
        lock_time: 0,
    }
}

pub fn allocation_payload(sender: &AllocationTuple, receivers: &[(WitnessAddress, Amount)]) -> AllocationPayload {
    AllocationPayload {
        tuple: sender.clone(),
        receivers: receivers.to_vec(),
        locked_outpoint: OutPoint::null(),
    }
}

/// External transaction calling the bridge burn method on `contract`.
pub fn external_tx(contract: &[u8; 20], call: &BurnCall, params: &ConsensusParams) -> Vec<u8> {
    let data = encode_burn_call(&params.bridge.burn_selector, call);
    encode_list(&[
        encode_u64(7),
        encode_u64(1_000_000_000),
        encode_u64(90_000),
        encode_bytes(contract),
        encode_u64(0),
        encode_bytes(&data),
    ])
}

pub fn receipt(status: u64) -> Vec<u8> {
    encode_list(&[
        encode_u64(status),
        encode_u64(60_000),
        encode_bytes(&[0u8; 256]),
        encode_list(&[]),
    ])
}

/// Single-leaf trie holding `value` under `key`: (root, parent nodes).
pub fn leaf_proof(key: &[u8], value: &[u8]) -> (Hash256, Vec<u8>) {
    let node = encode_list(&[
        encode_bytes(&encode_hex_prefix(&to_nibbles(key), true)),
        encode_bytes(value),
    ]);
    (keccak256(&node), encode_list(&[node]))
}

/// Mint payload with valid proofs of `call` sent to `contract` at
/// external `block_number`, transaction index `index`.
pub fn mint_payload(
    receiver: AllocationTuple,
    value_asset: Amount,
    block_number: u32,
    index: u64,
    contract: &[u8; 20],
    call: &BurnCall,
    params: &ConsensusParams,
) -> MintPayload {
    let tx_path = encode_u64(index);
    let tx_value = external_tx(contract, call, params);
    let receipt_value = receipt(1);
    let (tx_root, tx_parent_nodes) = leaf_proof(&tx_path, &tx_value);
    let (receipt_root, receipt_parent_nodes) = leaf_proof(&tx_path, &receipt_value);
    MintPayload {
        tuple: receiver,
        value_asset,
        block_number,
        tx_value,
        tx_parent_nodes,
        tx_root,
        tx_path,
        receipt_value,
        receipt_parent_nodes,
        receipt_root,
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub chain: Arc<ManualChain>,
    pub mempool: Arc<MempoolSet>,
    pub cursor: Arc<SyncCursor>,
    pub coins: MemoryCoinView,
    pub driver: LedgerDriver<MemoryStore>,
    pub params: ConsensusParams,
    next_coin: u32,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(AssetConfig::default())
    }

    pub fn with_config(config: AssetConfig) -> Self {
        Self::open(Arc::new(MemoryStore::new()), config)
    }

    /// Engine over an existing store, as after a restart.
    pub fn open(store: Arc<MemoryStore>, config: AssetConfig) -> Self {
        Self::build(store, config, BridgeSettings::default())
    }

    pub fn build(store: Arc<MemoryStore>, config: AssetConfig, bridge: BridgeSettings) -> Self {
        let chain = Arc::new(ManualChain::new(START_HEIGHT, NOW_MS / 1000, NOW_MS));
        let mempool = Arc::new(MempoolSet::new());
        let cursor = Arc::new(SyncCursor::new());
        let params = consensus_params(Network::Regtest);
        let engine = AssetEngine::new(
            Arc::clone(&store),
            params.clone(),
            config,
            Arc::clone(&chain) as Arc<dyn ChainContext>,
            Arc::clone(&mempool) as Arc<dyn MempoolView>,
        )
        .with_cursor(Arc::clone(&cursor))
        .with_bridge_settings(bridge);
        Self {
            store,
            chain,
            mempool,
            cursor,
            coins: MemoryCoinView::new(),
            driver: LedgerDriver::new(engine),
            params,
            next_coin: 0,
        }
    }

    pub fn engine(&self) -> &AssetEngine<MemoryStore> {
        self.driver.engine()
    }

    /// New unspent coin paying `owner`.
    pub fn fund(&mut self, owner: &WitnessAddress) -> OutPoint {
        self.next_coin += 1;
        let mut hash = [0u8; 32];
        hash[..4].copy_from_slice(&self.next_coin.to_le_bytes());
        hash[31] = 0xaa;
        let outpoint = OutPoint::new(hash, 0);
        self.coins.add(
            outpoint.clone(),
            Coin {
                value: 10_000,
                script_pubkey: witness_program_script(owner),
                height: 1,
            },
        );
        outpoint
    }

    pub fn block_hash(height: u32) -> Hash256 {
        let mut hash = [0u8; 32];
        hash[..4].copy_from_slice(&height.to_le_bytes());
        hash[31] = 0xbb;
        hash
    }

    pub fn connect(&self, txs: &[Transaction]) -> Result<BlockOutcome, DriverError> {
        self.run_block(txs, BlockMode::Connect)
    }

    pub fn run_block(&self, txs: &[Transaction], mode: BlockMode) -> Result<BlockOutcome, DriverError> {
        let height = self.chain.height() + 1;
        let block = LedgerBlock {
            hash: Self::block_hash(height),
            height,
            transactions: txs,
        };
        let outcome = self.driver.connect_block(&block, &self.coins, mode)?;
        if mode == BlockMode::Connect {
            self.chain.set_height(height);
        }
        Ok(outcome)
    }

    /// Disconnects the tip block, which must hold `txs`.
    pub fn disconnect(&self, txs: &[Transaction]) -> Result<(), DriverError> {
        let height = self.chain.height();
        let block = LedgerBlock {
            hash: Self::block_hash(height),
            height,
            transactions: txs,
        };
        self.driver.disconnect_block(&block)?;
        self.chain.set_height(height - 1);
        Ok(())
    }

    pub fn activate_tx(&mut self, owner: &WitnessAddress, balance: Amount, max_supply: Amount) -> Transaction {
        let coin = self.fund(owner);
        let asset = sample_asset(owner, balance, max_supply);
        ledger_tx(TX_VERSION_ASSET_ACTIVATE, &[coin], &asset.to_bytes())
    }

    /// Connects an activation of [`GUID`] owned by `owner`.
    pub fn activate(&mut self, owner: &WitnessAddress, balance: Amount, max_supply: Amount) {
        let tx = self.activate_tx(owner, balance, max_supply);
        self.connect(&[tx]).expect("activate asset");
    }

    /// Signed transaction of `version` carrying an allocation payload.
    pub fn payload_tx(
        &mut self,
        version: i32,
        signer: &WitnessAddress,
        payload: &AllocationPayload,
    ) -> Transaction {
        let coin = self.fund(signer);
        ledger_tx(version, &[coin], &payload.to_bytes())
    }

    pub fn burn_tx(&mut self, sender: &AllocationTuple, amount: Amount) -> Transaction {
        let payload = allocation_payload(sender, &[]);
        let burn = BurnData {
            guid: sender.guid,
            address: sender.address.clone(),
            amount,
            external_address: [0xee; 20],
        };
        let coin = self.fund(&sender.address);
        ledger_tx(
            TX_VERSION_ALLOCATION_BURN,
            &[coin],
            &paydayd_assets::payload::burn_payload_bytes(&payload, &burn),
        )
    }

    pub fn balance(&self, tuple: &AllocationTuple) -> Amount {
        self.engine()
            .get_asset_allocation(tuple)
            .expect("read allocation")
            .map(|allocation| allocation.balance)
            .unwrap_or(0)
    }

    pub fn asset(&self) -> Asset {
        self.engine()
            .get_asset(GUID)
            .expect("read asset")
            .expect("asset exists")
    }
}

/// The consensus error behind a rejected block or transaction.
pub fn rejection<T: std::fmt::Debug>(result: Result<T, DriverError>) -> paydayd_assets::ConsensusError {
    let err = result.expect_err("expected a rejection");
    err.consensus_error().cloned().expect("consensus rejection")
}
