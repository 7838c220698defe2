//! Ownership proofs: an input spending a coin locked to the owner's witness
//! program stands in for the owner's signature.

use std::collections::HashMap;

use paydayd_consensus::Amount;
use paydayd_primitives::script::witness_program;
use paydayd_primitives::{OutPoint, Transaction, WitnessAddress};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Coin {
    pub value: Amount,
    pub script_pubkey: Vec<u8>,
    pub height: u32,
}

/// Read access to the unspent coins a transaction spends.
pub trait CoinView {
    fn coin(&self, outpoint: &OutPoint) -> Option<Coin>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryCoinView {
    coins: HashMap<OutPoint, Coin>,
}

impl MemoryCoinView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, outpoint: OutPoint, coin: Coin) {
        self.coins.insert(outpoint, coin);
    }

    pub fn spend(&mut self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.remove(outpoint)
    }
}

impl CoinView for MemoryCoinView {
    fn coin(&self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.get(outpoint).cloned()
    }
}

/// True when some input of `tx` spends a coin paying `owner`. With a
/// non-null `required` outpoint only that input qualifies.
pub fn find_owner_signature(
    view: &dyn CoinView,
    tx: &Transaction,
    owner: &WitnessAddress,
    required: Option<&OutPoint>,
) -> bool {
    let required = required.filter(|outpoint| !outpoint.is_null());
    tx.vin.iter().any(|input| {
        if required.is_some_and(|outpoint| *outpoint != input.prevout) {
            return false;
        }
        view.coin(&input.prevout)
            .and_then(|coin| witness_program(&coin.script_pubkey))
            .is_some_and(|address| address == *owner)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use paydayd_primitives::script::witness_program_script;
    use paydayd_primitives::TxIn;

    #[test]
    fn required_outpoint_narrows_inputs() {
        let owner = WitnessAddress::new(0, vec![0x21; 20]);
        let first = OutPoint::new([1; 32], 0);
        let second = OutPoint::new([2; 32], 1);
        let mut view = MemoryCoinView::new();
        view.add(
            first.clone(),
            Coin {
                value: 1_000,
                script_pubkey: witness_program_script(&owner),
                height: 1,
            },
        );
        view.add(
            second.clone(),
            Coin {
                value: 1_000,
                script_pubkey: witness_program_script(&WitnessAddress::new(0, vec![0x22; 20])),
                height: 1,
            },
        );
        let tx = Transaction {
            version: 2,
            vin: vec![TxIn::spending(first.clone()), TxIn::spending(second.clone())],
            vout: Vec::new(),
            lock_time: 0,
        };
        assert!(find_owner_signature(&view, &tx, &owner, None));
        assert!(find_owner_signature(&view, &tx, &owner, Some(&OutPoint::null())));
        assert!(find_owner_signature(&view, &tx, &owner, Some(&first)));
        assert!(!find_owner_signature(&view, &tx, &owner, Some(&second)));
    }
}
