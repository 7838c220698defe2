//! Monetary units, money range and asset range rules.

pub type Amount = i64;

pub const COIN: Amount = 100_000_000;
pub const CENT: Amount = 1_000_000;

/// No base-coin amount larger than this (in satoshi) is valid.
pub const MAX_MONEY: Amount = 888_000_000 * COIN;

/// Fixed-point ceiling for any asset quantity at full (8 digit) precision.
pub const MAX_ASSET: Amount = 1_000_000_000_000_000_000 - 1;

/// Highest number of decimal places an asset may declare.
pub const MAX_ASSET_PRECISION: u8 = 8;

pub fn money_range(value: Amount) -> bool {
    (0..=MAX_MONEY).contains(&value)
}

pub fn asset_range(value: Amount) -> bool {
    (0..=MAX_ASSET).contains(&value)
}

/// Range check scaled to the asset's precision so the ceiling in whole units stays constant.
pub fn asset_range_with_precision(value: Amount, precision: u8) -> bool {
    if precision > MAX_ASSET_PRECISION {
        return false;
    }
    let divisor = 10i64.pow(u32::from(MAX_ASSET_PRECISION - precision));
    (0..=MAX_ASSET / divisor).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_range_bounds() {
        assert!(asset_range(0));
        assert!(asset_range(MAX_ASSET));
        assert!(!asset_range(MAX_ASSET + 1));
        assert!(!asset_range(-1));
    }

    #[test]
    fn precision_scales_ceiling() {
        assert!(asset_range_with_precision(MAX_ASSET, 8));
        assert!(!asset_range_with_precision(MAX_ASSET, 7));
        assert!(asset_range_with_precision(MAX_ASSET / 100_000_000, 0));
        assert!(!asset_range_with_precision(MAX_ASSET / 100_000_000 + 1, 0));
        assert!(!asset_range_with_precision(1, 9));
    }
}
