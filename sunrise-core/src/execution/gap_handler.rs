//! Gap handling and trigger rules for protective sell orders
//!
//! Gap rule: if the bar opens beyond a stop, the fill happens at the open
//! (worse) rather than the stop level. A limit the bar opens beyond fills at
//! the (better) open.

use crate::domain::{Bar, ProtectiveKind, ProtectiveOrder};

/// Does this order trigger anywhere in the bar's range?
pub fn triggers(order: &ProtectiveOrder, bar: &Bar) -> bool {
    match order.kind {
        ProtectiveKind::Stop => bar.low <= order.price,
        ProtectiveKind::Limit => bar.high >= order.price,
    }
}

/// The bar opened beyond the order's level.
pub fn gapped_through(order: &ProtectiveOrder, bar: &Bar) -> bool {
    match order.kind {
        ProtectiveKind::Stop => bar.open <= order.price,
        ProtectiveKind::Limit => bar.open >= order.price,
    }
}

/// Fill price for a triggered sell order. A stop that gaps down fills at the
/// (worse) open; a limit that gaps up fills at the (better) open.
pub fn fill_price(order: &ProtectiveOrder, bar: &Bar) -> f64 {
    match order.kind {
        ProtectiveKind::Stop => order.price.min(bar.open),
        ProtectiveKind::Limit => order.price.max(bar.open),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderId;
    use crate::indicators::make_ohlc_bars;

    fn pair() -> Vec<ProtectiveOrder> {
        vec![
            ProtectiveOrder::limit(OrderId(2), 1.1050, 1),
            ProtectiveOrder::stop(OrderId(1), 1.0950, 1),
        ]
    }

    #[test]
    fn stop_gap_fills_at_open() {
        let bar = make_ohlc_bars(&[(1.0900, 1.0960, 1.0880, 1.0950)]).remove(0);
        let stop = ProtectiveOrder::stop(OrderId(1), 1.0950, 1);
        assert!(triggers(&stop, &bar));
        assert_eq!(fill_price(&stop, &bar), 1.0900);
    }

    #[test]
    fn untouched_levels_do_not_trigger() {
        let bar = make_ohlc_bars(&[(1.1000, 1.1040, 1.0960, 1.1010)]).remove(0);
        for o in pair() {
            assert!(!triggers(&o, &bar));
        }
    }
}
