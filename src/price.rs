//! Decimal-to-integer price/quantity scaling, and the cage/auction-band
//! integer formulas transcribed from the source.

use crate::error::AxobError;
use crate::types::{InstrumentType, Price, SourceExchange};

/// Internal fixed-point precision for stock prices: 2 decimal places.
pub const PRICE_INTER_STOCK_PRECISION: u32 = 100;
/// Internal fixed-point precision for fund/KZZ prices: 3 decimal places.
pub const PRICE_INTER_FUND_PRECISION: u32 = 1_000;

/// SZSE snapshot wire precision: 6 decimal places (except `PrevClosePx`,
/// which is 4).
pub const PRICE_SZSE_SNAP_PRECISION: u32 = 1_000_000;
/// SSE snapshot wire precision: 3 decimal places.
pub const PRICE_SSE_PRECISION: u32 = 1_000;

/// SZSE cumulative traded-value output precision: 4 decimal places,
/// independent of the instrument's own tick size.
pub const TOTAL_VALUE_SZSE_PRECISION: u128 = 10_000;
/// SSE cumulative traded-value output precision: 5 decimal places.
pub const TOTAL_VALUE_SSE_PRECISION: u128 = 100_000;

/// Rescale a raw wire price into the engine's internal fixed-point
/// representation for `(source, instrument)`.
///
/// Returns [`AxobError::PrecisionUndefined`] for the combinations the
/// specification explicitly leaves open rather than guessing a decimal
/// count (SSE fund instruments).
pub fn internal_precision(
    source: SourceExchange,
    instrument: InstrumentType,
) -> Result<u32, AxobError> {
    match (source, instrument) {
        (SourceExchange::Szse, InstrumentType::Stock) => Ok(PRICE_INTER_STOCK_PRECISION),
        (SourceExchange::Szse, InstrumentType::Fund) => Ok(PRICE_INTER_FUND_PRECISION),
        (SourceExchange::Szse, InstrumentType::Kzz) => Ok(PRICE_INTER_FUND_PRECISION),
        (SourceExchange::Sse, InstrumentType::Stock) => Ok(PRICE_INTER_STOCK_PRECISION),
        (SourceExchange::Sse, InstrumentType::Bond) => Ok(PRICE_INTER_FUND_PRECISION),
        (SourceExchange::Sse, InstrumentType::Fund) => Err(AxobError::PrecisionUndefined {
            source,
            instrument,
        }),
        _ => Err(AxobError::PrecisionUndefined { source, instrument }),
    }
}

/// Clamp a rescaled price to the 25-bit budget, returning the clamped
/// value and whether clamping occurred (caller logs + sets the session's
/// `*_uncertain` flag on `true`).
pub fn clamp_price(price: i64) -> (Price, bool) {
    const MAX_25BIT: i64 = (1i64 << 25) - 1;
    if price > MAX_25BIT || price < 0 {
        (crate::types::PRICE_OVERFLOW, true)
    } else {
        (price as Price, false)
    }
}

/// Expand an internal-precision price back out to the snapshot wire
/// precision for `(source, instrument)`. Mirrors `_fmtPrice_inter2snap`.
pub fn to_snapshot_precision(
    price: Price,
    source: SourceExchange,
    instrument: InstrumentType,
) -> Result<Price, AxobError> {
    let inter = internal_precision(source, instrument)?;
    let snap_precision = match source {
        SourceExchange::Szse => PRICE_SZSE_SNAP_PRECISION,
        SourceExchange::Sse => PRICE_SSE_PRECISION,
    };
    let factor = snap_precision / inter;
    Ok(price.saturating_mul(factor))
}

/// Round-half-up integer division by 100, i.e. `(x + 50) / 100`. The
/// source's idiom for every percentage-band computation below.
fn round_half_up_pct(x: i64, numerator_pct: i64) -> i64 {
    (x * numerator_pct + 50) / 100
}

/// Upper bound of the ChiNext ±2% admission cage around reference price
/// `x`. For small `x` (≤ 24) the band widens to `x + 1` so it always
/// admits at least one tick.
pub fn cage_upper(x: Price) -> Price {
    let x = x as i64;
    let v = if x <= 24 { x + 1 } else { round_half_up_pct(x, 102) };
    v.max(0) as Price
}

/// Lower bound of the ChiNext ±2% admission cage around reference price
/// `x`. For small `x` (≤ 25) the band widens to `x - 1`.
pub fn cage_lower(x: Price) -> Price {
    let x = x as i64;
    let v = if x <= 25 { x - 1 } else { round_half_up_pct(x, 98) };
    v.max(0) as Price
}

/// Upper bound of the call-auction "effective auction" ±10% band used for
/// CloseCall discard rules during the GEM IPO week (§4.3).
pub fn match_upper(x: Price) -> Price {
    round_half_up_pct(x as i64, 110).max(0) as Price
}

/// Lower bound of the call-auction "effective auction" ±10% band.
pub fn match_lower(x: Price) -> Price {
    round_half_up_pct(x as i64, 90).max(0) as Price
}

/// Rescale a traded `(price, qty)` pair, both at internal precision, up to
/// the cumulative `TotalValueTrade` output precision for `source`. The
/// output scale (4dp SZSE / 5dp SSE) is fixed regardless of the
/// instrument's own tick size, so this divides back out the internal
/// price precision rather than assuming it.
pub fn rescale_trade_value(
    px: Price,
    qty: Qty,
    source: SourceExchange,
    instrument: InstrumentType,
) -> Result<u128, AxobError> {
    let inter = internal_precision(source, instrument)? as u128;
    let value_precision = match source {
        SourceExchange::Szse => TOTAL_VALUE_SZSE_PRECISION,
        SourceExchange::Sse => TOTAL_VALUE_SSE_PRECISION,
    };
    Ok((px as u128) * (qty as u128) * value_precision / inter)
}

/// Round-half-up a weighted-average ratio `value / size`, matching
/// `(int((value<<1) / size) + 1) >> 1`.
pub fn round_half_up_ratio(value: i128, size: i128) -> i64 {
    if size == 0 {
        return 0;
    }
    (((value << 1) / size + 1) >> 1) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cage_widens_for_small_reference() {
        assert_eq!(cage_upper(10), 11);
        assert_eq!(cage_upper(24), 25);
        assert_eq!(cage_lower(10), 9);
        assert_eq!(cage_lower(25), 24);
    }

    #[test]
    fn cage_uses_rounded_percentage_above_threshold() {
        // 1000 * 102 / 100 = 1020, already exact.
        assert_eq!(cage_upper(1000), 1020);
        // 1000 * 98 / 100 = 980, already exact.
        assert_eq!(cage_lower(1000), 980);
        // bid_ref=10.00 (internal 1000, 2dp) -> cage_upper=10.20 (1020) per scenario 5/6.
        assert_eq!(cage_upper(1000), 1020);
    }

    #[test]
    fn match_band_is_ten_percent() {
        assert_eq!(match_upper(1000), 1100);
        assert_eq!(match_lower(1000), 900);
    }

    #[test]
    fn clamp_price_flags_overflow() {
        let (p, overflowed) = clamp_price(1 << 26);
        assert!(overflowed);
        assert_eq!(p, crate::types::PRICE_OVERFLOW);
        let (p, overflowed) = clamp_price(1000);
        assert!(!overflowed);
        assert_eq!(p, 1000);
    }

    #[test]
    fn sse_fund_precision_is_undefined() {
        let res = internal_precision(SourceExchange::Sse, InstrumentType::Fund);
        assert!(matches!(res, Err(AxobError::PrecisionUndefined { .. })));
    }

    #[test]
    fn rescale_trade_value_matches_worked_example() {
        // 10.00 (internal 1000, 2dp) x 150 shares -> 15_000_000 at SZSE's
        // fixed 4dp TotalValueTrade output scale.
        let v = rescale_trade_value(1000, 150, SourceExchange::Szse, InstrumentType::Stock).unwrap();
        assert_eq!(v, 15_000_000);
    }
}
