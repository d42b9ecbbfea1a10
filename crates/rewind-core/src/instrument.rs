//! Instrument-dependent price precision.

/// Number of decimal places prices are rounded to for `symbol`.
///
/// JPY-quoted pairs use 3, metals use 2, everything else 5.
pub fn price_decimals(symbol: &str) -> u32 {
    let upper = symbol.to_ascii_uppercase();
    if upper.contains("JPY") {
        3
    } else if upper.starts_with("XAU") || upper.starts_with("XAG") {
        2
    } else {
        5
    }
}

/// Round `price` to the tick precision of `symbol`.
pub fn round_price(symbol: &str, price: f64) -> f64 {
    let factor = 10f64.powi(price_decimals(symbol) as i32);
    (price * factor).round() / factor
}
