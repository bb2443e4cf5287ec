//! Display helpers for token amounts, addresses and well-known mints.

/// Wrapped SOL mint.
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";
/// USDC mint.
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
/// USDT mint.
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
/// BONK mint.
pub const BONK_MINT: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";

/// Format a raw token amount in human units with K/M suffixes.
///
/// - 0 decimals: plain integer
/// - >= 1,000,000: `1.23M`
/// - >= 1,000: `1.23K`
/// - otherwise four decimal places
pub fn format_token_amount(amount: u64, decimals: u8) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let value = amount as f64 / 10f64.powi(decimals as i32);

    if value >= 1_000_000.0 {
        format!("{:.2}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.2}K", value / 1_000.0)
    } else {
        format!("{:.4}", value)
    }
}

/// Shorten a long address to `first8...last8`.
pub fn shorten_address(address: &str) -> String {
    if address.len() > 20 && address.is_ascii() {
        format!("{}...{}", &address[..8], &address[address.len() - 8..])
    } else {
        address.to_string()
    }
}

/// Symbol for well-known mints, shortened mint otherwise.
pub fn known_symbol(mint: &str) -> String {
    match mint {
        SOL_MINT => "SOL".to_string(),
        USDC_MINT => "USDC".to_string(),
        USDT_MINT => "USDT".to_string(),
        BONK_MINT => "BONK".to_string(),
        _ => shorten_address(mint),
    }
}
