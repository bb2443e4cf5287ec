//! Portfolio overview printed at startup and shutdown.

use insider_core::{format_token_amount, shorten_address, PortfolioSnapshot};
use insider_fetcher::PriceService;
use std::fmt::Write;

/// Render wallets, token amounts and USD values. Tokens without a price are
/// listed without a value and left out of the total.
pub fn render_overview(snapshot: &PortfolioSnapshot, prices: &dyn PriceService) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "📊 Portfolio overview ({} wallets)", snapshot.len());

    if snapshot.is_empty() {
        let _ = writeln!(out, "  no wallet data yet");
        return out;
    }

    let mut total = 0.0;
    for wallet in snapshot.wallets() {
        let mut wallet_value = 0.0;
        let _ = writeln!(out, "  Wallet {}", shorten_address(&wallet.address));

        if wallet.tokens.is_empty() {
            let _ = writeln!(out, "    (no tokens)");
        }

        for (mint, balance) in &wallet.tokens {
            let amount = format_token_amount(balance.amount, balance.decimals);
            match prices.get_price(mint) {
                Some(price) => {
                    let value = balance.ui_amount() * price;
                    wallet_value += value;
                    let _ = writeln!(out, "    {:<8} {:>12}  ${:.2}", balance.symbol, amount, value);
                }
                None => {
                    let _ = writeln!(out, "    {:<8} {:>12}  -", balance.symbol, amount);
                }
            }
        }

        let _ = writeln!(out, "    value: ${:.2}", wallet_value);
        total += wallet_value;
    }

    let _ = writeln!(out, "  Total value: ${:.2}", total);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use insider_core::{TokenBalance, WalletSnapshot, BONK_MINT, SOL_MINT, USDC_MINT};
    use insider_fetcher::StaticPriceService;

    fn portfolio() -> PortfolioSnapshot {
        PortfolioSnapshot::new()
            .with_wallet(
                WalletSnapshot::new("55kBY9yxqQzj2zxZqRkqENYq6R8PkXmn5GKyQN9YeVFr", Utc::now())
                    .with_token(TokenBalance::new(SOL_MINT, 2_000_000_000, 9, "SOL"))
                    .with_token(TokenBalance::new(USDC_MINT, 1_500_000, 6, "USDC")),
            )
            .with_wallet(
                WalletSnapshot::new("DWuopnuSqYdBhCXqxfqjqzPGibnhkj6SQqFvgC4jkvjF", Utc::now())
                    .with_token(TokenBalance::new(BONK_MINT, 5_000_000, 5, "BONK")),
            )
    }

    #[test]
    fn test_overview_values_and_total() {
        let prices = StaticPriceService::new()
            .with_price(SOL_MINT, 150.0)
            .with_price(USDC_MINT, 1.0);

        let out = render_overview(&portfolio(), &prices);

        assert!(out.contains("(2 wallets)"));
        assert!(out.contains("55kBY9yx...QN9YeVFr"));
        assert!(out.contains("$300.00"));
        assert!(out.contains("$1.50"));
        assert!(out.contains("Total value: $301.50"));
    }

    #[test]
    fn test_unpriced_token_is_listed_without_value() {
        let out = render_overview(&portfolio(), &StaticPriceService::new());

        let bonk = out.lines().find(|l| l.contains("BONK")).unwrap();
        assert!(bonk.contains("50.0000"));
        assert!(bonk.trim_end().ends_with('-'));
        assert!(out.contains("Total value: $0.00"));
    }

    #[test]
    fn test_empty_portfolio() {
        let out = render_overview(&PortfolioSnapshot::new(), &StaticPriceService::new());
        assert!(out.contains("no wallet data yet"));
    }
}
