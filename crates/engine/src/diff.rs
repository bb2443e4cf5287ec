//! Snapshot comparison.
//!
//! Compares the previous and the current [`PortfolioSnapshot`] and reports
//! new wallets, new tokens and significant balance changes. Tokens and
//! wallets that disappear are not reported.

use insider_core::{Change, PortfolioSnapshot, WalletSnapshot};

/// Change reported when the previous balance was zero.
const FROM_ZERO_PERCENT: f64 = 100.0;

/// Stateless snapshot differ.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine;

impl DiffEngine {
    /// Detect changes between two snapshots.
    ///
    /// Output is ordered by wallet address, then mint. Balance changes are
    /// reported when `|change_percent| >= threshold_pct`.
    pub fn detect(
        previous: &PortfolioSnapshot,
        current: &PortfolioSnapshot,
        threshold_pct: f64,
    ) -> Vec<Change> {
        let mut changes = Vec::new();

        for wallet in current.wallets() {
            match previous.wallet(&wallet.address) {
                None => changes.push(Change::NewWallet {
                    address: wallet.address.clone(),
                    token_balances: wallet.raw_balances(),
                }),
                Some(old_wallet) => {
                    diff_wallet(old_wallet, wallet, threshold_pct, &mut changes);
                }
            }
        }

        changes
    }
}

/// Free-function form of [`DiffEngine::detect`].
pub fn detect_changes(
    previous: &PortfolioSnapshot,
    current: &PortfolioSnapshot,
    threshold_pct: f64,
) -> Vec<Change> {
    DiffEngine::detect(previous, current, threshold_pct)
}

fn diff_wallet(
    previous: &WalletSnapshot,
    current: &WalletSnapshot,
    threshold_pct: f64,
    changes: &mut Vec<Change>,
) {
    for (mint, balance) in &current.tokens {
        match previous.token(mint) {
            None => changes.push(Change::NewToken {
                address: current.address.clone(),
                mint: mint.clone(),
                symbol: balance.symbol.clone(),
                decimals: balance.decimals,
                new_balance: balance.amount,
            }),
            Some(old) if old.amount != balance.amount => {
                let change_percent = calculate_percentage_change(old.amount, balance.amount);
                if change_percent.abs() >= threshold_pct {
                    changes.push(Change::BalanceChange {
                        address: current.address.clone(),
                        mint: mint.clone(),
                        symbol: balance.symbol.clone(),
                        decimals: balance.decimals,
                        old_balance: old.amount,
                        new_balance: balance.amount,
                        change_percent,
                    });
                }
            }
            Some(_) => {}
        }
    }
}

/// Signed percentage change from `old` to `new`, floored to hundredths.
///
/// Computed on integers so the result does not depend on float rounding.
/// A change from zero is reported as 100%.
pub fn calculate_percentage_change(old: u64, new: u64) -> f64 {
    if old == 0 {
        return FROM_ZERO_PERCENT;
    }
    let delta = new as i128 - old as i128;
    let hundredths = (delta * 10_000).div_euclid(old as i128);
    hundredths as f64 / 100.0
}
