//! Pure decision gates of one evaluation cycle. No I/O here; the engine
//! feeds these with venue data and stops at the first gate that fails.

use super::sizing::calculate_trade;
use super::types::SkipReason;
use crate::models::{Depth, Trade};

pub type Gate<T> = std::result::Result<T, SkipReason>;

/// `(buy_base - sell_base) / buy_base`: positive when the sell leg needs
/// less base asset than the buy leg produced.
pub fn profit_percentage(buy_base: f64, sell_base: f64) -> f64 {
    (buy_base - sell_base) / buy_base
}

/// Portion of a raw balance the cycle may put at risk.
pub fn capped(balance: f64, utilization: f64) -> f64 {
    balance * utilization
}

/// Size the buy leg; the book must absorb the whole budget.
pub fn size_buy_leg(buyable: &Depth, budget: f64) -> Gate<Trade> {
    if budget <= 0.0 {
        // A non-positive budget would mean "whole book" to the sizer.
        return Err(SkipReason::NoBuyBudget { budget });
    }
    let trade = calculate_trade(buyable, budget);
    if !trade.fills(budget) {
        return Err(SkipReason::BuyLiquidityShort {
            budget,
            achieved: trade.notional_amount,
        });
    }
    Ok(trade)
}

/// Buy-leg notional expressed in the sell venue's quote currency.
pub fn sell_budget(buy: &Trade, exchange_rate: f64) -> f64 {
    buy.notional_amount * exchange_rate
}

/// Size the sell leg; the book must absorb the whole budget and the base
/// required must fit inside the capped base balance.
pub fn size_sell_leg(sellable: &Depth, budget: f64, base_cap: f64) -> Gate<Trade> {
    if budget <= 0.0 {
        return Err(SkipReason::NoSellBudget { budget });
    }
    let trade = calculate_trade(sellable, budget);
    if !trade.fills(budget) {
        return Err(SkipReason::SellLiquidityShort {
            budget,
            achieved: trade.notional_amount,
        });
    }
    if trade.base_amount > base_cap {
        return Err(SkipReason::SellExceedsBalance {
            required: trade.base_amount,
            available: base_cap,
        });
    }
    Ok(trade)
}

pub fn check_margin(buy: &Trade, sell: &Trade, margin: f64) -> Gate<f64> {
    let profit = profit_percentage(buy.base_amount, sell.base_amount);
    if profit >= margin {
        Ok(profit)
    } else {
        Err(SkipReason::BelowMargin { profit, margin })
    }
}
