//! Depth-limited trade sizing.
//!
//! Walks a [`Depth`] best price first, accumulating base and notional
//! totals, and stops at the first level whose running notional exceeds
//! the budget. That level is only partly consumed: the trade takes
//! exactly the fraction of it needed to land on the budget.

use crate::models::{Depth, Level, Trade};

/// Forward pass over `depth`, filling each level's running aggregates.
///
/// Returns the accumulated levels up to and including the first one whose
/// notional total exceeds `budget`. A non-positive budget walks the whole
/// book.
pub fn accumulate(depth: &Depth, budget: f64) -> Vec<Level> {
    let mut walked: Vec<Level> = Vec::with_capacity(depth.levels.len());
    for level in &depth.levels {
        let (base_ahead, notional_ahead) = walked
            .last()
            .map(|prev| (prev.base_total, prev.notional_total))
            .unwrap_or((0.0, 0.0));

        let mut level = *level;
        if level.notional_amount == 0.0 {
            level.notional_amount = level.base_amount * level.quote_price;
        }
        level.base_ahead = base_ahead;
        level.notional_ahead = notional_ahead;
        level.base_total = base_ahead + level.base_amount;
        level.notional_total = notional_ahead + level.notional_amount;

        let exceeded = exceeds(&level, budget);
        walked.push(level);
        if exceeded {
            break;
        }
    }
    walked
}

fn exceeds(level: &Level, budget: f64) -> bool {
    budget > 0.0 && level.notional_total > budget
}

/// Largest trade `depth` can fill without spending more than `budget`.
///
/// When the budget lands inside a level, the result is interpolated and
/// `notional_amount == budget` exactly. When the book runs out first, the
/// result is the whole walked book and `notional_amount < budget`; callers
/// must read that as insufficient liquidity.
pub fn calculate_trade(depth: &Depth, budget: f64) -> Trade {
    let walked = accumulate(depth, budget);
    let Some(last) = walked.last() else {
        return Trade::default();
    };

    if !exceeds(last, budget) {
        return Trade {
            base_amount: last.base_total,
            quote_price: last.quote_price,
            notional_amount: last.notional_total,
        };
    }

    let fraction = (budget - last.notional_ahead) / last.notional_amount;
    Trade {
        base_amount: last.base_ahead + fraction * last.base_amount,
        quote_price: last.quote_price,
        notional_amount: budget,
    }
}
