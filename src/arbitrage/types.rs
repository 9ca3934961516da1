use crate::cex::bitstamp::{BitstampOrder, BitstampOrderStatus};
use crate::cex::valr::ValrOrderStatus;
use crate::models::Trade;
use std::fmt;

/// Both legs sized and the margin cleared.
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    /// Bitstamp quote budget after utilization.
    pub buy_budget: f64,
    pub buy: Trade,
    /// `buy.notional_amount` translated into VALR's quote currency.
    pub sell_budget: f64,
    pub sell: Trade,
    /// VALR base balance after utilization.
    pub base_cap: f64,
    pub profit_percentage: f64,
}

/// Why an account's cycle stopped before finding an opportunity.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoBuyBudget { budget: f64 },
    BuyLiquidityShort { budget: f64, achieved: f64 },
    NoSellBudget { budget: f64 },
    SellLiquidityShort { budget: f64, achieved: f64 },
    SellExceedsBalance { required: f64, available: f64 },
    BelowMargin { profit: f64, margin: f64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoBuyBudget { budget } => {
                write!(f, "no buy budget ({budget})")
            }
            SkipReason::BuyLiquidityShort { budget, achieved } => {
                write!(f, "buy book fills {achieved} of {budget}")
            }
            SkipReason::NoSellBudget { budget } => {
                write!(f, "no sell budget ({budget})")
            }
            SkipReason::SellLiquidityShort { budget, achieved } => {
                write!(f, "sell book fills {achieved} of {budget}")
            }
            SkipReason::SellExceedsBalance {
                required,
                available,
            } => write!(f, "sell needs {required} base, {available} available"),
            SkipReason::BelowMargin { profit, margin } => {
                write!(f, "profit {profit} below margin {margin}")
            }
        }
    }
}

/// Raw available balances as reported by each venue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceSnapshot {
    pub quote_available: f64,
    pub base_available: f64,
}

/// Everything the venues said about the two submitted orders. This is a
/// single status snapshot; nothing here confirms both legs filled.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub buy_order: BitstampOrder,
    pub sell_order_id: String,
    pub buy_status: BitstampOrderStatus,
    pub sell_status: ValrOrderStatus,
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Balances-only run.
    Balances(BalanceSnapshot),
    Skipped(SkipReason),
    /// Opportunity found, execute flag off.
    Qualified(Opportunity),
    Executed {
        opportunity: Opportunity,
        execution: Box<ExecutionReport>,
    },
}
