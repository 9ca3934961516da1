pub mod engine;
pub mod evaluator;
pub mod sizing;
pub mod types;

pub use engine::CycleEngine;
pub use evaluator::{check_margin, profit_percentage, size_buy_leg, size_sell_leg};
pub use sizing::{accumulate, calculate_trade};
pub use types::{BalanceSnapshot, CycleOutcome, ExecutionReport, Opportunity, SkipReason};
