//! Shared data structures used throughout the application.

/// Which side of a venue's book a `Depth` was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Bid,
    Ask,
}

/// One price rung of a book, plus the running totals filled in by the
/// sizing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Level {
    pub base_amount: f64,
    pub quote_price: f64,
    /// base_amount * quote_price; computed by the sizing pass when zero.
    pub notional_amount: f64,
    pub base_total: f64,
    pub notional_total: f64,
    /// Totals of every level strictly before this one.
    pub base_ahead: f64,
    pub notional_ahead: f64,
}

impl Level {
    pub fn new(base_amount: f64, quote_price: f64) -> Self {
        Self {
            base_amount,
            quote_price,
            ..Self::default()
        }
    }
}

/// One side of an order book, best price first, in the order the venue sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Depth {
    pub side: Side,
    pub base_currency: String,
    pub quote_currency: String,
    pub levels: Vec<Level>,
}

impl Depth {
    pub fn new(side: Side, base_currency: &str, quote_currency: &str) -> Self {
        Self {
            side,
            base_currency: base_currency.to_string(),
            quote_currency: quote_currency.to_string(),
            levels: Vec::new(),
        }
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = Level>) -> Self {
        self.levels.extend(levels);
        self
    }
}

/// Result of sizing a trade against a `Depth`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Trade {
    pub base_amount: f64,
    /// Price of the last level consumed.
    pub quote_price: f64,
    pub notional_amount: f64,
}

impl Trade {
    /// True when the walk landed exactly on `budget`. Anything short of it
    /// means the book could not absorb the budget.
    pub fn fills(&self, budget: f64) -> bool {
        self.notional_amount == budget
    }
}
