//! One evaluation cycle for one account: balances, buy sizing, rate
//! translation, sell sizing, margin gate and optional execution.

use super::evaluator::{self, Gate, capped, check_margin, size_buy_leg, size_sell_leg};
use super::types::{BalanceSnapshot, CycleOutcome, ExecutionReport, Opportunity};
use crate::cex::bitstamp::{LegacyNonce, OrderFlags};
use crate::cex::valr::ValrLimitOrder;
use crate::cex::{BitstampClient, ValrClient};
use crate::config::{AccountConfig, AppConfig, MarketConfig};
use crate::errors::Result;
use crate::market;
use crate::utils::{format_price, format_significant};
use reqwest::Client;
use tracing::{info, warn};

/// Bitstamp buy: plain limit, immediate-or-cancel.
const BUY_FLAGS: OrderFlags = OrderFlags {
    daily: false,
    ioc: true,
    fok: false,
};

/// Both venue adapters for one account plus the run-wide market settings.
pub struct CycleEngine {
    bitstamp: BitstampClient,
    valr: ValrClient,
    market: MarketConfig,
    utilization: f64,
}

impl CycleEngine {
    pub fn new(config: &AppConfig, http: &Client, account: &AccountConfig) -> Self {
        Self {
            bitstamp: BitstampClient::new(
                http.clone(),
                config.bitstamp.clone(),
                account.bitstamp.clone(),
            ),
            valr: ValrClient::new(http.clone(), config.valr.clone(), account.valr.clone()),
            market: config.market.clone(),
            utilization: config.balance_utilization,
        }
    }

    /// Quote balance on Bitstamp and base balance on VALR, uncapped.
    pub async fn balances(&self) -> Result<BalanceSnapshot> {
        let currency = self.market.bitstamp_balance_currency();
        let balance = self.bitstamp.account_balance(&currency).await?;
        let quote_available = market::bitstamp_available(&balance)?;
        self.snapshot(quote_available).await
    }

    /// Same snapshot, but the Bitstamp side goes through the legacy
    /// balance call. `nonce` must be shared by every call in the run.
    pub async fn legacy_balances(&self, nonce: &mut LegacyNonce) -> Result<BalanceSnapshot> {
        let balance = self.bitstamp.legacy_balance(nonce).await?;
        let quote_available = market::bitstamp_legacy_available(
            &balance,
            &self.market.bitstamp_balance_currency(),
        )?;
        self.snapshot(quote_available).await
    }

    async fn snapshot(&self, quote_available: f64) -> Result<BalanceSnapshot> {
        let balances = self.valr.balances().await?;
        let base_available =
            market::valr_available(&balances, &self.market.valr_balance_currency())?;

        info!(quote_available, base_available, "[CYCLE] balances");
        Ok(BalanceSnapshot {
            quote_available,
            base_available,
        })
    }

    /// Run the full pipeline for `account`. A gate that fails ends the
    /// cycle with `Skipped`; venue or decode failures come back as `Err`.
    pub async fn run(&self, account: &AccountConfig) -> Result<CycleOutcome> {
        let snapshot = self.balances().await?;
        let opportunity = match self.assess(account, snapshot).await? {
            Ok(opportunity) => opportunity,
            Err(reason) => {
                info!(%reason, "[CYCLE] skipped");
                return Ok(CycleOutcome::Skipped(reason));
            }
        };

        info!(
            buy_base = opportunity.buy.base_amount,
            buy_price = opportunity.buy.quote_price,
            sell_base = opportunity.sell.base_amount,
            sell_price = opportunity.sell.quote_price,
            profit = opportunity.profit_percentage,
            "[CYCLE] opportunity"
        );

        if !account.execute_trade {
            return Ok(CycleOutcome::Qualified(opportunity));
        }
        let execution = self.execute(&opportunity).await?;
        Ok(CycleOutcome::Executed {
            opportunity,
            execution: Box::new(execution),
        })
    }

    /// Steps 1-5. The outer `Result` carries venue failures, the inner
    /// `Gate` carries the reason a qualifying trade was not found.
    async fn assess(
        &self,
        account: &AccountConfig,
        snapshot: BalanceSnapshot,
    ) -> Result<Gate<Opportunity>> {
        let buy_budget = capped(snapshot.quote_available, self.utilization);
        let base_cap = capped(snapshot.base_available, self.utilization);
        info!(buy_budget, base_cap, "[CYCLE] capped balances");

        let book = self
            .bitstamp
            .order_book(&self.market.bitstamp_pair())
            .await?;
        let buyable = market::bitstamp_buyable(&book, &self.market.base, &self.market.buy_quote)?;
        let buy = match size_buy_leg(&buyable, buy_budget) {
            Ok(trade) => trade,
            Err(reason) => return Ok(Err(reason)),
        };

        let sell_budget = evaluator::sell_budget(&buy, account.exchange_rate);
        let book = self.valr.order_book(&self.market.valr_path_pair()).await?;
        let sellable = market::valr_sellable(&book, &self.market.base, &self.market.sell_quote)?;
        let sell = match size_sell_leg(&sellable, sell_budget, base_cap) {
            Ok(trade) => trade,
            Err(reason) => return Ok(Err(reason)),
        };

        Ok(check_margin(&buy, &sell, account.profit_margin).map(|profit_percentage| {
            Opportunity {
                buy_budget,
                buy,
                sell_budget,
                sell,
                base_cap,
                profit_percentage,
            }
        }))
    }

    /// Submit both legs, then take one status snapshot of each.
    async fn execute(&self, opportunity: &Opportunity) -> Result<ExecutionReport> {
        let buy_amount = format_significant(opportunity.buy.base_amount, 1);
        if rounded_up(&buy_amount, opportunity.buy.base_amount) {
            warn!(
                submitted = %buy_amount,
                sized = opportunity.buy.base_amount,
                budget = opportunity.buy_budget,
                "[ORDER] rounded buy amount exceeds sized amount"
            );
        }
        let buy_order = self
            .bitstamp
            .buy_limit_order(
                &self.market.bitstamp_pair(),
                opportunity.buy.base_amount,
                opportunity.buy.quote_price,
                BUY_FLAGS,
            )
            .await?;
        info!(id = %buy_order.id, price = %buy_order.price, amount = %buy_order.amount, "[ORDER] bitstamp buy placed");

        let sell = sell_order(&self.market, opportunity);
        if rounded_up(&sell.quantity, opportunity.sell.base_amount) {
            warn!(
                submitted = %sell.quantity,
                sized = opportunity.sell.base_amount,
                base_cap = opportunity.base_cap,
                "[ORDER] rounded sell quantity exceeds sized amount"
            );
        }
        let placed = self.valr.place_limit_order(&sell).await?;
        info!(id = %placed.id, quantity = %sell.quantity, price = %sell.price, "[ORDER] valr sell placed");

        let buy_status = self.bitstamp.order_status(&buy_order.id).await?;
        info!(status = %buy_status.status, remaining = %buy_status.amount_remaining, "[ORDER] bitstamp status");

        let sell_status = self
            .valr
            .order_status(&self.market.valr_path_pair(), &placed.id)
            .await?;
        info!(status = %sell_status.order_status_type, remaining = %sell_status.remaining_quantity, "[ORDER] valr status");
        if !sell_status.failed_reason.is_empty() {
            warn!(reason = %sell_status.failed_reason, "[ORDER] valr reported failure");
        }

        Ok(ExecutionReport {
            buy_order,
            sell_order_id: placed.id,
            buy_status,
            sell_status,
        })
    }
}

/// True when the submitted `formatted` amount is larger than what was sized.
fn rounded_up(formatted: &str, sized: f64) -> bool {
    formatted.parse::<f64>().is_ok_and(|submitted| submitted > sized)
}

/// VALR leg: IOC limit sell, never post-only, fresh client id per order.
pub fn sell_order(market: &MarketConfig, opportunity: &Opportunity) -> ValrLimitOrder {
    ValrLimitOrder {
        side: "SELL".to_string(),
        quantity: format_significant(opportunity.sell.base_amount, 1),
        price: format_price(opportunity.sell.quote_price),
        pair: market.valr_order_pair(),
        post_only: false,
        customer_order_id: uuid::Uuid::new_v4().simple().to_string(),
        time_in_force: "IOC".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Trade;

    #[test]
    fn rounding_up_is_detected() {
        assert!(rounded_up(&format_significant(0.49, 1), 0.49));
        assert!(rounded_up(&format_significant(0.0096, 1), 0.0096));
        assert!(!rounded_up(&format_significant(0.0123, 1), 0.0123));
        assert!(!rounded_up(&format_significant(0.5, 1), 0.5));
        assert!(!rounded_up("garbage", 0.5));
    }

    #[test]
    fn sell_order_formatting() {
        let market = MarketConfig {
            base: "btc".into(),
            buy_quote: "usd".into(),
            sell_quote: "zar".into(),
        };
        let opportunity = Opportunity {
            buy_budget: 30_000.0,
            buy: Trade {
                base_amount: 0.5,
                quote_price: 60_000.0,
                notional_amount: 30_000.0,
            },
            sell_budget: 540_000.0,
            sell: Trade {
                base_amount: 0.0123,
                quote_price: 1_102_040.816,
                notional_amount: 540_000.0,
            },
            base_cap: 1.0,
            profit_percentage: 0.02,
        };
        let order = sell_order(&market, &opportunity);
        assert_eq!(order.quantity, "0.01");
        assert_eq!(order.price, "1102040.82");
        assert_eq!(order.pair, "BTCZAR");
        assert_eq!(order.time_in_force, "IOC");
        assert!(!order.post_only);
        assert_eq!(order.customer_order_id.len(), 32);
        assert_ne!(
            order.customer_order_id,
            sell_order(&market, &opportunity).customer_order_id
        );
    }
}
