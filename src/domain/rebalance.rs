//! Momentum portfolio rebalancing against a broker.
//!
//! Held names that dropped out of the top set are sold at market, after their
//! protective stop is cancelled. Top names that are neither held nor already
//! working an order are bought with an even split of the available cash less
//! a fixed reserve.

use crate::ports::broker_port::{BrokerPort, OpenOrder, OrderSide, Position};
use std::collections::{HashMap, HashSet};
use std::fmt;

pub const DEFAULT_CASH_RESERVE: f64 = 10.0;
pub const DEFAULT_TOP_N: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TradeAction {
    Buy,
    Sell,
    Both,
}

impl TradeAction {
    pub fn sells(&self) -> bool {
        matches!(self, TradeAction::Sell | TradeAction::Both)
    }

    pub fn buys(&self) -> bool {
        matches!(self, TradeAction::Buy | TradeAction::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::Both => "both",
        }
    }
}

/// A ticker with the share count involved, when it is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOutcome {
    pub ticker: String,
    pub quantity: Option<u64>,
}

impl TradeOutcome {
    pub fn new(ticker: &str, quantity: u64) -> Self {
        Self {
            ticker: ticker.to_string(),
            quantity: Some(quantity),
        }
    }

    pub fn unknown(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            quantity: None,
        }
    }
}

impl fmt::Display for TradeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quantity {
            Some(q) => write!(f, "{} (Qty: {})", self.ticker, q),
            None => write!(f, "{} (Qty: unknown)", self.ticker),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeSummary {
    pub action: TradeAction,
    pub dry_run: bool,
    pub successful_buys: Vec<TradeOutcome>,
    pub failed_buys: Vec<TradeOutcome>,
    pub successful_sells: Vec<TradeOutcome>,
    pub failed_sells: Vec<TradeOutcome>,
    pub holds: Vec<String>,
}

fn list_or_none(items: &[TradeOutcome]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TradeSummary {
    pub fn new(action: TradeAction, dry_run: bool) -> Self {
        Self {
            action,
            dry_run,
            successful_buys: Vec::new(),
            failed_buys: Vec::new(),
            successful_sells: Vec::new(),
            failed_sells: Vec::new(),
            holds: Vec::new(),
        }
    }

    fn mode(&self) -> &'static str {
        if self.dry_run { "DRY RUN" } else { "LIVE" }
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_buys.is_empty() || !self.failed_sells.is_empty()
    }

    pub fn subject(&self) -> String {
        format!(
            "[StratBot] Momentum Trades Summary ({})",
            self.action.as_str().to_uppercase()
        )
    }

    pub fn email_body(&self) -> String {
        format!(
            "Momentum Trades Completed ({})\n\n\
             Successful Buys:\n{}\n\n\
             Failed Buys (Review and consider manual orders):\n{}\n\n\
             Successful Sells:\n{}\n\n\
             Failed Sells (Review and consider manual orders):\n{}",
            self.mode(),
            list_or_none(&self.successful_buys),
            list_or_none(&self.failed_buys),
            list_or_none(&self.successful_sells),
            list_or_none(&self.failed_sells),
        )
    }

    /// Markdown flavour for Telegram.
    pub fn telegram_body(&self) -> String {
        format!(
            "*Momentum Trades Summary* ({})\n\n\
             *Successful Buys:*\n{}\n\n\
             *Failed Buys:*\n{}\n\n\
             *Successful Sells:*\n{}\n\n\
             *Failed Sells:*\n{}",
            self.mode(),
            list_or_none(&self.successful_buys),
            list_or_none(&self.failed_buys),
            list_or_none(&self.successful_sells),
            list_or_none(&self.failed_sells),
        )
    }
}

/// Working orders split into protective stop sells and everything else.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingOrders {
    /// Tickers with a working non-stop order. Neither leg touches them.
    pub blocking: HashSet<String>,
    /// Stop-sell order ids by ticker.
    pub stops: HashMap<String, Vec<String>>,
}

impl WorkingOrders {
    pub fn from_orders(orders: &[OpenOrder]) -> Self {
        let mut working = Self::default();
        for order in orders {
            if order.is_stop_sell() {
                working
                    .stops
                    .entry(order.ticker.clone())
                    .or_default()
                    .push(order.order_id.clone());
            } else {
                working.blocking.insert(order.ticker.clone());
            }
        }
        working
    }

    fn stops_for(&self, ticker: &str) -> &[String] {
        self.stops.get(ticker).map(Vec::as_slice).unwrap_or_default()
    }
}

pub struct Rebalancer<'a> {
    broker: &'a dyn BrokerPort,
    account: &'a str,
    cash_reserve: f64,
    dry_run: bool,
}

impl<'a> Rebalancer<'a> {
    pub fn new(broker: &'a dyn BrokerPort, account: &'a str, cash_reserve: f64, dry_run: bool) -> Self {
        Self {
            broker,
            account,
            cash_reserve,
            dry_run,
        }
    }

    /// Run the requested legs. `top` is in rank order.
    pub fn run(
        &self,
        action: TradeAction,
        top: &[String],
        positions: &[Position],
        working: &WorkingOrders,
    ) -> TradeSummary {
        let mut summary = TradeSummary::new(action, self.dry_run);
        let top_set: HashSet<&str> = top.iter().map(String::as_str).collect();

        if action.sells() {
            self.sell_leg(&top_set, positions, working, &mut summary);
        }
        if action.buys() {
            let candidates = buy_candidates(top, positions, &working.blocking);
            if candidates.is_empty() {
                tracing::info!("No new stocks to buy");
            } else {
                self.buy_leg(&candidates, &mut summary);
            }
        }
        summary
    }

    fn sell_leg(
        &self,
        top: &HashSet<&str>,
        positions: &[Position],
        working: &WorkingOrders,
        summary: &mut TradeSummary,
    ) {
        for pos in positions {
            if working.blocking.contains(&pos.ticker) {
                tracing::info!("Skipping SELL for {}: already has an open order", pos.ticker);
                continue;
            }
            if top.contains(pos.ticker.as_str()) {
                tracing::info!("HOLD: {}", pos.ticker);
                summary.holds.push(pos.ticker.clone());
                continue;
            }
            let Some(conid) = pos.conid else { continue };
            let qty = pos.quantity.floor();
            if qty < 1.0 {
                continue;
            }
            let qty = qty as u64;

            tracing::info!("SELL: {} (Qty: {})", pos.ticker, qty);
            let stops = working.stops_for(&pos.ticker);
            if self.dry_run {
                for order_id in stops {
                    tracing::info!("[DRY-RUN] Would cancel stop {} for {}", order_id, pos.ticker);
                }
                tracing::info!("[DRY-RUN] Would SELL {} Qty: {}", pos.ticker, qty);
                summary.successful_sells.push(TradeOutcome::new(&pos.ticker, qty));
                continue;
            }
            if !self.cancel_stops(&pos.ticker, stops) {
                summary.failed_sells.push(TradeOutcome::new(&pos.ticker, qty));
                continue;
            }
            match self
                .broker
                .place_market_order(self.account, conid, OrderSide::Sell, qty)
            {
                Ok(()) => summary.successful_sells.push(TradeOutcome::new(&pos.ticker, qty)),
                Err(e) => {
                    tracing::error!("SELL {} failed: {}", pos.ticker, e);
                    summary.failed_sells.push(TradeOutcome::new(&pos.ticker, qty));
                }
            }
        }
    }

    /// Cancel a ticker's stop sells so it cannot go short once sold.
    fn cancel_stops(&self, ticker: &str, stops: &[String]) -> bool {
        for order_id in stops {
            if let Err(e) = self.broker.cancel_order(self.account, order_id) {
                tracing::error!("Cancel stop {} for {} failed, not selling: {}", order_id, ticker, e);
                return false;
            }
            tracing::info!("Cancelled stop {} for {}", order_id, ticker);
        }
        true
    }

    fn buy_leg(&self, candidates: &[String], summary: &mut TradeSummary) {
        let cash = match self.broker.available_cash(self.account) {
            Ok(cash) => cash - self.cash_reserve,
            Err(e) => {
                tracing::error!("Could not read available cash: {}", e);
                summary
                    .failed_buys
                    .extend(candidates.iter().map(|t| TradeOutcome::unknown(t)));
                return;
            }
        };
        let cash_per_stock = cash / candidates.len() as f64;
        tracing::info!(
            "Available cash: ${:.2}, Stocks to buy: {}, Cash per stock: ${:.2}",
            cash,
            candidates.len(),
            cash_per_stock
        );

        for ticker in candidates {
            let conid = match self.broker.conid(ticker) {
                Ok(Some(conid)) => conid,
                Ok(None) | Err(_) => {
                    tracing::warn!("Skipping {}: no conid found", ticker);
                    summary.failed_buys.push(TradeOutcome::unknown(ticker));
                    continue;
                }
            };
            let price = match self.broker.market_price(conid) {
                Ok(Some(price)) if price > 0.0 => price,
                _ => {
                    tracing::warn!("Skipping {}: no price found for conid {}", ticker, conid);
                    summary.failed_buys.push(TradeOutcome::unknown(ticker));
                    continue;
                }
            };

            let qty = shares_for(cash_per_stock, price);
            if qty < 1 {
                tracing::warn!(
                    "Skipping {}: insufficient cash (${:.2}) for price ${:.2}",
                    ticker,
                    cash_per_stock,
                    price
                );
                summary.failed_buys.push(TradeOutcome::new(ticker, qty));
                continue;
            }

            tracing::info!("BUY: {} (Price: {}, Qty: {})", ticker, price, qty);
            if self.dry_run {
                tracing::info!("[DRY-RUN] Would BUY {} Qty: {} at ${}", ticker, qty, price);
                summary.successful_buys.push(TradeOutcome::new(ticker, qty));
                continue;
            }
            match self
                .broker
                .place_market_order(self.account, conid, OrderSide::Buy, qty)
            {
                Ok(()) => summary.successful_buys.push(TradeOutcome::new(ticker, qty)),
                Err(e) => {
                    tracing::error!("BUY {} failed: {}", ticker, e);
                    summary.failed_buys.push(TradeOutcome::new(ticker, qty));
                }
            }
        }
    }
}

/// Whole shares affordable; zero for non-positive cash.
pub fn shares_for(cash: f64, price: f64) -> u64 {
    if cash <= 0.0 || price <= 0.0 {
        return 0;
    }
    (cash / price).floor() as u64
}

/// Top names, in rank order, that are neither held nor already ordered.
pub fn buy_candidates(
    top: &[String],
    positions: &[Position],
    open_order_tickers: &HashSet<String>,
) -> Vec<String> {
    let held: HashSet<&str> = positions.iter().map(|p| p.ticker.as_str()).collect();
    top.iter()
        .filter(|t| !held.contains(t.as_str()) && !open_order_tickers.contains(*t))
        .cloned()
        .collect()
}
