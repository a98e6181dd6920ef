//! Trailing stop-loss orders that follow SuperTrend.

use crate::domain::indicator::supertrend::{self, latest_supertrend};
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::broker_port::{BrokerPort, OpenOrder, Position};
use crate::ports::market_data_port::{HistoryRange, Interval, MarketDataPort};
use std::collections::HashMap;

pub const HISTORY_DAYS: u32 = 90;
/// Existing stops closer than this to the target are left alone.
pub const PRICE_TOLERANCE: f64 = 0.01;
const BUFFER: f64 = 0.01;

/// 1% under a bullish SuperTrend line, 1% over a bearish one.
pub fn stop_from_supertrend(bars: &[OhlcvBar]) -> Option<f64> {
    let series =
        supertrend::calculate_supertrend(bars, supertrend::DEFAULT_PERIOD, supertrend::DEFAULT_MULT_X100);
    let (line, direction) = latest_supertrend(&series)?;
    let stop = if direction > 0 {
        line * (1.0 - BUFFER)
    } else {
        line * (1.0 + BUFFER)
    };
    Some(stop)
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopAction {
    Place,
    Replace { order_id: String, old_price: f64 },
    Keep,
}

pub fn decide(existing: Option<&OpenOrder>, target: f64) -> StopAction {
    match existing {
        None => StopAction::Place,
        Some(order) => {
            let old_price = order.stop_price.unwrap_or(0.0);
            if (old_price - target).abs() > PRICE_TOLERANCE {
                StopAction::Replace {
                    order_id: order.order_id.clone(),
                    old_price,
                }
            } else {
                StopAction::Keep
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopSyncReport {
    pub placed: Vec<(String, f64)>,
    pub updated: Vec<(String, f64)>,
    pub unchanged: Vec<String>,
    pub failed: Vec<String>,
}

/// Existing SELL stop orders keyed by ticker.
pub fn stop_orders_by_ticker(orders: &[OpenOrder]) -> HashMap<&str, &OpenOrder> {
    orders
        .iter()
        .filter(|o| o.is_stop_sell())
        .map(|o| (o.ticker.as_str(), o))
        .collect()
}

pub fn sync_stops(
    broker: &dyn BrokerPort,
    market_data: &dyn MarketDataPort,
    account: &str,
    positions: &[Position],
    open_orders: &[OpenOrder],
) -> StopSyncReport {
    let existing = stop_orders_by_ticker(open_orders);
    let mut report = StopSyncReport::default();

    for pos in positions {
        let ticker = pos.ticker.as_str();
        let qty = pos.quantity.abs().floor() as u64;

        let stop = match market_data.fetch_history(ticker, HistoryRange::Days(HISTORY_DAYS), Interval::Daily) {
            Ok(bars) => stop_from_supertrend(&bars),
            Err(e) => {
                tracing::warn!("No data for {}: {}", ticker, e);
                None
            }
        };
        let Some(stop) = stop else {
            report.failed.push(ticker.to_string());
            continue;
        };

        let conid = match broker.conid(ticker) {
            Ok(Some(conid)) => conid,
            _ => {
                report.failed.push(ticker.to_string());
                continue;
            }
        };

        match decide(existing.get(ticker).copied(), stop) {
            StopAction::Keep => {
                tracing::info!("Stop loss for {} already at {:.2}, no update needed", ticker, stop);
                report.unchanged.push(ticker.to_string());
            }
            StopAction::Replace { order_id, old_price } => {
                tracing::info!("Updating stop loss for {} from {:.2} to {:.2}", ticker, old_price, stop);
                if let Err(e) = broker.cancel_order(account, &order_id) {
                    tracing::warn!("Could not cancel existing order for {}, skipping update: {}", ticker, e);
                    report.failed.push(ticker.to_string());
                    continue;
                }
                match broker.place_stop_order(account, conid, qty, stop) {
                    Ok(()) => report.updated.push((ticker.to_string(), stop)),
                    Err(e) => {
                        tracing::error!("Placing stop for {} failed: {}", ticker, e);
                        report.failed.push(ticker.to_string());
                    }
                }
            }
            StopAction::Place => {
                tracing::info!("Placing new stop loss for {} @ {:.2} (Qty: {})", ticker, stop, qty);
                match broker.place_stop_order(account, conid, qty, stop) {
                    Ok(()) => report.placed.push((ticker.to_string(), stop)),
                    Err(e) => {
                        tracing::error!("Placing stop for {} failed: {}", ticker, e);
                        report.failed.push(ticker.to_string());
                    }
                }
            }
        }
    }

    if !report.failed.is_empty() {
        tracing::warn!("Tickers with issues: {:?}", report.failed);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::bar;

    fn stop_order(ticker: &str, price: f64) -> OpenOrder {
        OpenOrder {
            order_id: "42".into(),
            ticker: ticker.into(),
            order_type: "stop".into(),
            side: "SELL".into(),
            stop_price: Some(price),
        }
    }

    #[test]
    fn decision_respects_tolerance() {
        assert_eq!(decide(None, 10.0), StopAction::Place);
        assert_eq!(decide(Some(&stop_order("A", 10.005)), 10.0), StopAction::Keep);
        assert_eq!(
            decide(Some(&stop_order("A", 9.5)), 10.0),
            StopAction::Replace {
                order_id: "42".into(),
                old_price: 9.5
            }
        );
    }

    #[test]
    fn only_sell_stops_are_indexed() {
        let mut buy_limit = stop_order("B", 1.0);
        buy_limit.order_type = "limit".into();
        let orders = vec![stop_order("A", 1.0), buy_limit];
        let map = stop_orders_by_ticker(&orders);
        assert!(map.contains_key("A"));
        assert!(!map.contains_key("B"));
    }

    #[test]
    fn stop_sits_below_uptrend() {
        let bars: Vec<OhlcvBar> = (0..40)
            .map(|i| {
                let c = 50.0 + i as f64;
                bar(i, c - 0.5, c + 0.5, c - 1.0, c)
            })
            .collect();
        let stop = stop_from_supertrend(&bars).unwrap();
        assert!(stop < bars.last().unwrap().close);
    }

    #[test]
    fn too_little_data() {
        let bars: Vec<OhlcvBar> = (0..5).map(|i| bar(i, 1.0, 1.1, 0.9, 1.0)).collect();
        assert!(stop_from_supertrend(&bars).is_none());
    }
}
