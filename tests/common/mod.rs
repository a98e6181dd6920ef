#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::cell::RefCell;
use std::collections::HashMap;
use yenesis::domain::error::YenesisError;
pub use yenesis::domain::ohlcv::OhlcvBar;
use yenesis::ports::broker_port::{BrokerPort, OpenOrder, OrderSide, Position};
use yenesis::ports::market_data_port::{HistoryRange, Interval, MarketDataPort, TickerProfile};
use yenesis::ports::notifier_port::{Notification, NotifierPort};

pub struct MockMarketData {
    pub bars: HashMap<String, Vec<OhlcvBar>>,
    pub profiles: HashMap<String, TickerProfile>,
    pub errors: HashMap<String, String>,
    pub requests: RefCell<Vec<(String, HistoryRange, Interval)>>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            profiles: HashMap::new(),
            errors: HashMap::new(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<OhlcvBar>) -> Self {
        self.bars.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_market_cap(mut self, symbol: &str, market_cap: f64) -> Self {
        self.profiles.insert(
            symbol.to_string(),
            TickerProfile {
                symbol: symbol.to_string(),
                name: Some(format!("{} Corp", symbol)),
                market_cap: Some(market_cap),
                ..TickerProfile::default()
            },
        );
        self
    }

    pub fn with_profile(mut self, profile: TickerProfile) -> Self {
        self.profiles.insert(profile.symbol.clone(), profile);
        self
    }

    /// Every call for `symbol` fails like an HTTP error would.
    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketData {
    fn fetch_history(
        &self,
        symbol: &str,
        range: HistoryRange,
        interval: Interval,
    ) -> Result<Vec<OhlcvBar>, YenesisError> {
        self.requests
            .borrow_mut()
            .push((symbol.to_string(), range, interval));
        if let Some(reason) = self.errors.get(symbol) {
            return Err(YenesisError::market_data(symbol, reason));
        }
        match self.bars.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(YenesisError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }

    fn fetch_profile(&self, symbol: &str) -> Result<TickerProfile, YenesisError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(YenesisError::market_data(symbol, reason));
        }
        self.profiles
            .get(symbol)
            .cloned()
            .ok_or_else(|| YenesisError::NoData {
                symbol: symbol.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrokerCall {
    Market {
        conid: i64,
        side: OrderSide,
        quantity: u64,
    },
    Stop {
        conid: i64,
        quantity: u64,
        stop_price: f64,
    },
    Cancel {
        order_id: String,
    },
}

pub struct MockBroker {
    pub authenticated: bool,
    pub accounts: Vec<String>,
    pub cash: f64,
    pub positions: Vec<Position>,
    pub conids: HashMap<String, i64>,
    pub prices: HashMap<i64, f64>,
    pub open_orders: Vec<OpenOrder>,
    pub failing_cancels: Vec<String>,
    pub calls: RefCell<Vec<BrokerCall>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            authenticated: true,
            accounts: vec!["U1234567".to_string()],
            cash: 0.0,
            positions: Vec::new(),
            conids: HashMap::new(),
            prices: HashMap::new(),
            open_orders: Vec::new(),
            failing_cancels: Vec::new(),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Register a tradable contract with a quote.
    pub fn with_contract(mut self, ticker: &str, conid: i64, price: f64) -> Self {
        self.conids.insert(ticker.to_string(), conid);
        self.prices.insert(conid, price);
        self
    }

    pub fn with_position(mut self, ticker: &str, quantity: f64) -> Self {
        let conid = self.conids.get(ticker).copied();
        self.positions.push(Position {
            ticker: ticker.to_string(),
            conid,
            quantity,
        });
        self
    }

    pub fn with_stop(mut self, order_id: &str, ticker: &str, stop_price: f64) -> Self {
        self.open_orders.push(OpenOrder {
            order_id: order_id.to_string(),
            ticker: ticker.to_string(),
            order_type: "stop".to_string(),
            side: "SELL".to_string(),
            stop_price: Some(stop_price),
        });
        self
    }

    /// A working non-stop order, e.g. a pending limit buy.
    pub fn with_order(mut self, order_id: &str, ticker: &str, order_type: &str, side: &str) -> Self {
        self.open_orders.push(OpenOrder {
            order_id: order_id.to_string(),
            ticker: ticker.to_string(),
            order_type: order_type.to_string(),
            side: side.to_string(),
            stop_price: None,
        });
        self
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.calls.borrow().clone()
    }
}

impl BrokerPort for MockBroker {
    fn auth_status(&self) -> Result<bool, YenesisError> {
        Ok(self.authenticated)
    }

    fn accounts(&self) -> Result<Vec<String>, YenesisError> {
        Ok(self.accounts.clone())
    }

    fn available_cash(&self, _account: &str) -> Result<f64, YenesisError> {
        Ok(self.cash)
    }

    fn positions(&self, _account: &str) -> Result<Vec<Position>, YenesisError> {
        Ok(self.positions.clone())
    }

    fn conid(&self, symbol: &str) -> Result<Option<i64>, YenesisError> {
        Ok(self.conids.get(symbol).copied())
    }

    fn market_price(&self, conid: i64) -> Result<Option<f64>, YenesisError> {
        Ok(self.prices.get(&conid).copied())
    }

    fn place_market_order(
        &self,
        _account: &str,
        conid: i64,
        side: OrderSide,
        quantity: u64,
    ) -> Result<(), YenesisError> {
        self.calls.borrow_mut().push(BrokerCall::Market {
            conid,
            side,
            quantity,
        });
        Ok(())
    }

    fn place_stop_order(
        &self,
        _account: &str,
        conid: i64,
        quantity: u64,
        stop_price: f64,
    ) -> Result<(), YenesisError> {
        self.calls.borrow_mut().push(BrokerCall::Stop {
            conid,
            quantity,
            stop_price,
        });
        Ok(())
    }

    fn cancel_order(&self, _account: &str, order_id: &str) -> Result<(), YenesisError> {
        if self.failing_cancels.iter().any(|id| id == order_id) {
            return Err(YenesisError::broker(format!("cancel {} rejected", order_id)));
        }
        self.calls.borrow_mut().push(BrokerCall::Cancel {
            order_id: order_id.to_string(),
        });
        Ok(())
    }

    fn open_orders(&self) -> Result<Vec<OpenOrder>, YenesisError> {
        Ok(self.open_orders.clone())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: RefCell<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent.borrow().iter().map(|n| n.subject.clone()).collect()
    }
}

impl NotifierPort for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<(), YenesisError> {
        self.sent.borrow_mut().push(notification.clone());
        Ok(())
    }
}

pub fn series(symbol: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| OhlcvBar {
            symbol: symbol.to_string(),
            date: start + Duration::days(i as i64),
            open: c,
            high: c * 1.01,
            low: c * 0.99,
            close: c,
            adjusted_close: c,
            volume: 1_000,
        })
        .collect()
}

/// Slow uptrend with a wobble, so every ROC window has spread.
pub fn benchmark(symbol: &str, n: usize) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..n)
        .map(|i| 100.0 * (1.0 + 0.0005 * i as f64) + (i as f64 * 0.7).sin())
        .collect();
    series(symbol, &closes)
}

/// Tracks the benchmark shape, compounds faster and spikes over the last bars.
pub fn leader(symbol: &str, n: usize) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let base = 50.0 * (1.0 + 0.0005 * i as f64) + (i as f64 * 0.9).cos();
            let boost = if i + 5 >= n {
                1.0 + 0.08 * (i + 6 - n) as f64
            } else {
                1.0
            };
            base * (1.0 + 0.002 * i as f64) * boost
        })
        .collect();
    series(symbol, &closes)
}

/// Steady decline; fails every benchmark comparison.
pub fn laggard(symbol: &str, n: usize) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..n).map(|i| 80.0 - i as f64 * 0.05).collect();
    series(symbol, &closes)
}

/// Steady climb; SuperTrend stays bullish.
pub fn uptrend(symbol: &str, n: usize, start: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..n).map(|i| start + i as f64 * 0.5).collect();
    series(symbol, &closes)
}

/// Gentle climb; EMAs stack up and price stays within 2% of EMA50.
pub fn pullback(symbol: &str, n: usize) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * 0.05).collect();
    series(symbol, &closes)
}

/// 150 rising bars then 22 falling ones: SuperTrend bearish, EMA200 not
/// yet available.
pub fn rise_then_crash(symbol: &str) -> Vec<OhlcvBar> {
    let mut closes: Vec<f64> = (0..150).map(|i| 100.0 + i as f64 * 0.1).collect();
    closes.extend((0..22).map(|k| 115.0 - 3.0 * (k + 1) as f64));
    series(symbol, &closes)
}

/// Straight-line rally that flattens at the top: RSI pinned high while MACD
/// rolls under its signal.
pub fn topping(symbol: &str) -> Vec<OhlcvBar> {
    let mut closes: Vec<f64> = (0..230).map(|i| 100.0 + i as f64).collect();
    closes.extend((0..20).map(|k| 329.0 + 0.1 * (k + 1) as f64));
    series(symbol, &closes)
}

pub fn flat(symbol: &str, n: usize) -> Vec<OhlcvBar> {
    series(symbol, &vec![100.0; n])
}
