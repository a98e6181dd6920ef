//! EMA pullback screener.
//!
//! BUY: stacked EMAs (20 > 50 > 100 > 200), price within 2% of EMA50 and a
//! bullish SuperTrend. SELL: SuperTrend turned bearish. SELL only needs the
//! SuperTrend, so it fires even while EMA200 is still warming up.

use crate::domain::indicator::supertrend::latest_supertrend;
use crate::domain::indicator::{calculate_atr, calculate_ema, calculate_supertrend};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::{ActiveSignals, Signal};

pub const PULLBACK_TOLERANCE: f64 = 0.02;
pub const STOP_ATR_MULT: f64 = 1.2;
pub const TARGET_ATR_MULT: f64 = 2.4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaStack {
    pub ema20: f64,
    pub ema50: f64,
    pub ema100: f64,
    pub ema200: f64,
}

impl EmaStack {
    /// All four EMAs, or `None` while any of them is warming up.
    pub fn latest(bars: &[OhlcvBar]) -> Option<Self> {
        Some(Self {
            ema20: calculate_ema(bars, 20).latest_simple()?,
            ema50: calculate_ema(bars, 50).latest_simple()?,
            ema100: calculate_ema(bars, 100).latest_simple()?,
            ema200: calculate_ema(bars, 200).latest_simple()?,
        })
    }

    pub fn is_pullback(&self, price: f64) -> bool {
        self.is_bullish() && self.ema50 != 0.0 && (price - self.ema50).abs() / self.ema50 < PULLBACK_TOLERANCE
    }

    pub fn is_bullish(&self) -> bool {
        self.ema20 > self.ema50 && self.ema50 > self.ema100 && self.ema100 > self.ema200
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradePlan {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PullbackSignal {
    pub ticker: String,
    pub signal: Signal,
    pub price: f64,
    pub emas: Option<EmaStack>,
    pub atr: f64,
    pub trend: &'static str,
    pub reason: &'static str,
    pub plan: Option<TradePlan>,
}

impl PullbackSignal {
    pub fn subject(&self) -> String {
        format!("Stock Alert: {} - {}", self.ticker, self.signal)
    }

    pub fn body(&self) -> String {
        let ema = |pick: fn(&EmaStack) -> f64| {
            self.emas
                .as_ref()
                .map(|e| format!("{:.2}", pick(e)))
                .unwrap_or_else(|| "n/a".to_string())
        };
        let mut body = format!(
            "Signal: {}\nTrend: {}\nPrice: {:.2}\nEMA: \n\tEMA20: {}\n\tEMA50: {}\n\tEMA100: {}\n\tEMA200: {}\nReason: {}\n",
            self.signal,
            self.trend,
            self.price,
            ema(|e| e.ema20),
            ema(|e| e.ema50),
            ema(|e| e.ema100),
            ema(|e| e.ema200),
            self.reason
        );
        if let Some(plan) = &self.plan {
            body.push_str(&format!(
                "\nEntry: {:.2}\nStop Loss: {:.2}\nTake Profit: {:.2}\n",
                plan.entry, plan.stop_loss, plan.take_profit
            ));
        }
        body
    }
}

/// Evaluate the latest bar. `None` means HOLD or not enough history for
/// the SuperTrend and ATR.
pub fn evaluate(ticker: &str, bars: &[OhlcvBar]) -> Option<PullbackSignal> {
    let price = bars.last()?.close;
    let (_, direction) = latest_supertrend(&calculate_supertrend(bars, 10, 300))?;
    let atr = calculate_atr(bars, 14).latest_simple()?;
    let emas = EmaStack::latest(bars);

    if direction == 1 {
        let stack = emas.filter(|e| e.is_pullback(price))?;
        return Some(PullbackSignal {
            ticker: ticker.to_string(),
            signal: Signal::Buy,
            price,
            emas: Some(stack),
            atr,
            trend: "Uptrend",
            reason: "Pullback to EMA50 in strong uptrend with SuperTrend confirmation",
            plan: Some(TradePlan {
                entry: price,
                stop_loss: price - STOP_ATR_MULT * atr,
                take_profit: price + TARGET_ATR_MULT * atr,
            }),
        });
    }

    if direction == -1 {
        return Some(PullbackSignal {
            ticker: ticker.to_string(),
            signal: Signal::Sell,
            price,
            emas,
            atr,
            trend: "Downtrend",
            reason: "SuperTrend turned to SELL",
            plan: None,
        });
    }

    None
}

/// Apply a signal to the active BUY set. Returns false when the signal should
/// not be alerted (a SELL for a ticker we never flagged as a BUY).
pub fn apply_to_active(active: &mut ActiveSignals, signal: &PullbackSignal) -> bool {
    match signal.signal {
        Signal::Sell => active.remove(&signal.ticker),
        Signal::Buy => {
            active.insert(&signal.ticker);
            true
        }
        Signal::Hold => false,
    }
}
