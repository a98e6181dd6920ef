//! ETF dip-buying score on hourly bars.
//!
//! Six one-point conditions; five or more is a BUY. An overbought RSI with
//! MACD below its signal is a SELL.

use crate::domain::indicator::{
    IndicatorValue, calculate_atr, calculate_bollinger, calculate_ema, calculate_macd,
    calculate_rsi, calculate_sma, calculate_stochastic,
};
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::signal::Signal;

pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;
pub const BUY_SCORE: u8 = 5;
pub const RECENT_LOW_BARS: usize = 20;
pub const STOP_ATR_MULT: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct DipReading {
    pub price: f64,
    pub sma20: f64,
    pub ema50: f64,
    pub ema200: f64,
    pub rsi: f64,
    pub atr: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub stoch_k: f64,
    pub bb_lower: f64,
    pub recent_low: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DipSignal {
    pub ticker: String,
    pub signal: Signal,
    pub score: u8,
    pub trend: &'static str,
    pub reasons: Vec<String>,
    pub reading: DipReading,
}

impl DipSignal {
    pub fn stop_loss(&self) -> f64 {
        self.reading.price - STOP_ATR_MULT * self.reading.atr
    }

    pub fn subject(&self) -> String {
        format!("Stock Alert: {} - {}", self.ticker, self.signal)
    }

    pub fn body(&self) -> String {
        format!(
            "Signal: {}\nTrend: {}\nPrice: ${:.2}\nRSI: {:.2}\nATR: {:.2}\nReason: {}\n\nEntry: ${:.2}\nStop Loss: ${:.2}\n",
            self.signal,
            self.trend,
            self.reading.price,
            self.reading.rsi,
            self.reading.atr,
            self.reasons.join(", "),
            self.reading.price,
            self.stop_loss()
        )
    }
}

pub fn is_bullish_engulfing(prev: &OhlcvBar, last: &OhlcvBar) -> bool {
    last.is_bullish() && prev.is_bearish() && last.close > prev.open && last.open < prev.close
}

/// Long lower wick (more than twice the body) with a short upper wick.
pub fn is_hammer(bar: &OhlcvBar) -> bool {
    let body = (bar.close - bar.open).abs();
    let lower_wick = bar.close.min(bar.open) - bar.low;
    let upper_wick = bar.high - bar.close.max(bar.open);
    lower_wick > 2.0 * body && upper_wick < body
}

/// Latest indicator values, `None` while any indicator is still warming up.
pub fn read_indicators(bars: &[OhlcvBar]) -> Option<DipReading> {
    let price = bars.last()?.close;
    let (macd, macd_signal) = match calculate_macd(bars, 12, 26, 9).latest() {
        Some(IndicatorValue::Macd { line, signal, .. }) => (*line, *signal),
        _ => return None,
    };
    let stoch_k = match calculate_stochastic(bars, 14, 3).latest() {
        Some(IndicatorValue::Stochastic { k, .. }) => *k,
        _ => return None,
    };
    let bb_lower = match calculate_bollinger(bars, 20, 200).latest() {
        Some(IndicatorValue::Bollinger { lower, .. }) => *lower,
        _ => return None,
    };
    let recent_low = bars[bars.len().saturating_sub(RECENT_LOW_BARS)..]
        .iter()
        .map(|b| b.low)
        .fold(f64::INFINITY, f64::min);

    Some(DipReading {
        price,
        sma20: calculate_sma(bars, 20).latest_simple()?,
        ema50: calculate_ema(bars, 50).latest_simple()?,
        ema200: calculate_ema(bars, 200).latest_simple()?,
        rsi: calculate_rsi(bars, 14).latest_simple()?,
        atr: calculate_atr(bars, 14).latest_simple()?,
        macd,
        macd_signal,
        stoch_k,
        bb_lower,
        recent_low,
    })
}

/// Score the latest bars. Returns a reading even when no signal fires so
/// callers can log it; `signal` is `Hold` in that case.
pub fn evaluate(ticker: &str, bars: &[OhlcvBar]) -> Option<DipSignal> {
    if bars.len() < 2 {
        return None;
    }
    let r = read_indicators(bars)?;
    let mut score = 0u8;
    let mut reasons = Vec::new();
    let mut hit = |cond: bool, reason: String| {
        if cond {
            score += 1;
            reasons.push(reason);
        }
    };

    hit(r.rsi < RSI_OVERSOLD, "RSI < 30 (oversold)".into());
    hit(r.macd > r.macd_signal, "MACD turning up".into());
    hit(r.price <= r.ema50 * 1.02, "Price near/below EMA50".into());
    hit(r.price <= r.bb_lower * 1.01, "Price near lower BB".into());
    hit(
        r.price <= r.recent_low * 1.05,
        format!("Near {}-bar low", RECENT_LOW_BARS),
    );

    let prev = &bars[bars.len() - 2];
    let last = &bars[bars.len() - 1];
    if is_bullish_engulfing(prev, last) {
        hit(true, "Bullish engulfing pattern".into());
    } else {
        hit(is_hammer(last), "Hammer candle".into());
    }

    let trend = if r.price > r.sma20 && r.sma20 > r.ema50 {
        "Uptrend"
    } else {
        "Sideways or Down"
    };

    let signal = if score >= BUY_SCORE {
        Signal::Buy
    } else if r.rsi > RSI_OVERBOUGHT && r.macd < r.macd_signal {
        Signal::Sell
    } else {
        Signal::Hold
    };

    Some(DipSignal {
        ticker: ticker.to_string(),
        signal,
        score,
        trend,
        reasons,
        reading: r,
    })
}
