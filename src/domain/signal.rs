//! Trading signals and alert throttling shared by the screeners.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => f.write_str("BUY"),
            Signal::Sell => f.write_str("SELL"),
            Signal::Hold => f.write_str("HOLD"),
        }
    }
}

/// Suppresses repeat alerts for a ticker until the cooldown has elapsed.
#[derive(Debug, Clone)]
pub struct AlertGate {
    cooldown: Duration,
    last_alert: HashMap<String, DateTime<Utc>>,
}

impl AlertGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_alert: HashMap::new(),
        }
    }

    pub fn can_alert(&self, ticker: &str, now: DateTime<Utc>) -> bool {
        match self.last_alert.get(ticker) {
            None => true,
            Some(last) => now - *last > self.cooldown,
        }
    }

    pub fn mark_alerted(&mut self, ticker: &str, now: DateTime<Utc>) {
        self.last_alert.insert(ticker.to_string(), now);
    }
}

/// Tickers with an open BUY alert. A SELL alert is only meaningful for
/// tickers in this set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveSignals {
    tickers: BTreeSet<String>,
}

impl ActiveSignals {
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tickers = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Self { tickers }
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.tickers.contains(ticker)
    }

    pub fn insert(&mut self, ticker: &str) {
        self.tickers.insert(ticker.to_string());
    }

    pub fn remove(&mut self, ticker: &str) -> bool {
        self.tickers.remove(ticker)
    }

    /// Sorted, one ticker per entry.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tickers.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}
