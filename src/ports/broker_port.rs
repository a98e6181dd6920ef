//! Broker port: account, positions and order placement.

use crate::domain::error::YenesisError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub ticker: String,
    pub conid: Option<i64>,
    pub quantity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub order_id: String,
    pub ticker: String,
    /// Lower-cased broker order type, e.g. "stop", "market".
    pub order_type: String,
    pub side: String,
    pub stop_price: Option<f64>,
}

impl OpenOrder {
    pub fn is_stop_sell(&self) -> bool {
        self.order_type == "stop" && self.side.eq_ignore_ascii_case("SELL")
    }
}

pub trait BrokerPort {
    /// `true` when the gateway session is authenticated.
    fn auth_status(&self) -> Result<bool, YenesisError>;

    fn accounts(&self) -> Result<Vec<String>, YenesisError>;

    fn available_cash(&self, account: &str) -> Result<f64, YenesisError>;

    fn positions(&self, account: &str) -> Result<Vec<Position>, YenesisError>;

    /// Contract id for a stock symbol, `None` when the search finds nothing.
    fn conid(&self, symbol: &str) -> Result<Option<i64>, YenesisError>;

    /// Last traded price, `None` when no snapshot carries one.
    fn market_price(&self, conid: i64) -> Result<Option<f64>, YenesisError>;

    fn place_market_order(
        &self,
        account: &str,
        conid: i64,
        side: OrderSide,
        quantity: u64,
    ) -> Result<(), YenesisError>;

    fn place_stop_order(
        &self,
        account: &str,
        conid: i64,
        quantity: u64,
        stop_price: f64,
    ) -> Result<(), YenesisError>;

    fn cancel_order(&self, account: &str, order_id: &str) -> Result<(), YenesisError>;

    fn open_orders(&self) -> Result<Vec<OpenOrder>, YenesisError>;
}
