//! Fyers v3 REST adapter for NSE intraday orders.

use crate::domain::error::YenesisError;
use crate::ports::broker_port::OrderSide;
use crate::ports::config_port::ConfigPort;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api-t1.fyers.in";

const ORDER_TYPE_MARKET: u8 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FyersOrder {
    pub symbol: String,
    pub qty: u64,
    #[serde(rename = "type")]
    pub order_type: u8,
    /// 1 buy, -1 sell.
    pub side: i8,
    pub product_type: String,
    pub limit_price: f64,
    pub stop_price: f64,
    pub validity: String,
    pub disclosed_qty: u64,
    pub offline_order: bool,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl FyersOrder {
    pub fn market_intraday(symbol: &str, qty: u64, side: OrderSide) -> Self {
        Self {
            symbol: symbol.to_string(),
            qty,
            order_type: ORDER_TYPE_MARKET,
            side: match side {
                OrderSide::Buy => 1,
                OrderSide::Sell => -1,
            },
            product_type: "INTRADAY".to_string(),
            limit_price: 0.0,
            stop_price: 0.0,
            validity: "DAY".to_string(),
            disclosed_qty: 0,
            offline_order: false,
            stop_loss: 0.0,
            take_profit: 0.0,
        }
    }
}

/// Intraday position id for a symbol: "NSE:SBIN-EQ" -> "NSE:SBIN-EQ-INTRADAY".
pub fn intraday_position_id(symbol: &str) -> String {
    format!("{}-INTRADAY", symbol)
}

#[derive(Debug, Clone, Deserialize)]
pub struct FyersResponse {
    pub s: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub id: Option<String>,
}

impl FyersResponse {
    fn into_result(self) -> Result<Self, YenesisError> {
        if self.s.eq_ignore_ascii_case("ok") {
            Ok(self)
        } else {
            Err(YenesisError::broker(format!(
                "fyers error {}: {}",
                self.code, self.message
            )))
        }
    }
}

pub struct FyersAdapter {
    base_url: String,
    authorization: String,
    client: Client,
}

impl FyersAdapter {
    pub fn new(base_url: &str, client_id: &str, access_token: &str) -> Result<Self, YenesisError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| YenesisError::broker(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: format!("{}:{}", client_id, access_token),
            client,
        })
    }

    /// Built from `[fyers]`; credentials usually arrive through
    /// `YENESIS_FYERS_CLIENT_ID` and `YENESIS_FYERS_ACCESS_TOKEN`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, YenesisError> {
        let get = |key: &str| {
            config
                .get_string("fyers", key)
                .ok_or_else(|| YenesisError::ConfigMissing {
                    section: "fyers".into(),
                    key: key.into(),
                })
        };
        let base_url = config
            .get_string("fyers", "base_url")
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self::new(&base_url, &get("client_id")?, &get("access_token")?)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<FyersResponse, YenesisError> {
        request
            .header("Authorization", &self.authorization)
            .send()
            .map_err(|e| YenesisError::broker(e.to_string()))?
            .json::<FyersResponse>()
            .map_err(|e| YenesisError::broker(e.to_string()))?
            .into_result()
    }

    pub fn place_order(&self, order: &FyersOrder) -> Result<FyersResponse, YenesisError> {
        let url = format!("{}/api/v3/orders/sync", self.base_url);
        let response = self.send(self.client.post(&url).json(order))?;
        tracing::info!("Order response: {} {}", response.message, response.id.as_deref().unwrap_or("-"));
        Ok(response)
    }

    pub fn exit_position(&self, position_id: &str) -> Result<FyersResponse, YenesisError> {
        let url = format!("{}/api/v3/positions", self.base_url);
        let body: Value = json!({ "id": position_id });
        let response = self.send(self.client.delete(&url).json(&body))?;
        tracing::info!("Exit response for {}: {}", position_id, response.message);
        Ok(response)
    }
}
