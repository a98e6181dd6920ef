//! Interactive Brokers Client Portal web gateway adapter for [`BrokerPort`].
//!
//! The gateway may listen on several local ports; every request walks the
//! configured base URLs in order and returns the first success.

use crate::domain::error::YenesisError;
use crate::ports::broker_port::{BrokerPort, OpenOrder, OrderSide, Position};
use crate::ports::config_port::ConfigPort;
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{Value, json};
use std::thread;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://localhost:5001/v1/api";
/// Snapshot field id for the last traded price.
const LAST_PRICE_FIELD: &str = "31";

/// Call `op` with each base URL joined to `path` until one succeeds.
pub fn try_base_urls<T, F>(base_urls: &[String], path: &str, mut op: F) -> Result<T, YenesisError>
where
    F: FnMut(&str) -> Result<T, String>,
{
    for base in base_urls {
        let url = format!("{}{}", base.trim_end_matches('/'), path);
        match op(&url) {
            Ok(value) => return Ok(value),
            Err(e) => tracing::warn!("Failed request to {}: {}", url, e),
        }
    }
    tracing::error!("All base URLs failed for path: {}", path);
    Err(YenesisError::broker(format!("all base URLs failed for {}", path)))
}

/// "AAPL NASDAQ.NMS" -> "AAPL".
pub fn extract_ticker(contract_desc: &str) -> String {
    contract_desc
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Numbers or numeric strings. Snapshot prices may carry a one-letter
/// prefix such as "C" for a prior close.
fn lenient_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s
            .trim()
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .replace(',', "")
            .parse()
            .ok(),
        _ => None,
    }
}

fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_accounts(body: &Value) -> Vec<String> {
    body.as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|a| a.get("accountId").or_else(|| a.get("id")))
                .filter_map(lenient_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_cash(body: &Value) -> f64 {
    body.get("USD")
        .and_then(|usd| usd.get("cashbalance"))
        .and_then(lenient_f64)
        .unwrap_or(0.0)
}

/// Anything but a list is treated as no positions.
pub fn parse_positions(body: &Value) -> Vec<Position> {
    let Some(items) = body.as_array() else {
        tracing::warn!("Unexpected positions response (not a list): {}", body);
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|p| {
            let desc = p.get("contractDesc")?.as_str()?;
            let ticker = extract_ticker(desc);
            if ticker.is_empty() {
                return None;
            }
            Some(Position {
                ticker,
                conid: p.get("conid").and_then(lenient_i64),
                quantity: p.get("position").and_then(lenient_f64).unwrap_or(0.0),
            })
        })
        .collect()
}

pub fn parse_conid(body: &Value) -> Option<i64> {
    body.as_array()?.first()?.get("conid").and_then(lenient_i64)
}

pub fn parse_snapshot_price(body: &Value) -> Option<f64> {
    body.as_array()?.first()?.get(LAST_PRICE_FIELD).and_then(lenient_f64)
}

pub fn parse_open_orders(body: &Value) -> Vec<OpenOrder> {
    let Some(orders) = body.get("orders").and_then(Value::as_array) else {
        return Vec::new();
    };
    orders
        .iter()
        .filter_map(|o| {
            let ticker = o
                .get("ticker")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| {
                    o.get("description")
                        .and_then(Value::as_str)
                        .map(extract_ticker)
                })?;
            Some(OpenOrder {
                order_id: o.get("orderId").and_then(lenient_string).unwrap_or_default(),
                ticker,
                order_type: o
                    .get("orderType")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_lowercase(),
                side: o
                    .get("side")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_uppercase(),
                stop_price: o
                    .get("stop_price")
                    .or_else(|| o.get("auxPrice"))
                    .and_then(lenient_f64),
            })
        })
        .collect()
}

/// Reply ids under `key` in an order response that need confirming.
pub fn reply_ids(body: &Value, key: &str) -> Vec<String> {
    body.as_array()
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m.get(key))
                .filter_map(lenient_string)
                .collect()
        })
        .unwrap_or_default()
}

pub fn market_order_payload(account: &str, conid: i64, side: OrderSide, quantity: u64) -> Value {
    json!({
        "orders": [{
            "acctId": account,
            "conid": conid,
            "orderType": "MKT",
            "side": side.as_str(),
            "quantity": quantity,
            "tif": "DAY",
            "secType": "STK",
            "outsideRth": false,
        }]
    })
}

pub fn stop_order_payload(account: &str, conid: i64, quantity: u64, stop_price: f64) -> Value {
    json!({
        "orders": [{
            "acctId": account,
            "conid": conid,
            "orderType": "STP",
            "side": "SELL",
            "quantity": quantity,
            "price": (stop_price * 100.0).round() / 100.0,
            "tif": "GTC",
            "secType": "STK",
            "outsideRth": false,
        }]
    })
}

pub struct IbkrAdapter {
    base_urls: Vec<String>,
    client: Client,
    price_retries: u32,
    price_retry_delay: Duration,
}

impl IbkrAdapter {
    pub fn new(base_urls: Vec<String>, accept_invalid_certs: bool) -> Result<Self, YenesisError> {
        if base_urls.is_empty() {
            return Err(YenesisError::ConfigInvalid {
                section: "ibkr".into(),
                key: "base_urls".into(),
                reason: "at least one base URL is required".into(),
            });
        }
        let client = Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| YenesisError::broker(e.to_string()))?;
        Ok(Self {
            base_urls,
            client,
            price_retries: 3,
            price_retry_delay: Duration::from_secs(1),
        })
    }

    pub fn with_price_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.price_retries = retries.max(1);
        self.price_retry_delay = delay;
        self
    }

    /// Built from `[ibkr]`.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, YenesisError> {
        let mut base_urls = config.get_list("ibkr", "base_urls");
        if base_urls.is_empty() {
            base_urls.push(DEFAULT_BASE_URL.to_string());
        }
        let accept_invalid = config.get_bool("ibkr", "accept_invalid_certs", true);
        let retries = config.get_int("ibkr", "price_retries", 3).max(1) as u32;
        let delay = Duration::from_millis(config.get_int("ibkr", "price_retry_delay_ms", 1000).max(0) as u64);
        Ok(Self::new(base_urls, accept_invalid)?.with_price_retries(retries, delay))
    }

    fn call<F>(&self, method: Method, path: &str, build: F) -> Result<Value, YenesisError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        try_base_urls(&self.base_urls, path, |url| {
            tracing::debug!("{} {}", method, url);
            let response = build(self.client.request(method.clone(), url))
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(|e| e.to_string())?;
            let text = response.text().map_err(|e| e.to_string())?;
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| e.to_string())
        })
    }

    fn get(&self, path: &str) -> Result<Value, YenesisError> {
        self.call(Method::GET, path, |r| r)
    }

    fn confirm_reply(&self, reply_id: &str) -> Result<Value, YenesisError> {
        let body = self.call(Method::POST, &format!("/iserver/reply/{}", reply_id), |r| {
            r.json(&json!({ "confirmed": true }))
        })?;
        tracing::info!("Order reply confirmed: {}", body);
        Ok(body)
    }

    fn submit(&self, account: &str, payload: &Value) -> Result<Value, YenesisError> {
        self.call(Method::POST, &format!("/iserver/account/{}/orders", account), |r| {
            r.json(payload)
        })
    }
}

impl BrokerPort for IbkrAdapter {
    fn auth_status(&self) -> Result<bool, YenesisError> {
        let body = self.get("/iserver/auth/status")?;
        let authenticated = body
            .get("authenticated")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        tracing::info!("IBKR Web API Auth Status: {}", authenticated);
        Ok(authenticated)
    }

    fn accounts(&self) -> Result<Vec<String>, YenesisError> {
        Ok(parse_accounts(&self.get("/portfolio/accounts")?))
    }

    fn available_cash(&self, account: &str) -> Result<f64, YenesisError> {
        Ok(parse_cash(&self.get(&format!("/portfolio/{}/ledger", account))?))
    }

    fn positions(&self, account: &str) -> Result<Vec<Position>, YenesisError> {
        Ok(parse_positions(&self.get(&format!("/portfolio/{}/positions", account))?))
    }

    fn conid(&self, symbol: &str) -> Result<Option<i64>, YenesisError> {
        let body = self.call(Method::GET, "/iserver/secdef/search", |r| {
            r.query(&[("symbol", symbol), ("secType", "STK")])
        })?;
        let conid = parse_conid(&body);
        if conid.is_none() {
            tracing::warn!("No conid found for {}", symbol);
        }
        Ok(conid)
    }

    fn market_price(&self, conid: i64) -> Result<Option<f64>, YenesisError> {
        let conids = conid.to_string();
        for attempt in 1..=self.price_retries {
            // The first snapshot for a contract often comes back without fields.
            let body = self.call(Method::GET, "/iserver/marketdata/snapshot", |r| {
                r.query(&[("conids", conids.as_str()), ("fields", LAST_PRICE_FIELD)])
            });
            match body.map(|b| parse_snapshot_price(&b)) {
                Ok(Some(price)) => return Ok(Some(price)),
                Ok(None) => tracing::warn!("Attempt {}: No price for conid {}", attempt, conid),
                Err(e) => tracing::warn!("Attempt {}: snapshot for conid {} failed: {}", attempt, conid, e),
            }
            thread::sleep(self.price_retry_delay);
        }
        tracing::error!("Failed to fetch market price for conid {}", conid);
        Ok(None)
    }

    fn place_market_order(
        &self,
        account: &str,
        conid: i64,
        side: OrderSide,
        quantity: u64,
    ) -> Result<(), YenesisError> {
        let response = self.submit(account, &market_order_payload(account, conid, side, quantity))?;
        tracing::info!("{} order placed: {}", side, response);
        for id in reply_ids(&response, "id") {
            self.confirm_reply(&id)?;
        }
        Ok(())
    }

    fn place_stop_order(
        &self,
        account: &str,
        conid: i64,
        quantity: u64,
        stop_price: f64,
    ) -> Result<(), YenesisError> {
        let response = self.submit(account, &stop_order_payload(account, conid, quantity, stop_price))?;
        tracing::info!("Initial order response: {}", response);
        if let Some(reply) = reply_ids(&response, "replyid").first() {
            let confirmed = self.confirm_reply(reply)?;
            let order_id = confirmed
                .get("order_id")
                .or_else(|| confirmed.get("id"))
                .and_then(lenient_string);
            tracing::info!("Stop loss order confirmed (ID: {:?})", order_id);
        }
        Ok(())
    }

    fn cancel_order(&self, account: &str, order_id: &str) -> Result<(), YenesisError> {
        self.call(
            Method::DELETE,
            &format!("/iserver/account/{}/order/{}", account, order_id),
            |r| r,
        )?;
        tracing::info!("Order {} cancelled successfully", order_id);
        Ok(())
    }

    fn open_orders(&self) -> Result<Vec<OpenOrder>, YenesisError> {
        Ok(parse_open_orders(&self.get("/iserver/account/orders")?))
    }
}
