//! Momentum rebalance against the IBKR account.

use crate::adapters::csv_adapter;
use crate::domain::error::YenesisError;
use crate::domain::rebalance::{Rebalancer, TradeAction, TradeSummary, WorkingOrders};
use crate::jobs::notify;
use crate::ports::broker_port::BrokerPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::notifier_port::{Notification, NotifierPort};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSettings {
    pub top_n: usize,
    pub cash_reserve: f64,
}

impl OrderSettings {
    pub fn load(config: &dyn ConfigPort) -> Self {
        use crate::domain::rebalance::{DEFAULT_CASH_RESERVE, DEFAULT_TOP_N};
        Self {
            top_n: config.get_int("ibkr", "top_n", DEFAULT_TOP_N as i64).max(1) as usize,
            cash_reserve: config.get_double("ibkr", "cash_reserve", DEFAULT_CASH_RESERVE),
        }
    }
}

/// Authenticated session and its first account.
pub fn primary_account(broker: &dyn BrokerPort) -> Result<String, YenesisError> {
    if !broker.auth_status()? {
        return Err(YenesisError::broker(
            "gateway session is not authenticated; log in to the Client Portal first",
        ));
    }
    broker
        .accounts()?
        .into_iter()
        .next()
        .ok_or_else(|| YenesisError::broker("no accounts returned by the gateway"))
}

/// Read the top-N from the momentum report, rebalance and send the summary.
pub fn run_orders(
    broker: &dyn BrokerPort,
    notifier: &dyn NotifierPort,
    report: &Path,
    settings: OrderSettings,
    action: TradeAction,
    dry_run: bool,
) -> Result<TradeSummary, YenesisError> {
    let top = csv_adapter::top_momentum_tickers(report, settings.top_n)?;
    if top.is_empty() {
        return Err(YenesisError::NoData {
            symbol: format!("momentum report {}", report.display()),
        });
    }
    tracing::info!("Top {} momentum tickers: {}", top.len(), top.join(", "));

    let account = primary_account(broker)?;
    let positions = broker.positions(&account)?;
    let working = WorkingOrders::from_orders(&broker.open_orders()?);
    if !working.blocking.is_empty() {
        tracing::info!("Tickers with open orders: {:?}", working.blocking);
    }

    let summary = Rebalancer::new(broker, &account, settings.cash_reserve, dry_run).run(
        action,
        &top,
        &positions,
        &working,
    );

    let notification = Notification::new(summary.subject(), summary.email_body())
        .with_chat_text(summary.telegram_body());
    notify(notifier, &notification);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[test]
    fn order_settings_defaults() {
        let s = OrderSettings::load(&FileConfigAdapter::empty());
        assert_eq!(s.top_n, 20);
        assert_eq!(s.cash_reserve, 10.0);
    }
}
