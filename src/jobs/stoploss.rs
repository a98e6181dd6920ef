//! Trailing stop sync for every held position.

use crate::domain::error::YenesisError;
use crate::domain::stoploss::{StopSyncReport, sync_stops};
use crate::jobs::notify;
use crate::jobs::orders::primary_account;
use crate::ports::broker_port::BrokerPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::notifier_port::{Notification, NotifierPort};

fn priced(items: &[(String, f64)]) -> String {
    if items.is_empty() {
        return "None".to_string();
    }
    items
        .iter()
        .map(|(t, p)| format!("{} @ {:.2}", t, p))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn report_body(report: &StopSyncReport) -> String {
    let failed = if report.failed.is_empty() {
        "None".to_string()
    } else {
        report.failed.join("\n")
    };
    format!(
        "New stops:\n{}\n\nUpdated stops:\n{}\n\nUnchanged: {}\n\nFailed (check manually):\n{}",
        priced(&report.placed),
        priced(&report.updated),
        report.unchanged.len(),
        failed
    )
}

pub fn run_stoploss(
    broker: &dyn BrokerPort,
    market_data: &dyn MarketDataPort,
    notifier: &dyn NotifierPort,
) -> Result<StopSyncReport, YenesisError> {
    let account = primary_account(broker)?;
    let positions: Vec<_> = broker
        .positions(&account)?
        .into_iter()
        .filter(|p| p.quantity != 0.0)
        .collect();
    if positions.is_empty() {
        tracing::info!("No open positions, nothing to protect");
        return Ok(StopSyncReport::default());
    }
    let open_orders = broker.open_orders()?;

    let report = sync_stops(broker, market_data, &account, &positions, &open_orders);
    tracing::info!(
        "Stops placed: {}, updated: {}, unchanged: {}, failed: {}",
        report.placed.len(),
        report.updated.len(),
        report.unchanged.len(),
        report.failed.len()
    );

    if !(report.placed.is_empty() && report.updated.is_empty() && report.failed.is_empty()) {
        notify(
            notifier,
            &Notification::new("[StratBot] Stop Loss Update", report_body(&report)),
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_lists_each_bucket() {
        let report = StopSyncReport {
            placed: vec![("AAPL".into(), 180.123)],
            updated: vec![],
            unchanged: vec!["MSFT".into()],
            failed: vec!["XYZ".into()],
        };
        let body = report_body(&report);
        assert!(body.contains("AAPL @ 180.12"));
        assert!(body.contains("Updated stops:\nNone"));
        assert!(body.contains("Unchanged: 1"));
        assert!(body.ends_with("XYZ"));
    }
}
