//! Fundamental value screener: scoring and the optional hard filter.

use crate::ports::market_data_port::TickerProfile;

pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct ValuePick {
    pub ticker: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub pe: f64,
    pub forward_pe: f64,
    pub pb: f64,
    pub roe: f64,
    pub roa: f64,
    pub gross_margin: f64,
    pub profit_margin: f64,
    pub current_ratio: f64,
    pub debt_to_equity: f64,
    pub eps_growth: f64,
    pub revenue_growth: f64,
    pub free_cash_flow: f64,
    pub dividend_yield: f64,
    pub insider_holding: f64,
    pub score: f64,
}

fn or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(default)
}

/// Strict quality gate. Missing values fall back to failing defaults.
pub fn passes_hard_filter(p: &TickerProfile) -> bool {
    let trailing_pe = or(p.trailing_pe, 1000.0);
    let forward_pe = or(p.forward_pe, 1000.0);

    trailing_pe > 0.0
        && trailing_pe < 30.0
        && forward_pe < 30.0
        && or(p.price_to_book, 1000.0) < 5.0
        && or(p.return_on_equity, 0.0) > 0.1
        && or(p.return_on_assets, 0.0) > 0.03
        && or(p.gross_margins, 0.0) > 0.2
        && or(p.profit_margins, 0.0) > 0.05
        && or(p.current_ratio, 0.0) > 0.8
        && or(p.debt_to_equity, 10.0) < 2.0
        && or(p.earnings_growth, -1.0) > 0.0
        && or(p.revenue_growth, -1.0) > 0.0
        && or(p.free_cashflow, -1.0) > 0.0
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Treats zero like missing, so an unreported P/E is scored as expensive.
fn nonzero_or(value: f64, default: f64) -> f64 {
    if value == 0.0 { default } else { value }
}

/// Weighted 0..1 quality-and-value score.
pub fn score(pick: &ValuePick) -> f64 {
    let pe = nonzero_or(pick.pe, 1000.0);
    let pb = nonzero_or(pick.pb, 1000.0);
    let de = nonzero_or(pick.debt_to_equity, 10.0);

    clamp01((pick.roe - 0.1) / 0.4) * 0.2
        + clamp01((30.0 - pe) / 30.0) * 0.15
        + clamp01((5.0 - pb) / 5.0) * 0.1
        + clamp01(pick.profit_margin / 0.3) * 0.1
        + clamp01((2.0 - de) / 2.0) * 0.1
        + clamp01(pick.eps_growth / 0.3) * 0.15
        + clamp01(pick.revenue_growth / 0.25) * 0.1
        + clamp01(pick.insider_holding / 0.15) * 0.1
}

/// Build a scored pick. `None` when the profile has no ROE.
pub fn evaluate(profile: &TickerProfile) -> Option<ValuePick> {
    let roe = profile.return_on_equity?;
    let mut pick = ValuePick {
        ticker: profile.symbol.clone(),
        name: profile.name.clone(),
        description: profile.summary.clone(),
        pe: or(profile.trailing_pe, 0.0),
        forward_pe: or(profile.forward_pe, 0.0),
        pb: or(profile.price_to_book, 0.0),
        roe,
        roa: or(profile.return_on_assets, 0.0),
        gross_margin: or(profile.gross_margins, 0.0),
        profit_margin: or(profile.profit_margins, 0.0),
        current_ratio: or(profile.current_ratio, 0.0),
        debt_to_equity: or(profile.debt_to_equity, 0.0),
        eps_growth: or(profile.earnings_growth, 0.0),
        revenue_growth: or(profile.revenue_growth, 0.0),
        free_cash_flow: or(profile.free_cashflow, 0.0),
        dividend_yield: or(profile.dividend_yield, 0.0),
        insider_holding: or(profile.held_percent_insiders, 0.0),
        score: 0.0,
    };
    pick.score = score(&pick);
    Some(pick)
}

/// Best scores first, truncated to `top_n`.
pub fn top_picks(mut picks: Vec<ValuePick>, top_n: usize) -> Vec<ValuePick> {
    picks.sort_by(|a, b| b.score.total_cmp(&a.score));
    picks.truncate(top_n);
    picks
}
