//! SQLite storage adapter.

use crate::domain::error::YenesisError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::snapshot::IndicatorRow;
use crate::ports::config_port::ConfigPort;
use crate::ports::storage_port::{BATCH_SIZE, DbStats, HistoryRow, StoragePort, TickerInfo};
use chrono::{Duration, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> YenesisError {
    YenesisError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(raw.len(), rusqlite::types::Type::Text, Box::new(e))
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, YenesisError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| YenesisError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool =
            Pool::builder()
                .max_size(pool_size)
                .build(manager)
                .map_err(|e: r2d2::Error| YenesisError::Database {
                    reason: e.to_string(),
                })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, YenesisError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| YenesisError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, YenesisError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| YenesisError::Database {
                reason: e.to_string(),
            })
    }

    fn count(&self, table: &str) -> Result<i64, YenesisError> {
        self.conn()?
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .map_err(query_err)
    }
}

impl StoragePort for SqliteAdapter {
    fn initialize_schema(&self) -> Result<(), YenesisError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS tickers (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    symbol TEXT NOT NULL UNIQUE,
                    name TEXT,
                    sector TEXT,
                    industry TEXT,
                    market_cap REAL,
                    last_updated TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS stock_prices (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ticker_id INTEGER NOT NULL REFERENCES tickers(id),
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    adjusted_close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    UNIQUE (ticker_id, date)
                );
                CREATE TABLE IF NOT EXISTS technical_indicators (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ticker_id INTEGER NOT NULL REFERENCES tickers(id),
                    date TEXT NOT NULL,
                    sma_20 REAL,
                    ema_50 REAL,
                    ema_200 REAL,
                    rsi_14 REAL,
                    macd REAL,
                    macd_signal REAL,
                    bb_upper REAL,
                    bb_lower REAL,
                    atr REAL,
                    UNIQUE (ticker_id, date)
                );
                CREATE INDEX IF NOT EXISTS idx_prices_date ON stock_prices(date);
                CREATE INDEX IF NOT EXISTS idx_indicators_date ON technical_indicators(date);",
            )
            .map_err(query_err)
    }

    fn upsert_ticker(&self, info: &TickerInfo) -> Result<i64, YenesisError> {
        let conn = self.conn()?;
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
        conn.execute(
            "INSERT INTO tickers (symbol, name, sector, industry, market_cap, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(symbol) DO UPDATE SET
                name = excluded.name,
                sector = excluded.sector,
                industry = excluded.industry,
                market_cap = excluded.market_cap,
                last_updated = excluded.last_updated",
            params![info.symbol, info.name, info.sector, info.industry, info.market_cap, now],
        )
        .map_err(query_err)?;

        conn.query_row(
            "SELECT id FROM tickers WHERE symbol = ?1",
            params![info.symbol],
            |row| row.get(0),
        )
        .map_err(query_err)
    }

    fn store_prices(&self, ticker_id: i64, bars: &[OhlcvBar]) -> Result<usize, YenesisError> {
        let mut conn = self.conn()?;
        let mut written = 0;

        for chunk in bars.chunks(BATCH_SIZE) {
            let tx = conn.transaction().map_err(query_err)?;
            for bar in chunk {
                written += tx
                    .execute(
                        "INSERT INTO stock_prices
                            (ticker_id, date, open, high, low, close, adjusted_close, volume)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                         ON CONFLICT(ticker_id, date) DO UPDATE SET
                            open = excluded.open,
                            high = excluded.high,
                            low = excluded.low,
                            close = excluded.close,
                            adjusted_close = excluded.adjusted_close,
                            volume = excluded.volume",
                        params![
                            ticker_id,
                            bar.date.format(DATE_FORMAT).to_string(),
                            bar.open,
                            bar.high,
                            bar.low,
                            bar.close,
                            bar.adjusted_close,
                            bar.volume
                        ],
                    )
                    .map_err(query_err)?;
            }
            tx.commit().map_err(query_err)?;
        }

        Ok(written)
    }

    fn store_indicators(
        &self,
        ticker_id: i64,
        rows: &[IndicatorRow],
    ) -> Result<usize, YenesisError> {
        let storable: Vec<&IndicatorRow> = rows.iter().filter(|r| r.is_storable()).collect();
        let mut conn = self.conn()?;
        let mut written = 0;

        for chunk in storable.chunks(BATCH_SIZE) {
            let tx = conn.transaction().map_err(query_err)?;
            for row in chunk {
                written += tx
                    .execute(
                        "INSERT INTO technical_indicators
                            (ticker_id, date, sma_20, ema_50, ema_200, rsi_14, macd, macd_signal,
                             bb_upper, bb_lower, atr)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                         ON CONFLICT(ticker_id, date) DO UPDATE SET
                            sma_20 = excluded.sma_20,
                            ema_50 = excluded.ema_50,
                            ema_200 = excluded.ema_200,
                            rsi_14 = excluded.rsi_14,
                            macd = excluded.macd,
                            macd_signal = excluded.macd_signal,
                            bb_upper = excluded.bb_upper,
                            bb_lower = excluded.bb_lower,
                            atr = excluded.atr",
                        params![
                            ticker_id,
                            row.date.format(DATE_FORMAT).to_string(),
                            row.sma_20,
                            row.ema_50,
                            row.ema_200,
                            row.rsi_14,
                            row.macd,
                            row.macd_signal,
                            row.bb_upper,
                            row.bb_lower,
                            row.atr
                        ],
                    )
                    .map_err(query_err)?;
            }
            tx.commit().map_err(query_err)?;
        }

        Ok(written)
    }

    fn ticker_id(&self, symbol: &str) -> Result<Option<i64>, YenesisError> {
        self.conn()?
            .query_row(
                "SELECT id FROM tickers WHERE symbol = ?1",
                params![symbol],
                |row| row.get(0),
            )
            .optional()
            .map_err(query_err)
    }

    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoryRow>, YenesisError> {
        let conn = self.conn()?;

        let query = "SELECT p.date, p.open, p.high, p.low, p.close, p.adjusted_close, p.volume,
                            i.sma_20, i.ema_50, i.ema_200, i.rsi_14, i.macd, i.macd_signal,
                            i.bb_upper, i.bb_lower, i.atr
                     FROM stock_prices p
                     JOIN tickers t ON t.id = p.ticker_id
                     LEFT JOIN technical_indicators i
                        ON i.ticker_id = p.ticker_id AND i.date = p.date
                     WHERE t.symbol = ?1 AND p.date >= ?2 AND p.date <= ?3
                     ORDER BY p.date ASC";

        let mut stmt = conn.prepare(query).map_err(query_err)?;
        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start.format(DATE_FORMAT).to_string(),
                    end.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let date_str: String = row.get(0)?;
                    let date = parse_date(&date_str)?;
                    Ok(HistoryRow {
                        bar: OhlcvBar {
                            symbol: symbol.to_string(),
                            date,
                            open: row.get(1)?,
                            high: row.get(2)?,
                            low: row.get(3)?,
                            close: row.get(4)?,
                            adjusted_close: row.get(5)?,
                            volume: row.get(6)?,
                        },
                        indicators: IndicatorRow {
                            date,
                            sma_20: row.get(7)?,
                            ema_50: row.get(8)?,
                            ema_200: row.get(9)?,
                            rsi_14: row.get(10)?,
                            macd: row.get(11)?,
                            macd_signal: row.get(12)?,
                            bb_upper: row.get(13)?,
                            bb_lower: row.get(14)?,
                            atr: row.get(15)?,
                        },
                    })
                },
            )
            .map_err(query_err)?;

        let mut history = Vec::new();
        for row in rows {
            history.push(row.map_err(query_err)?);
        }
        Ok(history)
    }

    fn stats(&self) -> Result<DbStats, YenesisError> {
        let conn = self.conn()?;

        let (first, last): (Option<String>, Option<String>) = conn
            .query_row("SELECT MIN(date), MAX(date) FROM stock_prices", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .map_err(query_err)?;

        let mut stmt = conn
            .prepare(
                "SELECT symbol, COALESCE(name, symbol), COALESCE(market_cap, 0)
                 FROM tickers ORDER BY market_cap DESC LIMIT 10",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(query_err)?;
        let mut largest = Vec::new();
        for row in rows {
            largest.push(row.map_err(query_err)?);
        }

        Ok(DbStats {
            tickers: self.count("tickers")?,
            prices: self.count("stock_prices")?,
            indicators: self.count("technical_indicators")?,
            first_date: first.as_deref().map(parse_date).transpose().map_err(query_err)?,
            last_date: last.as_deref().map(parse_date).transpose().map_err(query_err)?,
            largest,
        })
    }

    fn cleanup(&self, days_to_keep: u32, today: NaiveDate) -> Result<(usize, usize), YenesisError> {
        let cutoff = (today - Duration::days(days_to_keep as i64))
            .format(DATE_FORMAT)
            .to_string();
        let conn = self.conn()?;
        let prices = conn
            .execute("DELETE FROM stock_prices WHERE date < ?1", params![cutoff])
            .map_err(query_err)?;
        let indicators = conn
            .execute("DELETE FROM technical_indicators WHERE date < ?1", params![cutoff])
            .map_err(query_err)?;
        tracing::info!(
            "Removed {} price rows and {} indicator rows older than {}",
            prices,
            indicators,
            cutoff
        );
        Ok((prices, indicators))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn bar(day: u32, close: f64) -> OhlcvBar {
        OhlcvBar {
            symbol: "AAPL".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            adjusted_close: close,
            volume: 1000,
        }
    }

    fn adapter() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        let result = SqliteAdapter::from_config(&FileConfigAdapter::empty());
        match result {
            Err(YenesisError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let adapter = adapter();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn upsert_ticker_keeps_id() {
        let adapter = adapter();
        let id = adapter.upsert_ticker(&TickerInfo::symbol_only("AAPL")).unwrap();
        let again = adapter
            .upsert_ticker(&TickerInfo {
                name: "Apple Inc.".into(),
                market_cap: 3e12,
                ..TickerInfo::symbol_only("AAPL")
            })
            .unwrap();
        assert_eq!(id, again);
        assert_eq!(adapter.ticker_id("AAPL").unwrap(), Some(id));
        assert_eq!(adapter.ticker_id("MSFT").unwrap(), None);

        let stats = adapter.stats().unwrap();
        assert_eq!(stats.tickers, 1);
        assert_eq!(stats.largest[0].1, "Apple Inc.");
    }

    #[test]
    fn prices_upsert_and_join_indicators() {
        let adapter = adapter();
        let id = adapter.upsert_ticker(&TickerInfo::symbol_only("AAPL")).unwrap();
        adapter.store_prices(id, &[bar(1, 100.0), bar(2, 101.0)]).unwrap();
        adapter.store_prices(id, &[bar(2, 105.0)]).unwrap();

        let mut row = IndicatorRow::blank(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        row.sma_20 = Some(99.0);
        let skipped = IndicatorRow::blank(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(adapter.store_indicators(id, &[skipped, row]).unwrap(), 1);

        let history = adapter
            .fetch_history(
                "AAPL",
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            )
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].bar.close, 105.0);
        assert_eq!(history[0].indicators.sma_20, None);
        assert_eq!(history[1].indicators.sma_20, Some(99.0));

        let stats = adapter.stats().unwrap();
        assert_eq!(stats.prices, 2);
        assert_eq!(stats.indicators, 1);
        assert_eq!(stats.first_date, NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn many_rows_span_batches() {
        let adapter = adapter();
        let id = adapter.upsert_ticker(&TickerInfo::symbol_only("AAPL")).unwrap();
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let bars: Vec<OhlcvBar> = (0..250)
            .map(|i| OhlcvBar {
                date: start + Duration::days(i),
                ..bar(1, 100.0)
            })
            .collect();
        assert_eq!(adapter.store_prices(id, &bars).unwrap(), 250);
        assert_eq!(adapter.stats().unwrap().prices, 250);
    }

    #[test]
    fn cleanup_removes_old_rows() {
        let adapter = adapter();
        let id = adapter.upsert_ticker(&TickerInfo::symbol_only("AAPL")).unwrap();
        adapter.store_prices(id, &[bar(1, 100.0), bar(20, 101.0)]).unwrap();
        let (prices, indicators) = adapter
            .cleanup(15, NaiveDate::from_ymd_opt(2024, 1, 25).unwrap())
            .unwrap();
        assert_eq!((prices, indicators), (1, 0));
        assert_eq!(adapter.stats().unwrap().prices, 1);
    }
}
