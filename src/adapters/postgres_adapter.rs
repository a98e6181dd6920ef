//! PostgreSQL storage adapter.

use crate::domain::error::YenesisError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::snapshot::IndicatorRow;
use crate::ports::config_port::ConfigPort;
use crate::ports::storage_port::{BATCH_SIZE, DbStats, HistoryRow, StoragePort, TickerInfo};
use chrono::{Duration, NaiveDate};
use postgres::{Config, NoTls};
use r2d2::{Pool, PooledConnection};
use r2d2_postgres::PostgresConnectionManager;

type Manager = PostgresConnectionManager<NoTls>;

pub struct PostgresAdapter {
    pool: Pool<Manager>,
}

fn query_err(e: postgres::Error) -> YenesisError {
    YenesisError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl PostgresAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, YenesisError> {
        let connection_string = config
            .get_string("postgres", "connection_string")
            .ok_or_else(|| YenesisError::ConfigMissing {
                section: "postgres".into(),
                key: "connection_string".into(),
            })?;
        let pool_size = config.get_int("postgres", "pool_size", 4).max(1) as u32;

        let pg_config: Config =
            connection_string
                .parse()
                .map_err(|e: postgres::Error| YenesisError::ConfigInvalid {
                    section: "postgres".into(),
                    key: "connection_string".into(),
                    reason: e.to_string(),
                })?;

        let pool = Pool::builder()
            .max_size(pool_size)
            .build(PostgresConnectionManager::new(pg_config, NoTls))
            .map_err(|e: r2d2::Error| YenesisError::Database {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<Manager>, YenesisError> {
        self.pool
            .get()
            .map_err(|e: r2d2::Error| YenesisError::Database {
                reason: e.to_string(),
            })
    }
}

impl StoragePort for PostgresAdapter {
    fn initialize_schema(&self) -> Result<(), YenesisError> {
        self.conn()?
            .batch_execute(
                "CREATE TABLE IF NOT EXISTS tickers (
                    id BIGSERIAL PRIMARY KEY,
                    symbol VARCHAR(20) NOT NULL UNIQUE,
                    name VARCHAR(255),
                    sector VARCHAR(100),
                    industry VARCHAR(100),
                    market_cap DOUBLE PRECISION,
                    last_updated TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE TABLE IF NOT EXISTS stock_prices (
                    id BIGSERIAL PRIMARY KEY,
                    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
                    date DATE NOT NULL,
                    open DOUBLE PRECISION NOT NULL,
                    high DOUBLE PRECISION NOT NULL,
                    low DOUBLE PRECISION NOT NULL,
                    close DOUBLE PRECISION NOT NULL,
                    adjusted_close DOUBLE PRECISION NOT NULL,
                    volume BIGINT NOT NULL,
                    UNIQUE (ticker_id, date)
                );
                CREATE TABLE IF NOT EXISTS technical_indicators (
                    id BIGSERIAL PRIMARY KEY,
                    ticker_id BIGINT NOT NULL REFERENCES tickers(id),
                    date DATE NOT NULL,
                    sma_20 DOUBLE PRECISION,
                    ema_50 DOUBLE PRECISION,
                    ema_200 DOUBLE PRECISION,
                    rsi_14 DOUBLE PRECISION,
                    macd DOUBLE PRECISION,
                    macd_signal DOUBLE PRECISION,
                    bb_upper DOUBLE PRECISION,
                    bb_lower DOUBLE PRECISION,
                    atr DOUBLE PRECISION,
                    UNIQUE (ticker_id, date)
                );
                CREATE INDEX IF NOT EXISTS idx_prices_date ON stock_prices(date);
                CREATE INDEX IF NOT EXISTS idx_indicators_date ON technical_indicators(date);",
            )
            .map_err(query_err)
    }

    fn upsert_ticker(&self, info: &TickerInfo) -> Result<i64, YenesisError> {
        let row = self
            .conn()?
            .query_one(
                "INSERT INTO tickers (symbol, name, sector, industry, market_cap, last_updated)
                 VALUES ($1, $2, $3, $4, $5, now())
                 ON CONFLICT (symbol) DO UPDATE SET
                    name = EXCLUDED.name,
                    sector = EXCLUDED.sector,
                    industry = EXCLUDED.industry,
                    market_cap = EXCLUDED.market_cap,
                    last_updated = now()
                 RETURNING id",
                &[&info.symbol, &info.name, &info.sector, &info.industry, &info.market_cap],
            )
            .map_err(query_err)?;
        Ok(row.get(0))
    }

    fn store_prices(&self, ticker_id: i64, bars: &[OhlcvBar]) -> Result<usize, YenesisError> {
        let mut conn = self.conn()?;
        let mut written = 0;

        for chunk in bars.chunks(BATCH_SIZE) {
            let mut tx = conn.transaction().map_err(query_err)?;
            for bar in chunk {
                written += tx
                    .execute(
                        "INSERT INTO stock_prices
                            (ticker_id, date, open, high, low, close, adjusted_close, volume)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                         ON CONFLICT (ticker_id, date) DO UPDATE SET
                            open = EXCLUDED.open,
                            high = EXCLUDED.high,
                            low = EXCLUDED.low,
                            close = EXCLUDED.close,
                            adjusted_close = EXCLUDED.adjusted_close,
                            volume = EXCLUDED.volume",
                        &[
                            &ticker_id,
                            &bar.date,
                            &bar.open,
                            &bar.high,
                            &bar.low,
                            &bar.close,
                            &bar.adjusted_close,
                            &bar.volume,
                        ],
                    )
                    .map_err(query_err)? as usize;
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
            let mut tx = conn.transaction().map_err(query_err)?;
            for row in chunk {
                written += tx
                    .execute(
                        "INSERT INTO technical_indicators
                            (ticker_id, date, sma_20, ema_50, ema_200, rsi_14, macd, macd_signal,
                             bb_upper, bb_lower, atr)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                         ON CONFLICT (ticker_id, date) DO UPDATE SET
                            sma_20 = EXCLUDED.sma_20,
                            ema_50 = EXCLUDED.ema_50,
                            ema_200 = EXCLUDED.ema_200,
                            rsi_14 = EXCLUDED.rsi_14,
                            macd = EXCLUDED.macd,
                            macd_signal = EXCLUDED.macd_signal,
                            bb_upper = EXCLUDED.bb_upper,
                            bb_lower = EXCLUDED.bb_lower,
                            atr = EXCLUDED.atr",
                        &[
                            &ticker_id,
                            &row.date,
                            &row.sma_20,
                            &row.ema_50,
                            &row.ema_200,
                            &row.rsi_14,
                            &row.macd,
                            &row.macd_signal,
                            &row.bb_upper,
                            &row.bb_lower,
                            &row.atr,
                        ],
                    )
                    .map_err(query_err)? as usize;
            }
            tx.commit().map_err(query_err)?;
        }

        Ok(written)
    }

    fn ticker_id(&self, symbol: &str) -> Result<Option<i64>, YenesisError> {
        let row = self
            .conn()?
            .query_opt("SELECT id FROM tickers WHERE symbol = $1", &[&symbol])
            .map_err(query_err)?;
        Ok(row.map(|r| r.get(0)))
    }

    fn fetch_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HistoryRow>, YenesisError> {
        let rows = self
            .conn()?
            .query(
                "SELECT p.date, p.open, p.high, p.low, p.close, p.adjusted_close, p.volume,
                        i.sma_20, i.ema_50, i.ema_200, i.rsi_14, i.macd, i.macd_signal,
                        i.bb_upper, i.bb_lower, i.atr
                 FROM stock_prices p
                 JOIN tickers t ON t.id = p.ticker_id
                 LEFT JOIN technical_indicators i
                    ON i.ticker_id = p.ticker_id AND i.date = p.date
                 WHERE t.symbol = $1 AND p.date BETWEEN $2 AND $3
                 ORDER BY p.date ASC",
                &[&symbol, &start, &end],
            )
            .map_err(query_err)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let date: NaiveDate = row.get(0);
                HistoryRow {
                    bar: OhlcvBar {
                        symbol: symbol.to_string(),
                        date,
                        open: row.get(1),
                        high: row.get(2),
                        low: row.get(3),
                        close: row.get(4),
                        adjusted_close: row.get(5),
                        volume: row.get(6),
                    },
                    indicators: IndicatorRow {
                        date,
                        sma_20: row.get(7),
                        ema_50: row.get(8),
                        ema_200: row.get(9),
                        rsi_14: row.get(10),
                        macd: row.get(11),
                        macd_signal: row.get(12),
                        bb_upper: row.get(13),
                        bb_lower: row.get(14),
                        atr: row.get(15),
                    },
                }
            })
            .collect())
    }

    fn stats(&self) -> Result<DbStats, YenesisError> {
        let mut conn = self.conn()?;
        let counts = conn
            .query_one(
                "SELECT (SELECT COUNT(*) FROM tickers),
                        (SELECT COUNT(*) FROM stock_prices),
                        (SELECT COUNT(*) FROM technical_indicators),
                        (SELECT MIN(date) FROM stock_prices),
                        (SELECT MAX(date) FROM stock_prices)",
                &[],
            )
            .map_err(query_err)?;

        let largest = conn
            .query(
                "SELECT symbol, COALESCE(name, symbol), COALESCE(market_cap, 0)
                 FROM tickers ORDER BY market_cap DESC NULLS LAST LIMIT 10",
                &[],
            )
            .map_err(query_err)?
            .into_iter()
            .map(|r| (r.get(0), r.get(1), r.get(2)))
            .collect();

        Ok(DbStats {
            tickers: counts.get(0),
            prices: counts.get(1),
            indicators: counts.get(2),
            first_date: counts.get(3),
            last_date: counts.get(4),
            largest,
        })
    }

    fn cleanup(&self, days_to_keep: u32, today: NaiveDate) -> Result<(usize, usize), YenesisError> {
        let cutoff = today - Duration::days(days_to_keep as i64);
        let mut conn = self.conn()?;
        let prices = conn
            .execute("DELETE FROM stock_prices WHERE date < $1", &[&cutoff])
            .map_err(query_err)?;
        let indicators = conn
            .execute("DELETE FROM technical_indicators WHERE date < $1", &[&cutoff])
            .map_err(query_err)?;
        tracing::info!(
            "Removed {} price rows and {} indicator rows older than {}",
            prices,
            indicators,
            cutoff
        );
        Ok((prices as usize, indicators as usize))
    }
}
