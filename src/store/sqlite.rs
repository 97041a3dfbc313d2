// src/store/sqlite.rs
//! SQLite backend (sqlx). Timestamps are stored as fixed-width RFC 3339
//! text in UTC so lexical order equals time order.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::info;

use super::{
    KeywordLedger, NewRawTrend, NewScoredTrend, ProcessedKeywordRecord, RawTrend, RawTrendStore,
    ScoredTrendStore, StoreResult, DEFAULT_STATUS,
};
use crate::error::StoreError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    pool: SqlitePool,
    /// Serializes ledger read-modify-write within this process.
    ledger_lock: Mutex<()>,
}

fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp {s:?}: {e}")))
}

impl SqliteStore {
    /// Open (creating if missing) the database file at `path`.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        let newly_created = !path.exists();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Backend(format!("creating {}: {e}", parent.display())))?;
            }
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        if newly_created {
            info!(target: "store", path = %path.display(), "initialized new database");
        } else {
            info!(target: "store", path = %path.display(), "opened existing database");
        }
        Self::init(pool).await
    }

    /// Connect by URL, e.g. `sqlite://data/trends.db?mode=rwc`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        Self::init(pool).await
    }

    /// Private in-memory database. One connection, since every
    /// `:memory:` connection is its own database.
    pub async fn in_memory() -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> StoreResult<Self> {
        create_processed_keywords_table(&pool).await?;
        create_raw_trends_table(&pool).await?;
        create_scored_trends_table(&pool).await?;
        Ok(Self {
            pool,
            ledger_lock: Mutex::new(()),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Scored rows for one raw trend, oldest first.
    pub async fn scored_for(&self, raw_trend_id: i64) -> StoreResult<Vec<super::ScoredTrend>> {
        let rows = sqlx::query(
            r#"
            SELECT id, raw_trend_id, topic, summary, niche_relevance, monetization_score,
                   urgency_score, competition_score, hebrew_gap, overall_score,
                   suggested_format, suggested_angle, affiliate_opportunities,
                   content_language, status, analyzed_at
            FROM scored_trends WHERE raw_trend_id = ? ORDER BY id
            "#,
        )
        .bind(raw_trend_id)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let fmt: String = r.try_get("suggested_format")?;
            let analyzed_at: String = r.try_get("analyzed_at")?;
            out.push(super::ScoredTrend {
                id: r.try_get("id")?,
                raw_trend_id: r.try_get("raw_trend_id")?,
                topic: r.try_get("topic")?,
                summary: r.try_get("summary")?,
                scores: crate::analyze::judgment::SubScores {
                    relevance: r.try_get("niche_relevance")?,
                    monetization: r.try_get("monetization_score")?,
                    urgency: r.try_get("urgency_score")?,
                    competition: r.try_get("competition_score")?,
                    content_gap: r.try_get("hebrew_gap")?,
                },
                overall_score: r.try_get("overall_score")?,
                suggested_format: crate::analyze::judgment::ContentFormat::parse_lenient(&fmt),
                suggested_angle: r.try_get("suggested_angle")?,
                affiliate_opportunities: r.try_get("affiliate_opportunities")?,
                content_language: r.try_get("content_language")?,
                status: r.try_get("status")?,
                analyzed_at: parse_ts(&analyzed_at)?,
            });
        }
        Ok(out)
    }
}

async fn create_processed_keywords_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS processed_keywords (
            keyword_hash TEXT PRIMARY KEY,
            keyword TEXT NOT NULL,
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            times_seen INTEGER NOT NULL DEFAULT 1
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_raw_trends_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS raw_trends (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            keyword TEXT NOT NULL,
            title TEXT,
            description TEXT,
            url TEXT,
            region TEXT NOT NULL DEFAULT 'IL',
            language TEXT NOT NULL DEFAULT 'he',
            popularity_score INTEGER NOT NULL DEFAULT 0,
            raw_data TEXT NOT NULL DEFAULT '{}',
            scraped_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_raw_trends_scraped_at ON raw_trends(scraped_at)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_scored_trends_table(pool: &SqlitePool) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scored_trends (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            raw_trend_id INTEGER NOT NULL REFERENCES raw_trends(id),
            topic TEXT NOT NULL,
            summary TEXT NOT NULL,
            niche_relevance INTEGER NOT NULL,
            monetization_score INTEGER NOT NULL,
            urgency_score INTEGER NOT NULL,
            competition_score INTEGER NOT NULL,
            hebrew_gap INTEGER NOT NULL,
            overall_score INTEGER NOT NULL,
            suggested_format TEXT NOT NULL,
            suggested_angle TEXT NOT NULL,
            affiliate_opportunities TEXT NOT NULL,
            content_language TEXT NOT NULL DEFAULT 'he',
            status TEXT NOT NULL DEFAULT 'new',
            analyzed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_scored_trends_raw_trend_id ON scored_trends(raw_trend_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[async_trait::async_trait]
impl KeywordLedger for SqliteStore {
    async fn record_sighting(
        &self,
        keyword_hash: &str,
        keyword: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let _guard = self.ledger_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let previous: Option<String> =
            sqlx::query_scalar("SELECT last_seen FROM processed_keywords WHERE keyword_hash = ?")
                .bind(keyword_hash)
                .fetch_optional(&mut *tx)
                .await?;

        let now_s = fmt_ts(now);
        sqlx::query(
            r#"
            INSERT INTO processed_keywords (keyword_hash, keyword, first_seen, last_seen, times_seen)
            VALUES (?, ?, ?, ?, 1)
            ON CONFLICT(keyword_hash) DO UPDATE SET
                last_seen = excluded.last_seen,
                times_seen = processed_keywords.times_seen + 1
            "#,
        )
        .bind(keyword_hash)
        .bind(keyword)
        .bind(&now_s)
        .bind(&now_s)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        previous.as_deref().map(parse_ts).transpose()
    }

    async fn revert_sighting(
        &self,
        keyword_hash: &str,
        previous: Option<DateTime<Utc>>,
    ) -> StoreResult<()> {
        let _guard = self.ledger_lock.lock().await;
        match previous {
            None => {
                sqlx::query("DELETE FROM processed_keywords WHERE keyword_hash = ?")
                    .bind(keyword_hash)
                    .execute(&self.pool)
                    .await?;
            }
            Some(prev) => {
                sqlx::query(
                    r#"
                    UPDATE processed_keywords
                    SET last_seen = ?, times_seen = MAX(times_seen - 1, 1)
                    WHERE keyword_hash = ?
                    "#,
                )
                .bind(fmt_ts(prev))
                .bind(keyword_hash)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    async fn get(&self, keyword_hash: &str) -> StoreResult<Option<ProcessedKeywordRecord>> {
        let row = sqlx::query(
            "SELECT keyword_hash, keyword, first_seen, last_seen, times_seen FROM processed_keywords WHERE keyword_hash = ?",
        )
        .bind(keyword_hash)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };
        let first_seen: String = r.try_get("first_seen")?;
        let last_seen: String = r.try_get("last_seen")?;
        Ok(Some(ProcessedKeywordRecord {
            keyword_hash: r.try_get("keyword_hash")?,
            keyword: r.try_get("keyword")?,
            first_seen: parse_ts(&first_seen)?,
            last_seen: parse_ts(&last_seen)?,
            times_seen: r.try_get("times_seen")?,
        }))
    }
}

#[async_trait::async_trait]
impl RawTrendStore for SqliteStore {
    async fn insert(&self, trend: NewRawTrend) -> StoreResult<i64> {
        let raw_data = serde_json::to_string(&trend.raw_data)?;
        let res = sqlx::query(
            r#"
            INSERT INTO raw_trends
                (source, keyword, title, description, url, region, language,
                 popularity_score, raw_data, scraped_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trend.source)
        .bind(&trend.keyword)
        .bind(&trend.title)
        .bind(&trend.description)
        .bind(&trend.url)
        .bind(&trend.region)
        .bind(&trend.language)
        .bind(trend.popularity_score)
        .bind(raw_data)
        .bind(fmt_ts(trend.scraped_at))
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn query_unscored(&self, limit: usize) -> StoreResult<Vec<RawTrend>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.source, r.keyword, r.title, r.description, r.url, r.region,
                   r.language, r.popularity_score, r.raw_data, r.scraped_at
            FROM raw_trends r
            LEFT JOIN scored_trends s ON s.raw_trend_id = r.id
            WHERE s.id IS NULL
            ORDER BY r.scraped_at DESC, r.id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let raw_data: String = r.try_get("raw_data")?;
            let scraped_at: String = r.try_get("scraped_at")?;
            out.push(RawTrend {
                id: r.try_get("id")?,
                source: r.try_get("source")?,
                keyword: r.try_get("keyword")?,
                title: r.try_get("title")?,
                description: r.try_get("description")?,
                url: r.try_get("url")?,
                region: r.try_get("region")?,
                language: r.try_get("language")?,
                popularity_score: r.try_get("popularity_score")?,
                raw_data: serde_json::from_str(&raw_data)?,
                scraped_at: parse_ts(&scraped_at)?,
            });
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ScoredTrendStore for SqliteStore {
    async fn insert(&self, trend: NewScoredTrend) -> StoreResult<i64> {
        let res = sqlx::query(
            r#"
            INSERT INTO scored_trends
                (raw_trend_id, topic, summary, niche_relevance, monetization_score,
                 urgency_score, competition_score, hebrew_gap, overall_score,
                 suggested_format, suggested_angle, affiliate_opportunities,
                 content_language, status, analyzed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(trend.raw_trend_id)
        .bind(&trend.topic)
        .bind(&trend.summary)
        .bind(trend.scores.relevance)
        .bind(trend.scores.monetization)
        .bind(trend.scores.urgency)
        .bind(trend.scores.competition)
        .bind(trend.scores.content_gap)
        .bind(trend.overall_score)
        .bind(trend.suggested_format.as_str())
        .bind(&trend.suggested_angle)
        .bind(&trend.affiliate_opportunities)
        .bind(&trend.content_language)
        .bind(DEFAULT_STATUS)
        .bind(fmt_ts(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }
}
