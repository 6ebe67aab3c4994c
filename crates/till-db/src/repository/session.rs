//! # Session Repository
//!
//! SQLite-backed [`SessionStore`]. The partial unique index
//! `idx_sessions_one_open` keeps at most one OPEN row per user, so a racing
//! second `open` from another process fails with `UniqueViolation`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{decode_ts, encode_ts};
use crate::error::{DbError, DbResult};
use crate::store::SessionStore;
use till_core::{CashSession, Money, SessionStatus};

const SELECT_SESSION: &str = r#"
    SELECT id, user, opened_at, closed_at, opening_float, closing_amount, status
    FROM cash_sessions
"#;

#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SessionRepository { pool }
    }

    fn from_row(row: &SqliteRow) -> DbResult<CashSession> {
        let opened_at: String = row.try_get("opened_at")?;
        let closed_at: Option<String> = row.try_get("closed_at")?;
        let closing_amount: Option<i64> = row.try_get("closing_amount")?;

        Ok(CashSession {
            id: row.try_get("id")?,
            user: row.try_get("user")?,
            opened_at: decode_ts("cash_sessions.opened_at", &opened_at)?,
            closed_at: closed_at
                .map(|raw| decode_ts("cash_sessions.closed_at", &raw))
                .transpose()?,
            opening_float: Money::from_units(row.try_get("opening_float")?),
            closing_amount: closing_amount.map(Money::from_units),
            status: row.try_get("status")?,
        })
    }

    async fn get(&self, id: &str) -> DbResult<Option<CashSession>> {
        let row = sqlx::query(&format!("{SELECT_SESSION} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::from_row).transpose()
    }
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn open_for(&self, user: &str) -> DbResult<Option<CashSession>> {
        let row = sqlx::query(&format!(
            "{SELECT_SESSION} WHERE user = ?1 AND status = 'OPEN'"
        ))
        .bind(user)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn insert(&self, session: &CashSession) -> DbResult<()> {
        debug!(session_id = %session.id, user = %session.user, "Inserting cash session");

        sqlx::query(
            r#"
            INSERT INTO cash_sessions (
                id, user, opened_at, closed_at, opening_float, closing_amount, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user)
        .bind(encode_ts(&session.opened_at))
        .bind(session.closed_at.as_ref().map(encode_ts))
        .bind(session.opening_float.units())
        .bind(session.closing_amount.map(|m| m.units()))
        .bind(session.status)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: session.user.clone(),
            },
            other => other,
        })?;

        Ok(())
    }

    async fn close(
        &self,
        id: &str,
        closed_at: DateTime<Utc>,
        closing_amount: Money,
    ) -> DbResult<CashSession> {
        debug!(session_id = %id, "Closing cash session");

        let result = sqlx::query(
            r#"
            UPDATE cash_sessions
            SET status = 'CLOSED', closed_at = ?2, closing_amount = ?3
            WHERE id = ?1 AND status = 'OPEN'
            "#,
        )
        .bind(id)
        .bind(encode_ts(&closed_at))
        .bind(closing_amount.units())
        .execute(&self.pool)
        .await?;

        let stored = self.get(id).await?;

        match (result.rows_affected(), stored) {
            (0, None) => Err(DbError::not_found("CashSession", id)),
            (0, Some(_)) => Err(DbError::conflict("CashSession", id)),
            (_, Some(session)) if session.status == SessionStatus::Closed => Ok(session),
            (_, _) => Err(DbError::conflict("CashSession", id)),
        }
    }

    async fn history(&self, user: &str, limit: u32) -> DbResult<Vec<CashSession>> {
        let rows = sqlx::query(&format!(
            "{SELECT_SESSION} WHERE user = ?1 ORDER BY opened_at DESC LIMIT ?2"
        ))
        .bind(user)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::memory_db;
    use chrono::{Duration, TimeZone};

    fn session(id: &str, user: &str, opened_at: DateTime<Utc>) -> CashSession {
        CashSession {
            id: id.to_string(),
            user: user.to_string(),
            opened_at,
            closed_at: None,
            opening_float: Money::from_units(20000),
            closing_amount: None,
            status: SessionStatus::Open,
        }
    }

    #[tokio::test]
    async fn test_open_close_lifecycle() {
        let db = memory_db().await;
        let repo = db.sessions();
        let eight = Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap();

        repo.insert(&session("cs-1", "ana", eight)).await.unwrap();
        let open = repo.open_for("ana").await.unwrap().unwrap();
        assert_eq!(open.id, "cs-1");
        assert!(open.is_open());

        let second = repo.insert(&session("cs-2", "ana", eight)).await.unwrap_err();
        assert!(matches!(second, DbError::UniqueViolation { ref value, .. } if value == "ana"));

        let closed = repo
            .close("cs-1", eight + Duration::hours(9), Money::from_units(45000))
            .await
            .unwrap();
        assert_eq!(closed.status, SessionStatus::Closed);
        assert_eq!(closed.closing_amount, Some(Money::from_units(45000)));
        assert_eq!(closed.closed_at, Some(eight + Duration::hours(9)));
        assert!(repo.open_for("ana").await.unwrap().is_none());

        let again = repo.close("cs-1", eight, Money::zero()).await.unwrap_err();
        assert!(matches!(again, DbError::Conflict { .. }));

        let missing = repo.close("cs-x", eight, Money::zero()).await.unwrap_err();
        assert!(matches!(missing, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let db = memory_db().await;
        let repo = db.sessions();
        let day1 = Utc.with_ymd_and_hms(2026, 3, 13, 8, 0, 0).unwrap();
        let day2 = day1 + Duration::days(1);

        repo.insert(&session("cs-1", "ana", day1)).await.unwrap();
        repo.close("cs-1", day1 + Duration::hours(8), Money::zero()).await.unwrap();
        repo.insert(&session("cs-2", "ana", day2)).await.unwrap();

        let history = repo.history("ana", 10).await.unwrap();
        let ids: Vec<&str> = history.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["cs-2", "cs-1"]);
    }
}
