//! # Cash Sessions
//!
//! Per-user register open/close lifecycle.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │                 open(user, float)                                       │
//! │   NO_SESSION ───────────────────────► OPEN ◄──────────────┐             │
//! │                                        │                  │             │
//! │                  close(user, declared) │                  │ open()      │
//! │                                        ▼                  │             │
//! │                                      CLOSED ──────────────┘             │
//! │                                                                         │
//! │   open()  while OPEN         ──► SessionAlreadyOpen                     │
//! │   close() with nothing OPEN  ──► NoOpenSession                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Closing computes the session's sales total from the sale store and
//! reports the variance against the cash the user counted. A variance is
//! logged, never rejected.

use std::sync::Arc;

use chrono::NaiveDate;
use till_core::validation::{validate_amount, validate_user};
use till_core::{CashSession, Clock, Money, SessionClosure, SessionStatus};
use till_db::{DbError, SaleStore, SessionStore};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{RegisterError, RegisterResult};
use crate::locks::{KeyGuard, LockTable};
use crate::report::day_bounds;
use crate::retry::RetryPolicy;

/// Opens and closes cash sessions, one user at a time.
pub struct CashSessionManager {
    sessions: Arc<dyn SessionStore>,
    sales: Arc<dyn SaleStore>,
    locks: LockTable,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CashSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CashSessionManager")
            .field("locks", &self.locks)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl CashSessionManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        sales: Arc<dyn SaleStore>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        CashSessionManager {
            sessions,
            sales,
            locks: LockTable::new("user"),
            retry,
            clock,
        }
    }

    /// Opens a session for `user` with `opening_float` in the drawer.
    ///
    /// ## Errors
    /// - `Validation` for a blank user or a negative float
    /// - `SessionAlreadyOpen` if the user has an OPEN session
    pub async fn open(&self, user: &str, opening_float: Money) -> RegisterResult<CashSession> {
        validate_user(user)?;
        validate_amount("opening float", opening_float)?;

        let _guard = self.locks.lock(user).await;

        if self.open_session(user).await?.is_some() {
            return Err(RegisterError::SessionAlreadyOpen {
                user: user.to_string(),
            });
        }

        let session = CashSession {
            id: Uuid::new_v4().to_string(),
            user: user.to_string(),
            opened_at: self.clock.now(),
            closed_at: None,
            opening_float,
            closing_amount: None,
            status: SessionStatus::Open,
        };

        match self
            .retry
            .run("sessions.insert", || self.sessions.insert(&session))
            .await
        {
            Ok(()) => {}
            // another process got there first
            Err(DbError::UniqueViolation { .. }) => {
                return Err(RegisterError::SessionAlreadyOpen {
                    user: user.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            user,
            session_id = %session.id,
            opening_float = %opening_float,
            "Cash session opened"
        );

        Ok(session)
    }

    /// Closes the user's OPEN session.
    ///
    /// `closing_amount` is the total of the user's sales since the session
    /// opened; `variance = declared_amount - closing_amount`.
    ///
    /// ## Errors
    /// - `Validation` for a blank user or a negative declared amount
    /// - `NoOpenSession` if the user has no OPEN session
    pub async fn close(&self, user: &str, declared_amount: Money) -> RegisterResult<SessionClosure> {
        validate_user(user)?;
        validate_amount("declared amount", declared_amount)?;

        let _guard = self.locks.lock(user).await;

        let session = self
            .open_session(user)
            .await?
            .ok_or_else(|| RegisterError::NoOpenSession {
                user: user.to_string(),
            })?;

        let closing_amount = self
            .retry
            .run("sales.total_for_cashier_since", || {
                self.sales.total_for_cashier_since(user, session.opened_at)
            })
            .await?;

        let closed_at = self.clock.now();
        let closed = match self
            .retry
            .run("sessions.close", || {
                self.sessions.close(&session.id, closed_at, closing_amount)
            })
            .await
        {
            Ok(closed) => closed,
            Err(DbError::Conflict { .. }) | Err(DbError::NotFound { .. }) => {
                return Err(RegisterError::NoOpenSession {
                    user: user.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let variance = declared_amount - closing_amount;
        if variance.is_zero() {
            info!(
                user,
                session_id = %closed.id,
                closing_amount = %closing_amount,
                "Cash session closed"
            );
        } else {
            warn!(
                user,
                session_id = %closed.id,
                closing_amount = %closing_amount,
                declared = %declared_amount,
                variance = variance.units(),
                "Cash session closed with variance"
            );
        }

        Ok(SessionClosure {
            session: closed,
            declared_amount,
            variance,
        })
    }

    /// The user's OPEN session, if any. Takes no lock.
    pub async fn get_open(&self, user: &str) -> RegisterResult<Option<CashSession>> {
        validate_user(user)?;
        self.open_session(user).await
    }

    /// The user's sales total on `date` (UTC calendar day).
    pub async fn day_total(&self, user: &str, date: NaiveDate) -> RegisterResult<Money> {
        validate_user(user)?;

        let (from, to) = day_bounds(date);

        Ok(self
            .retry
            .run("sales.total_for_cashier_between", || {
                self.sales.total_for_cashier_between(user, from, to)
            })
            .await?)
    }

    /// The user's sessions, most recently opened first.
    pub async fn history(&self, user: &str, limit: u32) -> RegisterResult<Vec<CashSession>> {
        validate_user(user)?;
        Ok(self
            .retry
            .run("sessions.history", || self.sessions.history(user, limit))
            .await?)
    }

    /// Serializes against open/close for `user`.
    pub(crate) async fn lock_user(&self, user: &str) -> KeyGuard {
        self.locks.lock(user).await
    }

    async fn open_session(&self, user: &str) -> RegisterResult<Option<CashSession>> {
        Ok(self
            .retry
            .run("sessions.open_for", || self.sessions.open_for(user))
            .await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{manual_clock, start_time};
    use chrono::{DateTime, Duration, Utc};
    use till_core::{DocType, Sale, SaleLine, Tenders};
    use till_db::Stores;

    fn manager(stores: &Stores, clock: Arc<dyn Clock>) -> CashSessionManager {
        CashSessionManager::new(
            stores.sessions.clone(),
            stores.sales.clone(),
            RetryPolicy::none(),
            clock,
        )
    }

    fn sale(id: &str, cashier: &str, total: i64, at: DateTime<Utc>) -> Sale {
        Sale {
            id: id.to_string(),
            receipt_number: format!("20260314-{id:0>6}"),
            doc_type: DocType::Receipt,
            timestamp: at,
            lines: vec![SaleLine {
                product_code: "1001".to_string(),
                name: "Pan".to_string(),
                unit_price: Money::from_units(total),
                quantity: 1,
            }],
            tenders: Tenders::single(till_core::PaymentMethod::Cash, Money::from_units(total)),
            subtotal: Money::from_units(total),
            tax: Money::zero(),
            total: Money::from_units(total),
            customer_ref: None,
            cashier: cashier.to_string(),
            session_id: "s".to_string(),
        }
    }

    #[tokio::test]
    async fn test_open_twice_fails() {
        let stores = Stores::in_memory();
        let sessions = manager(&stores, manual_clock());

        let session = sessions.open("ana", Money::from_units(20_000)).await.unwrap();
        assert!(session.is_open());
        assert_eq!(session.opened_at, start_time());

        let err = sessions.open("ana", Money::zero()).await.unwrap_err();
        assert!(matches!(err, RegisterError::SessionAlreadyOpen { .. }));

        // other users are independent
        assert!(sessions.open("beto", Money::zero()).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_without_open_fails() {
        let stores = Stores::in_memory();
        let sessions = manager(&stores, manual_clock());

        let err = sessions.close("ana", Money::zero()).await.unwrap_err();
        assert!(matches!(err, RegisterError::NoOpenSession { .. }));
    }

    #[tokio::test]
    async fn test_close_computes_total_and_variance() {
        let stores = Stores::in_memory();
        let clock = manual_clock();
        let sessions = manager(&stores, clock.clone());

        // a sale before the session opened does not count
        stores
            .sales
            .insert(&sale("1", "ana", 5000, start_time() - Duration::hours(1)))
            .await
            .unwrap();

        sessions.open("ana", Money::from_units(10_000)).await.unwrap();
        clock.advance(Duration::minutes(30));
        stores
            .sales
            .insert(&sale("2", "ana", 5926, clock.now()))
            .await
            .unwrap();
        stores
            .sales
            .insert(&sale("3", "beto", 1000, clock.now()))
            .await
            .unwrap();
        clock.advance(Duration::hours(2));

        let closure = sessions.close("ana", Money::from_units(5900)).await.unwrap();
        assert_eq!(closure.session.status, SessionStatus::Closed);
        assert_eq!(closure.session.closing_amount, Some(Money::from_units(5926)));
        assert_eq!(closure.session.closed_at, Some(clock.now()));
        assert_eq!(closure.variance, Money::from_units(-26));
        assert!(!closure.is_balanced());

        assert!(sessions.get_open("ana").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_after_close() {
        let stores = Stores::in_memory();
        let clock = manual_clock();
        let sessions = manager(&stores, clock.clone());

        sessions.open("ana", Money::zero()).await.unwrap();
        clock.advance(Duration::hours(8));
        let closure = sessions.close("ana", Money::zero()).await.unwrap();
        assert!(closure.is_balanced());

        clock.advance(Duration::hours(12));
        let second = sessions.open("ana", Money::from_units(5000)).await.unwrap();
        assert!(second.is_open());

        let history = sessions.history("ana", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let stores = Stores::in_memory();
        let sessions = manager(&stores, manual_clock());

        let err = sessions.open("", Money::zero()).await.unwrap_err();
        assert!(matches!(err, RegisterError::Validation(_)));

        let err = sessions.open("ana", Money::from_units(-1)).await.unwrap_err();
        assert!(matches!(err, RegisterError::Validation(_)));
    }

    #[tokio::test]
    async fn test_day_total() {
        let stores = Stores::in_memory();
        let sessions = manager(&stores, manual_clock());
        let day = start_time().date_naive();

        for (id, total, at) in [
            ("1", 1000, start_time()),
            ("2", 2500, start_time() + Duration::hours(5)),
            ("3", 9999, start_time() + Duration::days(1)),
        ] {
            stores.sales.insert(&sale(id, "ana", total, at)).await.unwrap();
        }

        assert_eq!(
            sessions.day_total("ana", day).await.unwrap(),
            Money::from_units(3500)
        );
        assert_eq!(
            sessions.day_total("beto", day).await.unwrap(),
            Money::zero()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_open_yields_one_session() {
        let stores = Stores::in_memory();
        let sessions = Arc::new(manager(&stores, manual_clock()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let sessions = sessions.clone();
            handles.push(tokio::spawn(async move {
                sessions.open("ana", Money::zero()).await
            }));
        }

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(RegisterError::SessionAlreadyOpen { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(opened, 1);
        assert_eq!(sessions.history("ana", 10).await.unwrap().len(), 1);
    }
}
