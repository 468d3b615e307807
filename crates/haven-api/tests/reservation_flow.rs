//! Reservation lifecycle integration tests
//!
//! Exercise the manager against a real PostgreSQL instance: the
//! double-check under concurrency, receipt idempotency, and the TTL sweep.
//! All tests are ignored by default and expect `DATABASE_URL` to point at a
//! scratch database.
//!
//! ```sh
//! DATABASE_URL=postgresql://localhost/haven_test cargo test -- --ignored
//! ```

use chrono::{Duration as ChronoDuration, Utc};
use haven_api::{Manager, Units};
use haven_core::config::BookingConfig;
use haven_core::models::ReservationStatus;
use haven_core::AppError;
use haven_db::{create_pool, run_migrations, PgPool, PgReservationRepository, PgUnitDirectory};
use haven_services::{CachedUnitDirectory, ReservationManager};
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

async fn setup_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgresql://localhost/haven_test".to_string());
    let pool = create_pool(&url, Some(5)).await.expect("connect");
    run_migrations(&pool).await.expect("migrate");
    pool
}

fn manager_with(pool: &PgPool, config: BookingConfig) -> Arc<Manager> {
    // No Redis in the test harness: the unit directory passes through
    let units: Arc<Units> = Arc::new(CachedUnitDirectory::new(
        Arc::new(PgUnitDirectory::new(pool.clone())),
        None,
    ));
    Arc::new(ReservationManager::new(
        units,
        Arc::new(PgReservationRepository::new(pool.clone())),
        pool.clone(),
        &config,
    ))
}

/// Insert a fresh unit and return its id; each test gets its own calendar
async fn insert_unit(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO units (
            id, name, capacity, nightly_rate, cleaning_fee,
            security_deposit, service_fee_rate, active
        )
        VALUES ($1, $2, 4, 100, 20, 50, 0.12, TRUE)
        "#,
    )
    .bind(id)
    .bind(format!("Test Unit {}", id))
    .execute(pool)
    .await
    .expect("insert unit");
    id
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn concurrent_overlapping_creates_yield_one_winner() {
    let pool = setup_pool().await;
    let unit_id = insert_unit(&pool).await;
    let manager = manager_with(&pool, BookingConfig::default());

    let start = Utc::now().date_naive() + ChronoDuration::days(30);
    let end = start + ChronoDuration::days(3);

    let a = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .create_reservation(unit_id, Uuid::new_v4(), start, end, 2)
                .await
        })
    };
    let b = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .create_reservation(unit_id, Uuid::new_v4(), start, end, 2)
                .await
        })
    };

    let results = [a.await.unwrap(), b.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| {
            matches!(
                r,
                Err(AppError::DatesConflict { .. }) | Err(AppError::Conflict(_))
            )
        })
        .count();

    assert_eq!(wins, 1, "exactly one create must win");
    assert_eq!(conflicts, 1, "the loser must see a conflict");
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn confirm_is_idempotent_by_receipt() {
    let pool = setup_pool().await;
    let unit_id = insert_unit(&pool).await;
    let manager = manager_with(&pool, BookingConfig::default());

    let start = Utc::now().date_naive() + ChronoDuration::days(40);
    let reservation = manager
        .create_reservation(unit_id, Uuid::new_v4(), start, start + ChronoDuration::days(2), 2)
        .await
        .unwrap();

    // Receipts are globally unique; salt them so reruns against the same
    // scratch database do not collide
    let receipt = format!("R123-{}", Uuid::new_v4());

    let confirmed = manager
        .confirm_reservation(&reservation.booking_ref, &receipt)
        .await
        .unwrap();
    assert_eq!(confirmed.status, ReservationStatus::Confirmed);

    // Same receipt again: no-op returning the confirmed reservation
    let again = manager
        .confirm_reservation(&reservation.booking_ref, &receipt)
        .await
        .unwrap();
    assert_eq!(again.status, ReservationStatus::Confirmed);

    // A different receipt after confirmation is an integrity failure
    let err = manager
        .confirm_reservation(&reservation.booking_ref, "R999")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyFinalized(_)));
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn expired_hold_frees_the_dates() {
    let pool = setup_pool().await;
    let unit_id = insert_unit(&pool).await;
    // Zero TTL: the hold expires the moment it is created
    let manager = manager_with(
        &pool,
        BookingConfig {
            provisional_ttl_minutes: 0,
            ..BookingConfig::default()
        },
    );

    let start = Utc::now().date_naive() + ChronoDuration::days(50);
    let end = start + ChronoDuration::days(3);

    let first = manager
        .create_reservation(unit_id, Uuid::new_v4(), start, end, 2)
        .await
        .unwrap();

    let swept = manager.expire_stale_provisionals().await.unwrap();
    assert!(swept >= 1);

    let stale = manager.get_by_ref(&first.booking_ref).await.unwrap();
    assert_eq!(stale.status, ReservationStatus::Cancelled);

    // The dates are bookable again
    let second = manager
        .create_reservation(unit_id, Uuid::new_v4(), start, end, 2)
        .await
        .unwrap();
    assert_eq!(second.status, ReservationStatus::Provisional);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn conflict_reports_the_blocking_range() {
    let pool = setup_pool().await;
    let unit_id = insert_unit(&pool).await;
    let manager = manager_with(&pool, BookingConfig::default());

    let base = Utc::now().date_naive() + ChronoDuration::days(60);
    let first = manager
        .create_reservation(unit_id, Uuid::new_v4(), base, base + ChronoDuration::days(3), 2)
        .await
        .unwrap();
    assert_eq!(first.total, dec!(406));

    manager
        .confirm_reservation(&first.booking_ref, &format!("R-FLOW-{}", Uuid::new_v4()))
        .await
        .unwrap();

    // Overlapping request while the first stay is confirmed
    let err = manager
        .create_reservation(
            unit_id,
            Uuid::new_v4(),
            base + ChronoDuration::days(2),
            base + ChronoDuration::days(5),
            2,
        )
        .await
        .unwrap_err();

    match err {
        AppError::DatesConflict { start, end } => {
            assert_eq!(start, base);
            assert_eq!(end, base + ChronoDuration::days(3));
        }
        other => panic!("expected DatesConflict, got {:?}", other),
    }

    // Back-to-back is fine: check-in on the first stay's checkout day
    let adjacent = manager
        .create_reservation(
            unit_id,
            Uuid::new_v4(),
            base + ChronoDuration::days(3),
            base + ChronoDuration::days(6),
            2,
        )
        .await
        .unwrap();
    assert_eq!(adjacent.status, ReservationStatus::Provisional);
}
