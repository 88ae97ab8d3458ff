#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection};
use tempfile::TempDir;
use trial_sessions_seaorm::migration::{Migrator, MigratorTrait};
use trial_sessions_seaorm::{BookingOrchestrator, FakeClock, KnownMentors, SchedulingConfig};

pub const MENTOR: i64 = 7;
pub const OTHER_MENTOR: i64 = 8;

pub struct Harness {
    pub engine: BookingOrchestrator,
    pub clock: FakeClock,
    pub conn: DatabaseConnection,
    /// Keeps a file-backed database alive for the harness's lifetime.
    _dir: Option<TempDir>,
}

impl Harness {
    /// A second engine over the same store with its own limits.
    pub fn engine_with(&self, config: SchedulingConfig) -> BookingOrchestrator {
        BookingOrchestrator::new(self.conn.clone(), mentors())
            .with_clock(Arc::new(self.clock.clone()))
            .with_config(config)
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|day| day.and_hms_opt(h, min, 0))
        .unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn mentors() -> Arc<KnownMentors> {
    Arc::new(KnownMentors::new([MENTOR, OTHER_MENTOR]))
}

pub async fn connect() -> DatabaseConnection {
    init_tracing();

    // One connection so every query sees the same in-memory database
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(options).await.unwrap();
    Migrator::up(&conn, None).await.unwrap();
    conn
}

/// File-backed database behind a pool of several connections, so
/// concurrent callers really contend for the same rows.
pub async fn connect_shared() -> (DatabaseConnection, TempDir) {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("scheduling.db").display());
    let mut options = ConnectOptions::new(url);
    options.max_connections(8).min_connections(1).sqlx_logging(false);
    let conn = Database::connect(options).await.unwrap();
    conn.execute_unprepared("PRAGMA journal_mode = WAL")
        .await
        .unwrap();
    Migrator::up(&conn, None).await.unwrap();
    (conn, dir)
}

pub async fn harness() -> Harness {
    harness_with(SchedulingConfig::default()).await
}

/// Engine for mentors 7 and 8 with the clock at 2025-08-25 09:00.
pub async fn harness_with(config: SchedulingConfig) -> Harness {
    let conn = connect().await;
    build(conn, None, config)
}

/// Like [`harness`] but over [`connect_shared`].
pub async fn shared_harness() -> Harness {
    let (conn, dir) = connect_shared().await;
    build(conn, Some(dir), SchedulingConfig::default())
}

fn build(conn: DatabaseConnection, dir: Option<TempDir>, config: SchedulingConfig) -> Harness {
    let clock = FakeClock::new(at(2025, 8, 25, 9, 0));
    let engine = BookingOrchestrator::new(conn.clone(), mentors())
        .with_clock(Arc::new(clock.clone()))
        .with_config(config);
    Harness {
        engine,
        clock,
        conn,
        _dir: dir,
    }
}
