//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database. Components depend on
//! the `CaseStore` trait, never on SQL. The connection sits behind a
//! mutex — persistence is off the hot counting path, so one writer at
//! a time at this boundary is fine.

use crate::error::GuardResult;
use parking_lot::Mutex;
use rusqlite::Connection;

pub mod case;

pub struct GuardStore {
    pub(crate) conn: Mutex<Connection>,
}

impl GuardStore {
    /// Open (or create) the case database at `path`.
    pub fn open(path: &str) -> GuardResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GuardResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> GuardResult<()> {
        self.conn
            .lock()
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }
}
