//! Transaction helpers.
//!
//! Every mutation goes through [`Database::write_tx`], which opens a
//! `BEGIN IMMEDIATE` transaction: the write lock is held before the first
//! read, so read-modify-write sequences (version allocation, demote-then-
//! promote, rewind) are serialized across handles and processes. The closure's
//! error drops the transaction, which rolls it back.
//!
//! Reads use [`Database::read_tx`], a deferred transaction that sees one
//! consistent WAL snapshot.

use rusqlite::{Transaction, TransactionBehavior};

use crate::error::Result;
use crate::storage::Database;

impl Database {
    /// Run `f` inside an immediate write transaction and commit on success.
    pub fn write_tx<T, F>(&self, label: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                tracing::trace!(label, "write transaction committed");
                Ok(value)
            }
            Err(err) => {
                tracing::trace!(label, error = %err, "write transaction rolled back");
                Err(err)
            }
        }
    }

    /// Run `f` against a read snapshot. Nothing is written.
    pub fn read_tx<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let value = f(&tx)?;
        tx.finish()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PfError;

    fn count_alerts(db: &Database) -> i64 {
        db.conn()
            .query_row("SELECT COUNT(*) FROM system_alerts", [], |row| row.get(0))
            .unwrap()
    }

    fn insert_alert(tx: &Transaction<'_>) -> Result<()> {
        tx.execute(
            "INSERT INTO system_alerts (alert_type, severity, message, source, created_at)
             VALUES ('t', 'info', 'm', 's', 'now')",
            [],
        )?;
        Ok(())
    }

    #[test]
    fn test_write_tx_commits() {
        let db = Database::open_in_memory().unwrap();
        db.write_tx("test", insert_alert).unwrap();
        assert_eq!(count_alerts(&db), 1);
    }

    #[test]
    fn test_write_tx_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.write_tx("test", |tx| {
            insert_alert(tx)?;
            Err(PfError::StateConflict("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(count_alerts(&db), 0);
    }

    #[test]
    fn test_read_tx_returns_value() {
        let db = Database::open_in_memory().unwrap();
        let n: i64 = db
            .read_tx(|tx| Ok(tx.query_row("SELECT 41 + 1", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(n, 42);
    }
}
