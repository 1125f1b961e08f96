use std::sync::atomic::Ordering;

use crate::error::DriverError;

use super::QueryRunner;

fn savepoint(depth: usize) -> String {
    format!("sp_{depth}")
}

impl QueryRunner {
    /// Whether a transaction (at any nesting level) is open on this runner.
    #[must_use]
    pub fn is_transaction_active(&self) -> bool {
        self.transaction_depth() > 0
    }

    /// Current nesting level; 0 when no transaction is open.
    #[must_use]
    pub fn transaction_depth(&self) -> usize {
        self.transaction_depth.load(Ordering::SeqCst)
    }

    /// Open a transaction, or a savepoint when one is already open.
    ///
    /// # Errors
    /// Returns `DriverError` if the `BEGIN` or `SAVEPOINT` statement fails.
    pub async fn start_transaction(&self) -> Result<(), DriverError> {
        let depth = self.transaction_depth();
        if depth == 0 {
            self.query("BEGIN TRANSACTION", &[]).await?;
        } else {
            self.query(&format!("SAVEPOINT {}", savepoint(depth)), &[])
                .await?;
        }
        self.transaction_depth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Commit the innermost transaction level.
    ///
    /// # Errors
    /// Returns `DriverError::TransactionNotStarted` without an open transaction,
    /// or the failure of the `COMMIT`/`RELEASE` statement.
    pub async fn commit_transaction(&self) -> Result<(), DriverError> {
        let depth = self.transaction_depth();
        match depth {
            0 => return Err(DriverError::TransactionNotStarted),
            1 => {
                self.query("COMMIT", &[]).await?;
            }
            _ => {
                self.query(&format!("RELEASE SAVEPOINT {}", savepoint(depth - 1)), &[])
                    .await?;
            }
        }
        self.transaction_depth.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    /// Roll back the innermost transaction level.
    ///
    /// # Errors
    /// Returns `DriverError::TransactionNotStarted` without an open transaction,
    /// or the failure of the `ROLLBACK` statement.
    pub async fn rollback_transaction(&self) -> Result<(), DriverError> {
        let depth = self.transaction_depth();
        match depth {
            0 => return Err(DriverError::TransactionNotStarted),
            1 => {
                self.query("ROLLBACK", &[]).await?;
            }
            _ => {
                self.query(
                    &format!("ROLLBACK TO SAVEPOINT {}", savepoint(depth - 1)),
                    &[],
                )
                .await?;
            }
        }
        self.transaction_depth.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
