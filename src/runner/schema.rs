use crate::error::DriverError;
use crate::types::RowValues;

use super::QueryRunner;

const DROP_VIEWS: &str = r#"SELECT 'DROP VIEW "' || replace("name", '"', '""') || '";' AS "query" FROM "sqlite_master" WHERE "type" = 'view'"#;

const DROP_TABLES: &str = r#"SELECT 'DROP TABLE "' || replace("name", '"', '""') || '";' AS "query" FROM "sqlite_master" WHERE "type" = 'table' AND "name" != 'sqlite_sequence'"#;

impl QueryRunner {
    /// Turn foreign key enforcement off before a migration runs.
    ///
    /// # Errors
    /// Returns `DriverError` if the pragma fails.
    pub async fn before_migration(&self) -> Result<(), DriverError> {
        self.query("PRAGMA foreign_keys = OFF", &[]).await?;
        Ok(())
    }

    /// Turn foreign key enforcement back on after a migration.
    ///
    /// # Errors
    /// Returns `DriverError` if the pragma fails.
    pub async fn after_migration(&self) -> Result<(), DriverError> {
        self.query("PRAGMA foreign_keys = ON", &[]).await?;
        Ok(())
    }

    /// Drop every view and table in the database.
    ///
    /// Runs in its own transaction unless one is already open on this runner, in
    /// which case the caller stays in charge of committing or rolling back and
    /// foreign key checks are deferred to the caller's commit.
    /// Foreign key enforcement is off while dropping and always turned back on.
    ///
    /// # Errors
    /// Returns the first failing statement's error; a failed rollback never replaces it.
    pub async fn clear_database(&self) -> Result<(), DriverError> {
        self.query("PRAGMA foreign_keys = OFF", &[]).await?;
        let outcome = self.drop_schema().await;
        let restored = self.query("PRAGMA foreign_keys = ON", &[]).await;
        outcome?;
        restored?;
        Ok(())
    }

    async fn drop_schema(&self) -> Result<(), DriverError> {
        let owns_transaction = !self.is_transaction_active();
        if owns_transaction {
            self.start_transaction().await?;
        } else {
            // foreign_keys = OFF is a no-op inside an open transaction; defer the
            // checks to the caller's commit instead. Resets when that transaction ends.
            self.query("PRAGMA defer_foreign_keys = ON", &[]).await?;
        }

        let outcome = match self.drop_all().await {
            Ok(()) if owns_transaction => self.commit_transaction().await,
            other => other,
        };
        if let Err(err) = outcome {
            if owns_transaction
                && let Err(rollback_err) = self.rollback_transaction().await
            {
                tracing::debug!(error = %rollback_err, "rollback after failed schema reset");
            }
            return Err(err);
        }
        Ok(())
    }

    async fn drop_all(&self) -> Result<(), DriverError> {
        for catalog_query in [DROP_VIEWS, DROP_TABLES] {
            let statements: Vec<String> = self
                .query(catalog_query, &[])
                .await?
                .iter()
                .filter_map(|record| record.get("query").and_then(RowValues::as_text))
                .map(str::to_owned)
                .collect();
            for statement in &statements {
                tracing::trace!(statement = %statement, "clearing schema");
                self.query(statement, &[]).await?;
            }
        }
        Ok(())
    }
}
