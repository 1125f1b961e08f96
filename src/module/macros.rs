/// Implement [`BackendModule`] for a type with an inherent
/// `async fn with_engine(&self, f) -> Result<R, BackendError>`.
macro_rules! engine_backed_module {
    ($ty:ty, $variant:expr) => {
        #[async_trait::async_trait]
        impl $crate::module::BackendModule for $ty {
            fn variant(&self) -> $crate::types::ModuleVariant {
                $variant
            }

            async fn open(
                &self,
                filename: &str,
                flags: rusqlite::OpenFlags,
                vfs: Option<&str>,
            ) -> Result<$crate::engine::DbHandle, $crate::error::BackendError> {
                let filename = filename.to_owned();
                let vfs = vfs.map(str::to_owned);
                self.with_engine(move |engine| engine.open(&filename, flags, vfs.as_deref()))
                    .await
            }

            async fn close(
                &self,
                db: $crate::engine::DbHandle,
            ) -> Result<(), $crate::error::BackendError> {
                self.with_engine(move |engine| engine.close(db)).await
            }

            async fn exec(
                &self,
                db: $crate::engine::DbHandle,
                sql: &str,
            ) -> Result<Vec<Vec<rusqlite::types::Value>>, $crate::error::BackendError> {
                let sql = sql.to_owned();
                self.with_engine(move |engine| engine.exec(db, &sql)).await
            }

            async fn prepare(
                &self,
                db: $crate::engine::DbHandle,
                sql: &str,
            ) -> Result<Option<$crate::engine::StmtHandle>, $crate::error::BackendError> {
                let sql = sql.to_owned();
                self.with_engine(move |engine| engine.prepare(db, &sql)).await
            }

            async fn bind_parameter_count(
                &self,
                stmt: $crate::engine::StmtHandle,
            ) -> Result<usize, $crate::error::BackendError> {
                self.with_engine(move |engine| engine.bind_parameter_count(stmt))
                    .await
            }

            async fn bind(
                &self,
                stmt: $crate::engine::StmtHandle,
                index: usize,
                value: rusqlite::types::Value,
            ) -> Result<(), $crate::error::BackendError> {
                self.with_engine(move |engine| engine.bind(stmt, index, value))
                    .await
            }

            async fn step(
                &self,
                stmt: $crate::engine::StmtHandle,
            ) -> Result<i32, $crate::error::BackendError> {
                self.with_engine(move |engine| engine.step(stmt)).await
            }

            async fn column_names(
                &self,
                stmt: $crate::engine::StmtHandle,
            ) -> Result<Vec<String>, $crate::error::BackendError> {
                self.with_engine(move |engine| engine.column_names(stmt))
                    .await
            }

            async fn row(
                &self,
                stmt: $crate::engine::StmtHandle,
            ) -> Result<Vec<rusqlite::types::Value>, $crate::error::BackendError> {
                self.with_engine(move |engine| engine.row(stmt)).await
            }

            async fn changes(
                &self,
                db: $crate::engine::DbHandle,
            ) -> Result<u64, $crate::error::BackendError> {
                self.with_engine(move |engine| engine.changes(db)).await
            }

            async fn finalize(
                &self,
                stmt: $crate::engine::StmtHandle,
            ) -> Result<(), $crate::error::BackendError> {
                self.with_engine(move |engine| engine.finalize(stmt)).await
            }
        }
    };
}

