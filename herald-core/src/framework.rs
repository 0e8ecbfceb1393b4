use sqlx::PgPool;

/// Anything that can hand out a Postgres executor: the pool itself or an
/// open transaction. Lets one query function serve both call sites.
pub trait DatabaseAccessor {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_>;
}

/// Runs read queries directly on the pool. Queries are expressed as
/// `impl Processor<Query> for DatabaseProcessor`.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

/// Owns an open transaction. Commit it explicitly; dropping it rolls back.
pub struct TransactionProcessor<'b> {
    pub tx: sqlx::Transaction<'b, sqlx::Postgres>,
}

impl DatabaseProcessor {
    pub async fn begin(&self) -> Result<TransactionProcessor<'static>, sqlx::Error> {
        Ok(TransactionProcessor {
            tx: self.pool.begin().await?,
        })
    }
}

impl TransactionProcessor<'_> {
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}

impl DatabaseAccessor for DatabaseProcessor {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_> {
        &self.pool
    }
}

impl<'b> DatabaseAccessor for TransactionProcessor<'b> {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_> {
        &mut *self.tx
    }
}
