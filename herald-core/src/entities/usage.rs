use crate::entities::plan::Metric;
use time::OffsetDateTime;

/// Append-only record of one consumption.
///
/// Rows are keyed by the owning user and outlive the project they were
/// charged to, so deleting a project never gives quota back.
pub struct UsageLog;

impl UsageLog {
    pub async fn insert_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: i64,
        project_id: i64,
        metric: Metric,
        amount: i64,
        period_start: OffsetDateTime,
        period_end: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO usage_logs (user_id, project_id, metric, amount, period_start, period_end)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .bind(metric)
        .bind(amount)
        .bind(period_start)
        .bind(period_end)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

/// Running total per `(user, project, metric, period)`.
pub struct UsageAggregate;

impl UsageAggregate {
    pub async fn increment_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: i64,
        project_id: i64,
        metric: Metric,
        amount: i64,
        period_start: OffsetDateTime,
        period_end: OffsetDateTime,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO usage_aggregates (user_id, project_id, metric, period_start, period_end, used)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, project_id, metric, period_start)
            DO UPDATE SET used = usage_aggregates.used + EXCLUDED.used,
                          period_end = EXCLUDED.period_end
            "#,
        )
        .bind(user_id)
        .bind(project_id)
        .bind(metric)
        .bind(period_start)
        .bind(period_end)
        .bind(amount)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Usage of `metric` in the given period, summed over every project the
    /// user owns or has owned.
    pub async fn sum_for_user<'e>(
        executor: impl sqlx::PgExecutor<'e>,
        user_id: i64,
        metric: Metric,
        period_start: OffsetDateTime,
        period_end: OffsetDateTime,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(used), 0)::bigint
            FROM usage_aggregates
            WHERE user_id = $1
              AND metric = $2
              AND period_start = $3
              AND period_end = $4
            "#,
        )
        .bind(user_id)
        .bind(metric)
        .bind(period_start)
        .bind(period_end)
        .fetch_one(executor)
        .await
    }
}
