use crate::entities::plan::PlanId;
use crate::utils::period::add_one_month;
use time::OffsetDateTime;

const SUBSCRIPTION_COLUMNS: &str =
    "user_id, plan_id, current_period_start, current_period_end, created_at, updated_at";

/// The single subscription row of a user.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UserSubscription {
    pub user_id: i64,
    pub plan_id: PlanId,
    pub current_period_start: OffsetDateTime,
    pub current_period_end: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl UserSubscription {
    /// A fresh period on `plan` starting at `now`. The original `created_at`
    /// is kept.
    pub fn renewed(&self, plan: PlanId, now: OffsetDateTime) -> UserSubscription {
        UserSubscription {
            user_id: self.user_id,
            plan_id: plan,
            current_period_start: now,
            current_period_end: add_one_month(now),
            created_at: self.created_at,
            updated_at: now,
        }
    }

    /// Load the user's subscription under a row lock, creating a free-plan
    /// subscription first if the user has none.
    ///
    /// The lock serializes every quota check of one user across all of their
    /// projects until the transaction ends.
    pub async fn lock_or_create_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        user_id: i64,
        now: OffsetDateTime,
    ) -> Result<UserSubscription, sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_subscriptions
                (user_id, plan_id, current_period_start, current_period_end, created_at, updated_at)
            VALUES ($1, 'free', $2, $3, $2, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(add_one_month(now))
        .execute(&mut **tx)
        .await?;

        let sql = format!(
            "SELECT {SUBSCRIPTION_COLUMNS} FROM user_subscriptions WHERE user_id = $1 FOR UPDATE"
        );
        sqlx::query_as::<_, UserSubscription>(&sql)
            .bind(user_id)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn upsert_tx(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO user_subscriptions
                (user_id, plan_id, current_period_start, current_period_end, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(self.user_id)
        .bind(self.plan_id)
        .bind(self.current_period_start)
        .bind(self.current_period_end)
        .bind(self.created_at)
        .bind(self.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_renewed_keeps_created_at() {
        let created = datetime!(2024-01-15 00:00 UTC);
        let sub = UserSubscription {
            user_id: 7,
            plan_id: PlanId::Pro,
            current_period_start: datetime!(2024-03-15 00:00 UTC),
            current_period_end: datetime!(2024-04-15 00:00 UTC),
            created_at: created,
            updated_at: datetime!(2024-03-15 00:00 UTC),
        };
        let now = datetime!(2024-04-20 12:00 UTC);
        let renewed = sub.renewed(PlanId::Free, now);
        assert_eq!(renewed.plan_id, PlanId::Free);
        assert_eq!(renewed.created_at, created);
        assert_eq!(renewed.current_period_start, now);
        assert_eq!(renewed.current_period_end, datetime!(2024-05-20 12:00 UTC));
    }
}
