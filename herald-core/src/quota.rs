//! Usage accounting against a user's subscription.
//!
//! All checks for one user are serialized on their subscription row, which
//! is locked for the rest of the caller's transaction. The check and the
//! usage write therefore commit or roll back together with whatever the
//! caller persists alongside them.

use crate::entities::plan::{Metric, Plan, PlanId};
use crate::entities::subscription::UserSubscription;
use crate::entities::usage::{UsageAggregate, UsageLog};
use time::{Duration, OffsetDateTime};

/// How long a lapsed paid subscription keeps its plan before falling back to
/// the free tier.
pub const RENEWAL_GRACE: Duration = Duration::days(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageEvent {
    pub user_id: i64,
    pub project_id: i64,
    pub metric: Metric,
    pub amount: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error(
        "quota exceeded for {metric} on plan {plan}: used {used}, requested {requested}, limit {limit}"
    )]
    QuotaExceeded {
        metric: Metric,
        plan: PlanId,
        used: i64,
        requested: i64,
        limit: i64,
    },
    #[error("plan {1} has no entitlement for {0}")]
    MetricNotInPlan(Metric, PlanId),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a successful [`check_and_consume`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumption {
    pub plan: PlanId,
    pub period_start: OffsetDateTime,
    pub period_end: OffsetDateTime,
    pub used_after: i64,
    /// Whether this call started a new period.
    pub renewed: bool,
}

/// The plan to renew onto, if the subscription's period has ended and it
/// should roll over now.
///
/// Free subscriptions renew as soon as their period ends. Paid ones are left
/// alone for the grace period, then drop to free.
pub fn renewal_decision(sub: &UserSubscription, now: OffsetDateTime) -> Option<PlanId> {
    if now <= sub.current_period_end {
        return None;
    }
    if sub.plan_id == PlanId::Free || now > sub.current_period_end + RENEWAL_GRACE {
        Some(PlanId::Free)
    } else {
        None
    }
}

/// Admit `amount` on top of `used` under the plan's entitlement for
/// `metric`. Returns the new total.
pub fn admit(plan: &Plan, metric: Metric, used: i64, amount: i64) -> Result<i64, QuotaError> {
    let entitlement = plan
        .entitlement(metric)
        .ok_or(QuotaError::MetricNotInPlan(metric, plan.id))?;
    if let Some(limit) = entitlement.limit
        && entitlement.would_exceed(used, amount)
    {
        return Err(QuotaError::QuotaExceeded {
            metric,
            plan: plan.id,
            used,
            requested: amount,
            limit,
        });
    }
    Ok(used.saturating_add(amount))
}

/// Lock the user's subscription and roll it over if due.
async fn current_subscription_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
    now: OffsetDateTime,
) -> Result<(UserSubscription, bool), sqlx::Error> {
    let mut sub = UserSubscription::lock_or_create_tx(tx, user_id, now).await?;
    let renewed = match renewal_decision(&sub, now) {
        Some(plan) => {
            tracing::info!(user_id, from = %sub.plan_id, to = %plan, "Renewing subscription period");
            sub = sub.renewed(plan, now);
            true
        }
        None => false,
    };
    sub.upsert_tx(tx).await?;
    Ok((sub, renewed))
}

/// Check the event against the user's quota and record it.
///
/// On [`QuotaError::QuotaExceeded`] nothing is recorded. The subscription
/// may still have been renewed, so the caller is free to commit whatever
/// else it wrote.
#[tracing::instrument(skip_all, err, fields(user_id = event.user_id, project_id = event.project_id, amount = event.amount))]
pub async fn check_and_consume(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &UsageEvent,
    now: OffsetDateTime,
) -> Result<Consumption, QuotaError> {
    let (sub, renewed) = current_subscription_tx(tx, event.user_id, now).await?;
    let plan = Plan::get(sub.plan_id);

    let used = UsageAggregate::sum_for_user(
        &mut **tx,
        event.user_id,
        event.metric,
        sub.current_period_start,
        sub.current_period_end,
    )
    .await?;
    let used_after = admit(plan, event.metric, used, event.amount)?;

    UsageLog::insert_tx(
        tx,
        event.user_id,
        event.project_id,
        event.metric,
        event.amount,
        sub.current_period_start,
        sub.current_period_end,
    )
    .await?;
    UsageAggregate::increment_tx(
        tx,
        event.user_id,
        event.project_id,
        event.metric,
        event.amount,
        sub.current_period_start,
        sub.current_period_end,
    )
    .await?;

    Ok(Consumption {
        plan: sub.plan_id,
        period_start: sub.current_period_start,
        period_end: sub.current_period_end,
        used_after,
        renewed,
    })
}

/// Usage of one metric in the current period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricUsage {
    pub metric: Metric,
    pub used: i64,
    pub limit: Option<i64>,
}

/// Subscription state and per-metric usage of a user, with the period
/// rolled over first if due.
pub async fn current_usage(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: i64,
    now: OffsetDateTime,
) -> Result<(UserSubscription, Vec<MetricUsage>), sqlx::Error> {
    let (sub, _) = current_subscription_tx(tx, user_id, now).await?;
    let plan = Plan::get(sub.plan_id);
    let mut metrics = Vec::with_capacity(Metric::ALL.len());
    for metric in Metric::ALL {
        let used = UsageAggregate::sum_for_user(
            &mut **tx,
            user_id,
            metric,
            sub.current_period_start,
            sub.current_period_end,
        )
        .await?;
        metrics.push(MetricUsage {
            metric,
            used,
            limit: plan.entitlement(metric).and_then(|e| e.limit),
        });
    }
    Ok((sub, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn subscription(plan: PlanId, end: OffsetDateTime) -> UserSubscription {
        UserSubscription {
            user_id: 1,
            plan_id: plan,
            current_period_start: datetime!(2024-01-01 00:00 UTC),
            current_period_end: end,
            created_at: datetime!(2023-06-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    #[test]
    fn test_no_renewal_within_period() {
        let end = datetime!(2024-02-01 00:00 UTC);
        let sub = subscription(PlanId::Free, end);
        assert_eq!(renewal_decision(&sub, end), None);
        assert_eq!(renewal_decision(&sub, datetime!(2024-01-15 00:00 UTC)), None);
    }

    #[test]
    fn test_free_renews_immediately() {
        let end = datetime!(2024-02-01 00:00 UTC);
        let sub = subscription(PlanId::Free, end);
        assert_eq!(
            renewal_decision(&sub, end + Duration::seconds(1)),
            Some(PlanId::Free)
        );
    }

    #[test]
    fn test_paid_waits_for_grace_then_downgrades() {
        let end = datetime!(2024-02-01 00:00 UTC);
        let sub = subscription(PlanId::Pro, end);
        assert_eq!(renewal_decision(&sub, end + Duration::days(1)), None);
        assert_eq!(renewal_decision(&sub, end + RENEWAL_GRACE), None);
        assert_eq!(
            renewal_decision(&sub, end + RENEWAL_GRACE + Duration::seconds(1)),
            Some(PlanId::Free)
        );
    }

    #[test]
    fn test_successful_consumptions_are_floor_of_limit() {
        let plan = Plan::get(PlanId::Free);
        let limit = plan
            .entitlement(Metric::Notifications)
            .and_then(|e| e.limit)
            .unwrap();
        for amount in [1, 3, 7, 333, 10_000, 10_001] {
            let mut used = 0;
            let mut successes = 0;
            for _ in 0..(limit / amount + 5) {
                match admit(plan, Metric::Notifications, used, amount) {
                    Ok(total) => {
                        used = total;
                        successes += 1;
                    }
                    Err(QuotaError::QuotaExceeded { .. }) => {}
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }
            assert_eq!(successes, limit / amount, "amount {amount}");
            assert!(used <= limit);
            assert!(matches!(
                admit(plan, Metric::Notifications, used, amount),
                Err(QuotaError::QuotaExceeded { .. })
            ));
        }
    }

    #[test]
    fn test_exceeded_reports_context() {
        let plan = Plan::get(PlanId::Pro);
        match admit(plan, Metric::Notifications, 99_990, 20) {
            Err(QuotaError::QuotaExceeded {
                used,
                requested,
                limit,
                plan,
                ..
            }) => {
                assert_eq!(used, 99_990);
                assert_eq!(requested, 20);
                assert_eq!(limit, 100_000);
                assert_eq!(plan, PlanId::Pro);
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }
}
