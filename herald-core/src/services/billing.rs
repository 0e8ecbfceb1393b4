use super::ServiceError;
use crate::entities::unix;
use crate::framework::DatabaseProcessor;
use crate::quota::current_usage;
use herald_sdk::objects::admin::{MetricUsage, UsageSummary};
use time::OffsetDateTime;

pub struct BillingService {
    db: DatabaseProcessor,
}

impl BillingService {
    pub fn new(db: DatabaseProcessor) -> Self {
        Self { db }
    }

    /// The user's plan, current period and usage per metric.
    ///
    /// Creates a free subscription for users that have none yet and rolls
    /// over a lapsed period, exactly as a quota check would.
    pub async fn usage_summary(&self, user_id: i64) -> Result<UsageSummary, ServiceError> {
        let mut tx = self.db.pool.begin().await?;
        let (subscription, metrics) =
            current_usage(&mut tx, user_id, OffsetDateTime::now_utc()).await?;
        tx.commit().await?;
        Ok(UsageSummary {
            user_id,
            plan: subscription.plan_id.into(),
            current_period_start: unix(subscription.current_period_start),
            current_period_end: unix(subscription.current_period_end),
            metrics: metrics
                .into_iter()
                .map(|m| MetricUsage {
                    metric: m.metric.to_string(),
                    used: m.used,
                    limit: m.limit,
                })
                .collect(),
        })
    }
}
