//! Subscription plans and their entitlements.
//!
//! Plans are static: they ship with the binary rather than living in the
//! database, so a plan change is a deploy.

use herald_sdk::objects::admin::PlanId as SdkPlanId;
use time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "plan_id")]
pub enum PlanId {
    Free,
    Pro,
}

impl From<PlanId> for SdkPlanId {
    fn from(value: PlanId) -> Self {
        match value {
            PlanId::Free => SdkPlanId::Free,
            PlanId::Pro => SdkPlanId::Pro,
        }
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanId::Free => write!(f, "free"),
            PlanId::Pro => write!(f, "pro"),
        }
    }
}

/// A metered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "usage_metric")]
pub enum Metric {
    Notifications,
}

impl Metric {
    pub const ALL: [Metric; 1] = [Metric::Notifications];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Notifications => "notifications",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A plan's allowance for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlement {
    pub metric: Metric,
    /// `None` means unlimited.
    pub limit: Option<i64>,
    pub period_days: i64,
}

impl Entitlement {
    /// Whether consuming `amount` on top of `used` would go past the limit.
    pub fn would_exceed(&self, used: i64, amount: i64) -> bool {
        match self.limit {
            Some(limit) => used.saturating_add(amount) > limit,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub id: PlanId,
    pub description: &'static str,
    /// How long notifications created under this plan are kept.
    pub retention: Duration,
    entitlements: &'static [Entitlement],
}

const FREE_ENTITLEMENTS: &[Entitlement] = &[Entitlement {
    metric: Metric::Notifications,
    limit: Some(10_000),
    period_days: 30,
}];

const PRO_ENTITLEMENTS: &[Entitlement] = &[Entitlement {
    metric: Metric::Notifications,
    limit: Some(100_000),
    period_days: 30,
}];

const FREE: Plan = Plan {
    id: PlanId::Free,
    description: "Free tier with limited notifications",
    retention: Duration::days(30),
    entitlements: FREE_ENTITLEMENTS,
};

const PRO: Plan = Plan {
    id: PlanId::Pro,
    description: "Pro tier with higher limits",
    retention: Duration::days(30),
    entitlements: PRO_ENTITLEMENTS,
};

impl Plan {
    pub fn get(id: PlanId) -> &'static Plan {
        match id {
            PlanId::Free => &FREE,
            PlanId::Pro => &PRO,
        }
    }

    pub fn entitlement(&self, metric: Metric) -> Option<&'static Entitlement> {
        self.entitlements.iter().find(|e| e.metric == metric)
    }
}
