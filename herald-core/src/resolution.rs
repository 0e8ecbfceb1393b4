//! Preference resolution.
//!
//! A target resolves for a recipient by checking the recipient's own
//! overrides first and the project defaults second, each in order of topic
//! specificity. When nothing matches the recipient is opted in.
//!
//! Two entry points share the same order: [`resolve_for_recipient`] for a
//! single recipient (direct sends, preference checks) and
//! [`list_eligible_recipients`] which evaluates every recipient of a project
//! in one query (broadcasts).

use crate::framework::{DatabaseAccessor, DatabaseProcessor};
use compact_str::CompactString;
use herald_sdk::objects::preference::PreferenceState;
use herald_sdk::objects::{TOPIC_ANY, TOPIC_NONE, Target};
use kanau::processor::Processor;

/// Topics a preference may carry to match `target`, most specific first.
///
/// A concrete topic is matched exactly, then by the `any` wildcard. The
/// reserved topics only ever match themselves.
pub fn topic_order(target: &Target) -> Vec<&str> {
    if target.topic == TOPIC_NONE {
        vec![TOPIC_NONE]
    } else if target.topic == TOPIC_ANY {
        vec![TOPIC_ANY]
    } else {
        vec![target.topic.as_str(), TOPIC_ANY]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Recipient,
    Project,
}

/// A stored preference that matches the target's channel and event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub scope: Scope,
    pub topic: CompactString,
    pub enabled: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct CandidateRow {
    recipient_external_id: Option<String>,
    topic: CompactString,
    enabled: bool,
}

impl From<CandidateRow> for Candidate {
    fn from(row: CandidateRow) -> Self {
        Candidate {
            scope: if row.recipient_external_id.is_some() {
                Scope::Recipient
            } else {
                Scope::Project
            },
            topic: row.topic,
            enabled: row.enabled,
        }
    }
}

/// Outcome of resolving one target for one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub enabled: bool,
    /// `true` unless a recipient override decided the outcome.
    pub inherited: bool,
}

impl From<Resolution> for PreferenceState {
    fn from(value: Resolution) -> Self {
        PreferenceState {
            enabled: value.enabled,
            inherited: value.inherited,
        }
    }
}

/// Resolve `target` against the candidates of one recipient.
pub fn resolve(candidates: &[Candidate], target: &Target) -> Resolution {
    let topics = topic_order(target);
    for scope in [Scope::Recipient, Scope::Project] {
        for topic in &topics {
            if let Some(found) = candidates
                .iter()
                .find(|c| c.scope == scope && c.topic == *topic)
            {
                return Resolution {
                    enabled: found.enabled,
                    inherited: scope == Scope::Project,
                };
            }
        }
    }
    Resolution {
        enabled: true,
        inherited: true,
    }
}

async fn fetch_candidates<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    project_id: i64,
    external_id: &str,
    target: &Target,
) -> Result<Vec<Candidate>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CandidateRow>(
        r#"
        SELECT recipient_external_id, topic, enabled
        FROM preferences
        WHERE project_id = $1
          AND channel = $2
          AND event = $3
          AND topic = ANY($4)
          AND (recipient_external_id IS NULL OR recipient_external_id = $5)
        "#,
    )
    .bind(project_id)
    .bind(target.channel.as_str())
    .bind(target.event.as_str())
    .bind(topic_order(target))
    .bind(external_id)
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().map(Candidate::from).collect())
}

/// Resolve `target` for one recipient, on the pool or inside a transaction.
///
/// `external_id` must already be normalized.
pub async fn resolve_for_recipient(
    db: &mut impl DatabaseAccessor,
    project_id: i64,
    external_id: &str,
    target: &Target,
) -> Result<Resolution, sqlx::Error> {
    let candidates = fetch_candidates(db.acquire(), project_id, external_id, target).await?;
    Ok(resolve(&candidates, target))
}

#[derive(Debug, Clone)]
pub struct ResolvePreference {
    pub project_id: i64,
    pub external_id: String,
    pub target: Target,
}

impl Processor<ResolvePreference> for DatabaseProcessor {
    type Output = Resolution;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ResolvePreference")]
    async fn process(&self, query: ResolvePreference) -> Result<Resolution, sqlx::Error> {
        let candidates =
            fetch_candidates(&self.pool, query.project_id, &query.external_id, &query.target)
                .await?;
        Ok(resolve(&candidates, &query.target))
    }
}

/// External ids of every recipient in the project for whom `target`
/// resolves to enabled, in creation order.
///
/// Each recipient's most specific override is picked with `DISTINCT ON`, the
/// project default is looked up once, and recipients fall back to it (or to
/// opted in) when they have no override.
pub async fn list_eligible_recipients<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    project_id: i64,
    target: &Target,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        WITH recipient_override AS (
            SELECT DISTINCT ON (recipient_external_id) recipient_external_id, enabled
            FROM preferences
            WHERE project_id = $1
              AND recipient_external_id IS NOT NULL
              AND channel = $2
              AND event = $3
              AND topic = ANY($4)
            ORDER BY recipient_external_id, array_position($4::text[], topic::text)
        ),
        project_default AS (
            SELECT enabled
            FROM preferences
            WHERE project_id = $1
              AND recipient_external_id IS NULL
              AND channel = $2
              AND event = $3
              AND topic = ANY($4)
            ORDER BY array_position($4::text[], topic::text)
            LIMIT 1
        )
        SELECT r.external_id
        FROM recipients r
        LEFT JOIN recipient_override o ON o.recipient_external_id = r.external_id
        WHERE r.project_id = $1
          AND COALESCE(o.enabled, (SELECT enabled FROM project_default), TRUE)
        ORDER BY r.id
        "#,
    )
    .bind(project_id)
    .bind(target.channel.as_str())
    .bind(target.event.as_str())
    .bind(topic_order(target))
    .fetch_all(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipient(topic: &str, enabled: bool) -> Candidate {
        Candidate {
            scope: Scope::Recipient,
            topic: topic.into(),
            enabled,
        }
    }

    fn project(topic: &str, enabled: bool) -> Candidate {
        Candidate {
            scope: Scope::Project,
            topic: topic.into(),
            enabled,
        }
    }

    fn target(topic: &str) -> Target {
        Target::new("posts", topic, "new_comment")
    }

    #[test]
    fn test_topic_order() {
        assert_eq!(topic_order(&target("rust")), vec!["rust", "any"]);
        assert_eq!(topic_order(&target("none")), vec!["none"]);
        assert_eq!(topic_order(&target("any")), vec!["any"]);
    }

    #[test]
    fn test_no_preferences_opts_in() {
        let resolution = resolve(&[], &target("rust"));
        assert_eq!(
            resolution,
            Resolution {
                enabled: true,
                inherited: true
            }
        );
    }

    #[test]
    fn test_recipient_override_beats_project_default() {
        for (default, override_) in [(true, false), (false, true)] {
            let candidates = [project("rust", default), recipient("rust", override_)];
            let resolution = resolve(&candidates, &target("rust"));
            assert_eq!(resolution.enabled, override_);
            assert!(!resolution.inherited);
        }
    }

    #[test]
    fn test_recipient_wildcard_beats_exact_project_default() {
        let candidates = [project("rust", true), recipient("any", false)];
        let resolution = resolve(&candidates, &target("rust"));
        assert!(!resolution.enabled);
        assert!(!resolution.inherited);
    }

    #[test]
    fn test_exact_override_beats_wildcard_override() {
        let candidates = [recipient("any", false), recipient("rust", true)];
        assert!(resolve(&candidates, &target("rust")).enabled);
        // Other topics still follow the wildcard.
        assert!(!resolve(&candidates, &target("go")).enabled);
    }

    #[test]
    fn test_wildcard_project_default_mutes_concrete_topic() {
        let candidates = [project("any", false)];
        let resolution = resolve(&candidates, &target("new_comment"));
        assert_eq!(
            resolution,
            Resolution {
                enabled: false,
                inherited: true
            }
        );
    }

    #[test]
    fn test_none_topic_only_matches_none() {
        let candidates = [recipient("any", false), project("none", false)];
        // A topicless target ignores the `any` wildcard and falls to the
        // project's `none` default.
        let resolution = resolve(&candidates, &target("none"));
        assert!(!resolution.enabled);
        assert!(resolution.inherited);

        // A concrete topic never matches a `none` preference.
        let candidates = [project("none", false)];
        assert!(resolve(&candidates, &target("rust")).enabled);
    }

    #[test]
    fn test_deleted_override_falls_back_to_project_default() {
        let mut candidates = vec![project("rust", false), recipient("rust", true)];
        assert!(resolve(&candidates, &target("rust")).enabled);
        candidates.retain(|c| c.scope != Scope::Recipient);
        let resolution = resolve(&candidates, &target("rust"));
        assert!(!resolution.enabled);
        assert!(resolution.inherited);
    }
}
