use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use utoipa::ToSchema;

/// Default region selected when no config has been persisted yet.
pub const DEFAULT_REGION: &str = "socal";
/// Default event selected when no config has been persisted yet.
pub const DEFAULT_EVENT_ID: &str = "demo";

/// Event selection mirrored to the on-disk display config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventSelection {
    /// Region key in the remote database (e.g. `socal`).
    pub region: String,
    /// Event key inside the region.
    pub event_id: String,
    /// Human readable event name, when it could be resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

impl Default for EventSelection {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            event_id: DEFAULT_EVENT_ID.to_string(),
            event_name: None,
        }
    }
}

/// Per-team score projection computed from the raw team records of an event.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct TeamScoreSummary {
    /// Key of the team record in the remote database.
    pub team_id: String,
    /// Team number as stored remotely, or the record key when absent.
    #[schema(value_type = Object)]
    pub team_number: Value,
    /// Team name, empty when missing.
    pub name: String,
    /// Raw score samples, passed through untouched.
    #[schema(value_type = Object)]
    pub scores: Value,
    /// Best numeric sample, `0` without samples.
    pub high_score: f64,
    /// Mean of the numeric samples, `0` without samples.
    pub average_score: f64,
    /// Number of numeric samples.
    pub total_rounds: usize,
}

impl TeamScoreSummary {
    fn from_record(team_id: &str, record: &Map<String, Value>) -> Self {
        let team_number = record
            .get("teamNumber")
            .filter(|value| !value.is_null())
            .cloned()
            .unwrap_or_else(|| Value::String(team_id.to_string()));
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let scores = record
            .get("scores")
            .filter(|value| !value.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let samples = numeric_samples(&scores);
        let (high_score, average_score) = if samples.is_empty() {
            (0.0, 0.0)
        } else {
            let high = samples.iter().copied().fold(f64::MIN, f64::max);
            let average = samples.iter().sum::<f64>() / samples.len() as f64;
            (high, average)
        };

        Self {
            team_id: team_id.to_string(),
            team_number,
            name,
            scores,
            high_score,
            average_score,
            total_rounds: samples.len(),
        }
    }
}

/// Extract the numeric score samples from either a keyed object or a list.
fn numeric_samples(scores: &Value) -> Vec<f64> {
    match scores {
        Value::Object(map) => map.values().filter_map(Value::as_f64).collect(),
        Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
        _ => Vec::new(),
    }
}

/// Project the raw `teams` node of an event into score summaries, keeping source order.
///
/// Anything that is not an object keyed by team id yields an empty list, and
/// entries that are not objects are skipped.
pub fn summarize_teams(raw: &Value) -> Vec<TeamScoreSummary> {
    let Some(teams) = raw.as_object() else {
        return Vec::new();
    };

    teams
        .iter()
        .filter_map(|(team_id, record)| {
            record
                .as_object()
                .map(|record| TeamScoreSummary::from_record(team_id, record))
        })
        .collect()
}

/// One row of the event schedule derived from a raw session record.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct ScheduleEntry {
    /// Key of the session record.
    pub session_id: String,
    /// Start time as stored remotely; `None` when missing or unparsable.
    #[schema(value_type = Option<f64>)]
    pub time: Option<Number>,
    /// Teams playing in the session, as stored remotely.
    #[schema(value_type = Object)]
    pub teams: Value,
    /// Whether the session is a practice round.
    pub is_practice: bool,
    /// Session flag as stored remotely; `true` when missing.
    pub is_session: bool,
}

impl ScheduleEntry {
    /// Order by start time, earliest first. Entries without a time sort last.
    pub fn cmp_by_time(&self, other: &Self) -> Ordering {
        let key = |entry: &Self| entry.time.as_ref().and_then(Number::as_f64);
        match (key(self), key(other)) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }

    fn from_record(session_id: &str, record: &Map<String, Value>) -> Self {
        Self {
            session_id: session_id.to_string(),
            time: record.get("time").and_then(parse_time),
            teams: record
                .get("teams")
                .filter(|value| !value.is_null())
                .cloned()
                .unwrap_or_else(|| Value::Array(Vec::new())),
            is_practice: record
                .get("isPractice")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            is_session: record
                .get("isSession")
                .and_then(Value::as_bool)
                .unwrap_or(true),
        }
    }
}

fn parse_time(value: &Value) -> Option<Number> {
    match value {
        Value::Number(number) => Some(number.clone()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Project the raw `games/sessions` node of an event into schedule entries (unsorted).
pub fn project_schedule(raw: &Value) -> Vec<ScheduleEntry> {
    let Some(sessions) = raw.as_object() else {
        return Vec::new();
    };

    sessions
        .iter()
        .filter_map(|(session_id, record)| {
            record
                .as_object()
                .map(|record| ScheduleEntry::from_record(session_id, record))
        })
        .collect()
}

/// Identity of the signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Identity provider user id (`localId`).
    pub user_id: Option<String>,
    /// Email address of the account.
    pub email: Option<String>,
}

impl UserInfo {
    /// Pick the first user record out of an `accounts:lookup` response.
    pub fn from_lookup(raw: &Value) -> Self {
        let user = raw
            .get("users")
            .and_then(Value::as_array)
            .and_then(|users| users.first());
        let field = |name: &str| {
            user.and_then(|user| user.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Self {
            user_id: field("localId"),
            email: field("email"),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn summary_without_samples_is_zeroed() {
        let raw = json!({ "t1": { "teamNumber": 101, "name": "Bots", "scores": {} } });
        let summaries = summarize_teams(&raw);

        assert_eq!(summaries.len(), 1);
        let team = &summaries[0];
        assert_eq!(team.team_id, "t1");
        assert_eq!(team.team_number, json!(101));
        assert_eq!(team.high_score, 0.0);
        assert_eq!(team.average_score, 0.0);
        assert_eq!(team.total_rounds, 0);
    }

    #[test]
    fn summary_skips_non_numeric_samples() {
        let raw = json!({ "t1": { "name": "Bots", "scores": { "a": 10, "b": 20, "c": "x" } } });
        let team = &summarize_teams(&raw)[0];

        assert_eq!(team.high_score, 20.0);
        assert_eq!(team.average_score, 15.0);
        assert_eq!(team.total_rounds, 2);
    }

    #[test]
    fn summary_accepts_score_lists_and_defaults_missing_fields() {
        let raw = json!({ "t9": { "scores": [5, 7.5, null] } });
        let team = &summarize_teams(&raw)[0];

        assert_eq!(team.team_number, json!("t9"));
        assert_eq!(team.name, "Unknown");
        assert_eq!(team.high_score, 7.5);
        assert_eq!(team.total_rounds, 2);
    }

    #[test]
    fn summary_keeps_source_order_and_skips_invalid_records() {
        let raw = json!({
            "zeta": { "name": "Z" },
            "alpha": "not a team",
            "mid": { "name": "M", "scores": null }
        });
        let ids: Vec<_> = summarize_teams(&raw)
            .into_iter()
            .map(|team| team.team_id)
            .collect();

        assert_eq!(ids, vec!["zeta", "mid"]);
        assert!(summarize_teams(&Value::Null).is_empty());
        assert!(summarize_teams(&json!([1, 2])).is_empty());
    }

    #[test]
    fn schedule_projection_reads_session_flags() {
        let raw = json!({
            "s1": { "time": 30, "teams": ["101", "102"], "isPractice": true },
            "s2": { "time": "10", "isSession": false },
            "s3": { "teams": { "a": "103" } }
        });
        let entries = project_schedule(&raw);

        assert_eq!(entries[0].time, Some(Number::from(30)));
        assert!(entries[0].is_practice);
        assert!(entries[0].is_session);
        assert_eq!(entries[1].time, Some(Number::from(10)));
        assert!(!entries[1].is_session);
        assert_eq!(entries[1].teams, json!([]));
        assert_eq!(entries[2].time, None);
    }

    #[test]
    fn fractional_times_are_kept_verbatim() {
        let entries = project_schedule(&json!({
            "late": { "time": 10.7 },
            "early": { "time": "10.2" }
        }));

        assert_eq!(entries[0].time, Number::from_f64(10.7));
        assert_eq!(entries[1].time, Number::from_f64(10.2));
        assert_eq!(entries[0].cmp_by_time(&entries[1]), Ordering::Greater);
    }

    #[test]
    fn user_info_reads_first_record() {
        let raw = json!({ "users": [{ "localId": "uid-1", "email": "ref@example.org" }] });
        let info = UserInfo::from_lookup(&raw);

        assert_eq!(info.user_id.as_deref(), Some("uid-1"));
        assert_eq!(info.email.as_deref(), Some("ref@example.org"));
        assert_eq!(UserInfo::from_lookup(&json!({})).email, None);
    }
}
