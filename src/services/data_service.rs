//! On-demand reads of remote competition data and the shaping applied to them.

use std::time::SystemTime;

use serde_json::Value;
use tracing::{info, warn};

use crate::{
    dao::models::{ScheduleEntry, TeamScoreSummary, project_schedule},
    dto::{
        format_system_time,
        ws::{
            EventsList, LoadEventsRequest, OutboundEvent, RankingsData, RegionsList, ScheduleData,
            ScoresData, ServerEvent, SessionMatches, SessionMatchesRequest, TeamName,
            TeamNameRequest, normalize_team_number,
        },
    },
    error::ServiceError,
    services::coordinator::Outcome,
    state::SharedState,
};

const NO_EVENTS: &str = "No events found or unable to access events list";

/// List the events of a region. Failures are answered with an explicit "no events" marker.
pub async fn load_events(state: &SharedState, request: LoadEventsRequest) -> Outcome {
    let region = match request.region {
        Some(region) => region,
        None => state.display().get().await.region,
    };

    let payload = match state.access().region_events(region.clone()).await {
        Ok(Value::Object(events)) if !events.is_empty() => {
            info!(region = %region, count = events.len(), "loaded events");
            EventsList::Events {
                events: Value::Object(events),
                region,
            }
        }
        Ok(_) => EventsList::Unavailable {
            error: NO_EVENTS.to_string(),
        },
        Err(err) => {
            warn!(region = %region, error = %err, "failed to load events");
            EventsList::Unavailable {
                error: err.to_string(),
            }
        }
    };
    Outcome::event(OutboundEvent::new(ServerEvent::EventsList, &payload))
}

/// Regions known to the remote database.
pub async fn list_regions(state: &SharedState) -> Result<Outcome, ServiceError> {
    let regions = state.access().list_regions().await?;
    Ok(Outcome::event(OutboundEvent::new(
        ServerEvent::RegionsList,
        &RegionsList { regions },
    )))
}

/// Team summaries of the selected event, ranked by high score.
pub async fn rankings(state: &SharedState) -> Result<Outcome, ServiceError> {
    let teams = selected_event_teams(state).await?;
    let rankings = rank_teams(teams);
    info!(teams = rankings.len(), "rankings refreshed");

    Ok(Outcome::event(OutboundEvent::new(
        ServerEvent::RankingsData,
        &RankingsData {
            rankings,
            updated_at: format_system_time(SystemTime::now()),
        },
    )))
}

/// Sessions of the selected event, earliest first.
pub async fn schedule(state: &SharedState) -> Result<Outcome, ServiceError> {
    let selected = state.display().get().await;
    let sessions = state
        .access()
        .event_sessions(selected.region, selected.event_id)
        .await?;
    let schedule = sort_schedule(project_schedule(&sessions));

    Ok(Outcome::event(OutboundEvent::new(
        ServerEvent::ScheduleData,
        &ScheduleData { schedule },
    )))
}

/// Team summaries of the selected event in source order.
pub async fn scores(state: &SharedState) -> Result<Outcome, ServiceError> {
    let scores = selected_event_teams(state).await?;
    Ok(Outcome::event(OutboundEvent::new(
        ServerEvent::ScoresData,
        &ScoresData { scores },
    )))
}

/// Matches of one session of the selected event.
pub async fn session_matches(
    state: &SharedState,
    request: SessionMatchesRequest,
) -> Result<Outcome, ServiceError> {
    let selected = state.display().get().await;
    let matches = state
        .access()
        .session_matches(selected.region, selected.event_id, request.session_id.clone())
        .await?;

    Ok(Outcome::event(OutboundEvent::new(
        ServerEvent::SessionMatches,
        &SessionMatches {
            session_id: request.session_id,
            matches,
        },
    )))
}

/// Resolve a team number to its name, defaulting to `Team {number}` when unknown.
pub async fn team_name(
    state: &SharedState,
    request: TeamNameRequest,
) -> Result<Outcome, ServiceError> {
    let team_number = request.normalized();
    let teams = selected_event_teams(state).await?;
    let name = find_team_name(&teams, &team_number)
        .unwrap_or_else(|| format!("Team {team_number}"));

    Ok(Outcome::event(OutboundEvent::new(
        ServerEvent::TeamName,
        &TeamName { team_number, name },
    )))
}

async fn selected_event_teams(state: &SharedState) -> Result<Vec<TeamScoreSummary>, ServiceError> {
    let selected = state.display().get().await;
    Ok(state
        .access()
        .team_scores_summary(selected.region, selected.event_id)
        .await?)
}

/// Sort by high score, highest first. Teams with equal scores keep their source order.
fn rank_teams(mut teams: Vec<TeamScoreSummary>) -> Vec<TeamScoreSummary> {
    teams.sort_by(|a, b| b.high_score.total_cmp(&a.high_score));
    teams
}

/// Sort by start time; entries without a time go last in source order.
fn sort_schedule(mut schedule: Vec<ScheduleEntry>) -> Vec<ScheduleEntry> {
    schedule.sort_by(ScheduleEntry::cmp_by_time);
    schedule
}

fn find_team_name(teams: &[TeamScoreSummary], team_number: &str) -> Option<String> {
    teams
        .iter()
        .find(|team| normalize_team_number(&team.team_number).as_deref() == Some(team_number))
        .map(|team| team.name.clone())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        dao::models::summarize_teams,
        services::test_support::{TestHarness, drain},
    };

    #[test]
    fn ranking_is_stable_for_equal_scores() {
        let teams = summarize_teams(&json!({
            "T1": {"teamNumber": 1, "scores": {"r1": 30}},
            "T2": {"teamNumber": 2, "scores": {"r1": 50}},
            "T3": {"teamNumber": 3, "scores": {"r1": 50}}
        }));

        let ranked: Vec<_> = rank_teams(teams).into_iter().map(|t| t.team_id).collect();
        assert_eq!(ranked, ["T2", "T3", "T1"]);
    }

    #[test]
    fn schedule_is_sorted_by_time_with_untimed_last() {
        let schedule = project_schedule(&json!({
            "s30": {"time": 30},
            "none": {},
            "s10": {"time": 10},
            "s20": {"time": "20"}
        }));

        let ordered: Vec<_> = sort_schedule(schedule)
            .into_iter()
            .map(|entry| entry.session_id)
            .collect();
        assert_eq!(ordered, ["s10", "s20", "s30", "none"]);
    }

    #[test]
    fn fractional_times_keep_their_order_and_value() {
        let schedule = project_schedule(&json!({
            "late": {"time": 10.7},
            "whole": {"time": 10},
            "early": {"time": 10.2}
        }));

        let ordered: Vec<_> = sort_schedule(schedule)
            .into_iter()
            .map(|entry| (entry.session_id, entry.time.and_then(|time| time.as_f64())))
            .collect();
        assert_eq!(
            ordered,
            [
                ("whole".to_string(), Some(10.0)),
                ("early".to_string(), Some(10.2)),
                ("late".to_string(), Some(10.7)),
            ]
        );
    }

    #[test]
    fn team_numbers_compare_as_strings() {
        let teams = summarize_teams(&json!({
            "a": {"teamNumber": 1234, "name": "Gear Grinders"},
            "b": {"teamNumber": "42", "name": "Brick Wizards"}
        }));

        assert_eq!(find_team_name(&teams, "1234").as_deref(), Some("Gear Grinders"));
        assert_eq!(find_team_name(&teams, "42").as_deref(), Some("Brick Wizards"));
        assert_eq!(find_team_name(&teams, "7"), None);
    }

    #[tokio::test]
    async fn rankings_are_broadcast_with_timestamp() {
        let harness = TestHarness::new();
        harness.access.set_teams(json!({
            "T1": {"teamNumber": 1, "name": "One", "scores": {"r1": 30}},
            "T2": {"teamNumber": 2, "name": "Two", "scores": {"r1": 50}},
            "T3": {"teamNumber": 3, "name": "Three", "scores": {"r1": 50}}
        }));
        let (a, mut a_rx) = harness.connect().await;
        let (_b, mut b_rx) = harness.connect().await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        harness.send(a, r#"{"event":"request_rankings"}"#).await;

        for rx in [&mut a_rx, &mut b_rx] {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].event, "rankings_data");
            let names: Vec<_> = events[0].data["rankings"]
                .as_array()
                .unwrap()
                .iter()
                .map(|team| team["name"].as_str().unwrap().to_string())
                .collect();
            assert_eq!(names, ["Two", "Three", "One"]);
            assert!(events[0].data["updated_at"].is_string());
        }
    }

    #[tokio::test]
    async fn schedule_and_scores_reply_to_sender_only() {
        let harness = TestHarness::new();
        harness.access.set_sessions(json!({
            "late": {"time": 30, "teams": [1, 2]},
            "early": {"time": 10, "isPractice": true},
            "middle": {"time": 20}
        }));
        harness.access.set_teams(json!({"T1": {"teamNumber": 1, "scores": {}}}));
        let (a, mut a_rx) = harness.connect().await;
        let (_b, mut b_rx) = harness.connect().await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        harness.send(a, r#"{"event":"request_schedule"}"#).await;
        harness.send(a, r#"{"event":"request_scores"}"#).await;

        let replies = drain(&mut a_rx);
        assert_eq!(replies[0].event, "schedule_data");
        let times: Vec<_> = replies[0].data["schedule"]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["time"].as_i64().unwrap())
            .collect();
        assert_eq!(times, [10, 20, 30]);

        assert_eq!(replies[1].event, "scores_data");
        assert_eq!(replies[1].data["scores"][0]["high_score"], json!(0.0));
        assert_eq!(replies[1].data["scores"][0]["total_rounds"], json!(0));
        assert!(drain(&mut b_rx).is_empty());
    }

    #[tokio::test]
    async fn load_events_reports_no_events_marker() {
        let harness = TestHarness::new();
        let (a, mut a_rx) = harness.connect().await;
        drain(&mut a_rx);

        harness.send(a, r#"{"event":"load_events","data":{"region":"socal"}}"#).await;
        let replies = drain(&mut a_rx);
        assert_eq!(replies[0].event, "events_list");
        assert_eq!(replies[0].data, json!({"error": NO_EVENTS}));

        harness.access.set_events(json!({"demo": {"name": "Demo"}}));
        harness.send(a, r#"{"event":"load_events"}"#).await;
        let replies = drain(&mut a_rx);
        assert_eq!(
            replies[0].data,
            json!({"events": {"demo": {"name": "Demo"}}, "region": "socal"})
        );
    }

    #[tokio::test]
    async fn load_events_never_replies_with_a_bare_error() {
        let harness = TestHarness::new();
        harness.access.set_can_reload(false);
        let (a, mut a_rx) = harness.connect().await;
        drain(&mut a_rx);

        harness.send(a, r#"{"event":"load_events"}"#).await;

        let replies = drain(&mut a_rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].event, "events_list");
        assert!(replies[0].data["error"].is_string());
    }

    #[tokio::test]
    async fn unknown_team_number_falls_back_to_generic_name() {
        let harness = TestHarness::new();
        harness
            .access
            .set_teams(json!({"a": {"teamNumber": 1234, "name": "Gear Grinders"}}));
        let (a, mut a_rx) = harness.connect().await;
        drain(&mut a_rx);

        harness
            .send(a, r#"{"event":"request_team_name","data":{"team_number":1234}}"#)
            .await;
        harness
            .send(a, r#"{"event":"request_team_name","data":{"team_number":"99"}}"#)
            .await;

        let replies = drain(&mut a_rx);
        assert_eq!(replies[0].data, json!({"team_number": "1234", "name": "Gear Grinders"}));
        assert_eq!(replies[1].data, json!({"team_number": "99", "name": "Team 99"}));
    }

    #[tokio::test]
    async fn regions_and_session_matches_use_current_selection() {
        let harness = TestHarness::new();
        harness.access.set_regions(vec!["norcal".into(), "socal".into()]);
        harness.access.set_matches(json!({"m1": {"table": 1}}));
        let (a, mut a_rx) = harness.connect().await;
        drain(&mut a_rx);

        harness.send(a, r#"{"event":"list_regions"}"#).await;
        harness
            .send(a, r#"{"event":"request_session_matches","data":{"session_id":"s-1"}}"#)
            .await;

        let replies = drain(&mut a_rx);
        assert_eq!(replies[0].data, json!({"regions": ["norcal", "socal"]}));
        assert_eq!(
            replies[1].data,
            json!({"session_id": "s-1", "matches": {"m1": {"table": 1}}})
        );
        assert!(
            harness
                .access
                .calls()
                .contains(&"session_matches:socal/demo/s-1".to_string())
        );
    }
}
