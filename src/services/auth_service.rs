//! Magic-link login, user lookup and logout.

use tracing::{info, warn};

use crate::{
    dao::access::AccessError,
    dto::ws::{
        ActionResult, CompleteLoginRequest, MagicLinkRequest, OutboundEvent, ServerEvent,
        UserInfoPayload,
    },
    error::ServiceError,
    services::{
        coordinator::{Mutation, Outcome},
        display_service::auth_status,
    },
    state::{SharedState, display::StatePatch},
};

/// Ask the identity provider to email a magic link.
pub async fn request_magic_link(
    state: &SharedState,
    request: MagicLinkRequest,
) -> Result<Outcome, ServiceError> {
    state
        .access()
        .request_login_challenge(request.email.clone())
        .await?;
    info!(email = %request.email, "magic link requested");

    Ok(Outcome::event(OutboundEvent::new(
        ServerEvent::MagicLinkResult,
        &ActionResult::ok(),
    )))
}

/// Exchange a magic link for a credential, persist the refresh token and announce the login.
pub async fn complete_login(
    state: &SharedState,
    request: CompleteLoginRequest,
) -> Result<Outcome, ServiceError> {
    let refresh_token = state
        .access()
        .complete_login(request.email.clone(), request.magic_link)
        .await?;

    if let Err(err) = state.credentials().save(refresh_token).await {
        warn!(error = %err, "failed to persist refresh token");
    }
    info!(email = %request.email, "operator logged in");

    Ok(Outcome::mutate(
        Mutation::Display(StatePatch::authenticated(true)),
        vec![auth_status(true)],
    )
    .with_ack(OutboundEvent::new(ServerEvent::LoginResult, &ActionResult::ok())))
}

/// Describe the signed-in user. A missing credential is a normal answer, not an error.
///
/// The shared auth flag follows the answer, so a credential reloaded silently
/// or dropped by the identity provider is reflected on every display.
pub async fn user_info(state: &SharedState) -> Result<Outcome, ServiceError> {
    let payload = match state.access().user_info().await {
        Ok(user) => UserInfoPayload {
            authenticated: true,
            user_id: user.user_id,
            email: user.email,
        },
        Err(AccessError::Unauthenticated(reason)) => {
            info!(reason = %reason, "user info requested without credential");
            UserInfoPayload::anonymous()
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Outcome::mutate(
        Mutation::Authenticated(payload.authenticated),
        vec![OutboundEvent::new(ServerEvent::UserInfo, &payload)],
    ))
}

/// Forget the credential in memory and on disk.
pub async fn logout(state: &SharedState) -> Outcome {
    state.access().sign_out().await;
    if let Err(err) = state.credentials().delete().await {
        warn!(error = %err, "failed to delete persisted refresh token");
    }
    info!("operator logged out");

    Outcome::mutate(
        Mutation::Display(StatePatch::authenticated(false)),
        vec![auth_status(false)],
    )
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::services::test_support::{TestHarness, drain};

    const LOGIN: &str = r#"{"event":"complete_login","data":{"email":"ops@example.org","magic_link":"https://nexus.example/login?oobCode=abc123"}}"#;

    #[tokio::test]
    async fn login_persists_token_and_broadcasts_status() {
        let harness = TestHarness::new();
        harness.access.set_can_reload(false);
        let (a, mut a_rx) = harness.connect().await;
        let (_b, mut b_rx) = harness.connect().await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        harness.send(a, LOGIN).await;

        let replies = drain(&mut a_rx);
        assert_eq!(replies[0].event, "auth_status");
        assert_eq!(replies[0].data, json!({"authenticated": true}));
        assert_eq!(replies[1].event, "login_result");
        assert_eq!(replies[1].data, json!({"success": true}));

        let broadcast = drain(&mut b_rx);
        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].event, "auth_status");

        assert_eq!(harness.credentials.token().as_deref(), Some("refresh-token"));
        assert!(harness.state.display().get().await.authenticated);
    }

    #[tokio::test]
    async fn failed_login_is_reported_to_sender_only() {
        let harness = TestHarness::new();
        let (a, mut a_rx) = harness.connect().await;
        let (_b, mut b_rx) = harness.connect().await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        harness
            .send(
                a,
                r#"{"event":"complete_login","data":{"email":"ops@example.org","magic_link":"https://nexus.example/login"}}"#,
            )
            .await;

        let replies = drain(&mut a_rx);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].event, "login_result");
        assert_eq!(replies[0].data["success"], json!(false));
        assert!(replies[0].data["error"].is_string());
        assert!(drain(&mut b_rx).is_empty());
        assert!(!harness.state.display().get().await.authenticated);
    }

    #[tokio::test]
    async fn magic_link_request_replies_with_result() {
        let harness = TestHarness::new();
        let (a, mut a_rx) = harness.connect().await;
        drain(&mut a_rx);

        harness
            .send(a, r#"{"event":"request_magic_link","data":{"email":"ops@example.org"}}"#)
            .await;
        harness
            .send(a, r#"{"event":"request_magic_link","data":{"email":"nope"}}"#)
            .await;

        let replies = drain(&mut a_rx);
        assert_eq!(replies[0].data, json!({"success": true}));
        assert_eq!(replies[1].event, "magic_link_result");
        assert_eq!(replies[1].data["success"], json!(false));
        assert!(
            harness
                .access
                .calls()
                .contains(&"request_login_challenge:ops@example.org".to_string())
        );
    }

    #[tokio::test]
    async fn logout_then_user_info_is_anonymous_without_remote_call() {
        let harness = TestHarness::new();
        harness.credentials.seed("stored-refresh-token");
        let (a, mut a_rx) = harness.connect().await;
        let (_b, mut b_rx) = harness.connect().await;
        drain(&mut a_rx);
        drain(&mut b_rx);

        harness.send(a, r#"{"event":"logout"}"#).await;
        assert_eq!(drain(&mut b_rx)[0].data, json!({"authenticated": false}));
        assert_eq!(harness.credentials.token(), None);

        harness.send(a, r#"{"event":"request_user_info"}"#).await;

        let replies = drain(&mut a_rx);
        assert_eq!(replies.last().unwrap().event, "user_info");
        assert_eq!(replies.last().unwrap().data, json!({"authenticated": false}));
        assert!(!harness.access.calls().contains(&"lookup_user".to_string()));
    }

    #[tokio::test]
    async fn user_info_reports_signed_in_user() {
        let harness = TestHarness::new();
        let (a, mut a_rx) = harness.connect().await;
        drain(&mut a_rx);

        harness.send(a, r#"{"event":"request_user_info"}"#).await;

        let replies = drain(&mut a_rx);
        let reply = replies.last().unwrap();
        assert_eq!(reply.event, "user_info");
        assert_eq!(
            reply.data,
            json!({"authenticated": true, "user_id": "uid-1", "email": "ops@example.org"})
        );
    }

    #[tokio::test]
    async fn silent_reload_during_user_info_marks_displays_authenticated() {
        let harness = TestHarness::new();
        let (a, mut a_rx) = harness.connect().await;
        let (_b, mut b_rx) = harness.connect().await;
        drain(&mut a_rx);
        drain(&mut b_rx);
        assert!(!harness.state.display().get().await.authenticated);

        harness.send(a, r#"{"event":"request_user_info"}"#).await;

        assert!(harness.access.calls().contains(&"reload".to_string()));
        assert!(harness.state.display().get().await.authenticated);
        let replies = drain(&mut a_rx);
        assert_eq!(replies[0].event, "auth_status");
        assert_eq!(replies[1].event, "user_info");
        let others = drain(&mut b_rx);
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].data, json!({"authenticated": true}));

        harness.send(a, r#"{"event":"request_user_info"}"#).await;
        assert!(drain(&mut b_rx).is_empty());
    }
}
