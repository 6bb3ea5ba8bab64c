use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::{
    dao::models::EventSelection,
    state::{SharedState, display::StateChange},
};

/// Start mirroring event selection changes to the selection store.
///
/// The subscription is taken before the task is spawned, so no change applied
/// after this call returns is missed.
pub fn spawn(state: SharedState) -> JoinHandle<()> {
    let changes = state.display().subscribe();
    tokio::spawn(run(state, changes))
}

/// Save the selection every time a change touches it. Failures are logged and dropped.
pub async fn run(state: SharedState, mut changes: broadcast::Receiver<StateChange>) {
    loop {
        match changes.recv().await {
            Ok(change) if change.touches_selection() => {
                save(&state, change.snapshot.selection()).await;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "selection mirror lagged behind; saving current selection");
                let selection = state.display().get().await.selection();
                save(&state, selection).await;
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn save(state: &SharedState, selection: EventSelection) {
    match state.selection_store().save(selection.clone()).await {
        Ok(()) => debug!(
            region = %selection.region,
            event_id = %selection.event_id,
            "event selection saved"
        ),
        Err(err) => warn!(error = %err, "failed to persist event selection"),
    }
}
