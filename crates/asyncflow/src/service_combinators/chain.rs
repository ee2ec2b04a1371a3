use std::sync::Arc;

use crate::events::ServiceListener;
use crate::service::{Service, ServiceState};

/// Chains `follower` to `leader`'s lifecycle: `leader` reaching RUNNING
/// starts `follower`, `leader` reaching STOPPED stops `follower`, and
/// `leader` reaching FAILED fails `follower` with a derived cause. Returns a
/// listener id usable with [`unchain`].
pub fn chain(leader: &Service, follower: Arc<Service>) -> u64 {
    let follower_for_run = follower.clone();
    let follower_for_stop = follower.clone();
    leader.add_listener(ServiceListener::Callback(Box::new(move |_from, to| {
        match to {
            ServiceState::Running => {
                let follower = follower_for_run.clone();
                tokio::spawn(async move {
                    let _ = follower.start().await;
                });
            }
            ServiceState::Stopped => {
                let follower = follower_for_stop.clone();
                tokio::spawn(async move {
                    follower.stop().await;
                });
            }
            ServiceState::Failed => {
                let follower = follower.clone();
                tokio::spawn(async move {
                    follower
                        .notify_service_failed(anyhow::anyhow!("leader service failed"))
                        .await;
                });
            }
        }
    })))
}

/// Removes a chain installed by [`chain`].
pub fn unchain(leader: &Service, listener_id: u64) {
    leader.remove_listener(listener_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::NopHooks;
    use std::time::Duration;

    #[tokio::test]
    async fn follower_tracks_leader_transitions() {
        let leader = Arc::new(Service::new("leader", NopHooks));
        let follower = Arc::new(Service::new("follower", NopHooks));
        let id = chain(&leader, follower.clone());

        leader.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(follower.state(), ServiceState::Running);

        leader.stop().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(follower.state(), ServiceState::Stopped);

        unchain(&leader, id);
    }

    #[tokio::test]
    async fn follower_fails_when_leader_fails() {
        let leader = Arc::new(Service::new("leader", NopHooks));
        let follower = Arc::new(Service::new("follower", NopHooks));
        chain(&leader, follower.clone());

        leader.start().await.unwrap();
        follower.start().await.unwrap();
        leader
            .notify_service_failed(anyhow::anyhow!("leader fault"))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(follower.state(), ServiceState::Failed);
    }
}
