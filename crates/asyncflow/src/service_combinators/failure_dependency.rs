use std::sync::Arc;

use crate::events::ServiceListener;
use crate::service::{Service, ServiceState};

/// One-way dependency: whenever `dependee` transitions to FAILED, `dependent`
/// is failed with `dependee`'s own cause. Unlike
/// [`crate::service_combinators::chain`] this does not drive `dependent`'s
/// start/stop, only its failure.
pub fn set_failure_dependency(dependee: &Arc<Service>, dependent: Arc<Service>) -> u64 {
    let dependee_for_cause = dependee.clone();
    dependee.add_listener(ServiceListener::Callback(Box::new(move |_from, to| {
        if to != ServiceState::Failed {
            return;
        }
        let dependent = dependent.clone();
        let cause = dependee_for_cause
            .failure_cause()
            .map(|c| anyhow::anyhow!("{c}"))
            .unwrap_or_else(|| anyhow::anyhow!("dependee service failed"));
        tokio::spawn(async move {
            dependent.notify_service_failed(cause).await;
        });
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::NopHooks;
    use std::time::Duration;

    #[tokio::test]
    async fn dependent_fails_when_dependee_fails() {
        let dependee = Arc::new(Service::new("dependee", NopHooks));
        let dependent = Arc::new(Service::new("dependent", NopHooks));
        set_failure_dependency(&dependee, dependent.clone());

        dependee.start().await.unwrap();
        dependent.start().await.unwrap();
        dependee
            .notify_service_failed(anyhow::anyhow!("dependee fault"))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(dependent.state(), ServiceState::Failed);
        assert!(dependent
            .failure_cause()
            .unwrap()
            .to_string()
            .contains("dependee fault"));
    }

    #[tokio::test]
    async fn dependee_success_does_not_touch_dependent() {
        let dependee = Arc::new(Service::new("dependee", NopHooks));
        let dependent = Arc::new(Service::new("dependent", NopHooks));
        set_failure_dependency(&dependee, dependent.clone());

        dependee.start().await.unwrap();
        dependent.start().await.unwrap();
        dependee.stop().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(dependent.state(), ServiceState::Running);
    }
}
