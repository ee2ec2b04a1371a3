use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::events::ServiceListener;
use crate::service::{Service, ServiceHooks, ServiceState};

struct CompositeHooks {
    members: Vec<Arc<Service>>,
    owner: Mutex<Option<Weak<Service>>>,
    watcher_ids: Mutex<Vec<(Arc<Service>, u64)>>,
    strict_stop: bool,
}

impl CompositeHooks {
    fn install_watchers(&self) {
        let Some(owner_weak) = self.owner.lock().clone() else {
            return;
        };
        let mut ids = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let owner_weak = owner_weak.clone();
            let member_for_cause = member.clone();
            let id = member.add_listener(ServiceListener::Callback(Box::new(move |from, to| {
                let Some(owner) = owner_weak.upgrade() else {
                    return;
                };
                match to {
                    ServiceState::Failed => {
                        let cause = member_for_cause
                            .failure_cause()
                            .map(|c| anyhow::anyhow!("{c}"))
                            .unwrap_or_else(|| anyhow::anyhow!("member service failed"));
                        tokio::spawn(async move {
                            owner.notify_service_failed(cause).await;
                        });
                    }
                    ServiceState::Stopped if from == ServiceState::Running => {
                        if owner.is_running() {
                            tokio::spawn(async move {
                                owner.stop().await;
                            });
                        }
                    }
                    _ => {}
                }
            })));
            ids.push((member.clone(), id));
        }
        *self.watcher_ids.lock() = ids;
    }

    fn remove_watchers(&self) {
        for (member, id) in self.watcher_ids.lock().drain(..) {
            member.remove_listener(id);
        }
    }
}

#[async_trait]
impl ServiceHooks for CompositeHooks {
    async fn start_service(&self) -> anyhow::Result<()> {
        let results = futures::future::join_all(self.members.iter().map(|m| m.start())).await;
        if let Some((idx, err)) = results
            .iter()
            .enumerate()
            .find_map(|(i, r)| r.as_ref().err().map(|e| (i, e.to_string())))
        {
            let failed_name = self.members[idx].name().to_string();
            futures::future::join_all(
                self.members
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != idx)
                    .map(|(_, m)| m.stop()),
            )
            .await;
            anyhow::bail!("member '{failed_name}' failed to start: {err}");
        }
        self.install_watchers();
        Ok(())
    }

    async fn stop_service(&self) -> anyhow::Result<()> {
        self.remove_watchers();
        let causes: Vec<Arc<anyhow::Error>> = futures::future::join_all(self.members.iter().map(
            |m| async move {
                m.stop().await;
                m.failure_cause()
            },
        ))
        .await
        .into_iter()
        .flatten()
        .collect();

        if self.strict_stop {
            if let Some(cause) = causes.into_iter().next() {
                anyhow::bail!("member failed while stopping: {cause}");
            }
        }
        Ok(())
    }
}

fn build(
    name: impl Into<Arc<str>>,
    members: Vec<Arc<Service>>,
    strict_stop: bool,
) -> (Arc<Service>, Arc<Vec<Arc<Service>>>) {
    let members_for_facets = Arc::new(members.clone());
    let hooks = Arc::new(CompositeHooks {
        members,
        owner: Mutex::new(None),
        watcher_ids: Mutex::new(Vec::new()),
        strict_stop,
    });
    let svc = Arc::new(Service::from_arc_hooks(name, hooks.clone()));
    *hooks.owner.lock() = Some(Arc::downgrade(&svc));
    (svc, members_for_facets)
}

/// Starts all `members` in parallel. If any member fails to start, the rest
/// are stopped and the composite itself fails to start with the first
/// failure's cause. Once running, an unsolicited member FAILED propagates via
/// the composite's own `notify_service_failed`, and an unsolicited member
/// STOPPED triggers the composite to stop. Stopping fails if any member
/// failed while stopping.
pub fn composite_service(name: impl Into<Arc<str>>, members: Vec<Arc<Service>>) -> Arc<Service> {
    build(name, members, true).0
}

/// A [`concurrent_service`] group plus a named lookup onto its individual
/// members. This is the explicit, non-reflective stand-in for a dynamic
/// proxy that would otherwise be asked to expose "additional interfaces" on
/// demand: rather than synthesising a type implementing every member's
/// surface, `facet` hands back the one member a caller actually wants, typed
/// as the plain `Service` handle it already is.
///
/// Derefs to the aggregate `Service`, so it is usable anywhere a composite's
/// `Arc<Service>` would be (`.start()`, `.stop()`, `.state()`, ...).
#[derive(Clone)]
pub struct ConcurrentServiceHandle {
    service: Arc<Service>,
    members: Arc<Vec<Arc<Service>>>,
}

impl std::ops::Deref for ConcurrentServiceHandle {
    type Target = Service;

    fn deref(&self) -> &Service {
        &self.service
    }
}

impl ConcurrentServiceHandle {
    /// The facet view onto the member named `name`, if the group has one —
    /// the "additional interface" a caller requests instead of going through
    /// the aggregate.
    pub fn facet(&self, name: &str) -> Option<Arc<Service>> {
        self.members.iter().find(|m| m.name() == name).cloned()
    }

    /// All members backing this group, in construction order.
    pub fn members(&self) -> &[Arc<Service>] {
        &self.members
    }

    /// The aggregate `Service` handle, equivalent to what [`composite_service`]
    /// returns directly.
    pub fn service(&self) -> &Arc<Service> {
        &self.service
    }
}

/// Like [`composite_service`], but tolerates partial member failure while
/// stopping (a member that fails to stop does not fail the group's own stop),
/// and returns a [`ConcurrentServiceHandle`] exposing a facet view onto each
/// member alongside the aggregate.
pub fn concurrent_service(
    name: impl Into<Arc<str>>,
    members: Vec<Arc<Service>>,
) -> ConcurrentServiceHandle {
    let (service, members) = build(name, members, false);
    ConcurrentServiceHandle { service, members }
}
