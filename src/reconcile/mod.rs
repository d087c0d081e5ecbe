//! Background endpoint reconciliation
//!
//! Keeps a resolved peer endpoint current for the life of the process.
//! Each tick re-resolves the host and, when the address moved, pushes a
//! minimal update block to the device; everything within a tick runs
//! sequentially, so pushes are strictly ordered and ticks never overlap.

use crate::device::ConfigSink;
use crate::peer::Peer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

/// Cap on a single tick's resolution work, so a hanging transport cannot
/// stall the loop across intervals.
const TICK_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle to a running reconciliation task.
///
/// The handle owns the task: dropping it stops reconciliation on the next
/// poll, [`ReconcileHandle::shutdown`] stops it and returns the peer.
pub struct ReconcileHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<Peer>,
}

impl ReconcileHandle {
    /// Stop the task deterministically and get the peer back.
    pub async fn shutdown(self) -> Peer {
        let _ = self.shutdown.send(true);
        self.task.await.expect("reconcile task panicked")
    }
}

/// Spawn the reconciliation task.
///
/// The task takes ownership of the peer: after startup it is the only
/// writer to the endpoint binding. A failed refresh waits for the next
/// tick; a failed push is logged and the new binding is kept.
pub fn spawn(mut peer: Peer, sink: Arc<dyn ConfigSink>, interval: Duration) -> ReconcileHandle {
    let (shutdown, mut stopped) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the binding was resolved
        // synchronously at startup.
        timer.tick().await;

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    match tokio::time::timeout(TICK_TIMEOUT, peer.refresh()).await {
                        Ok(Some(update)) => {
                            if let Err(err) = sink.apply(&update).await {
                                error!("Config device: {}", err);
                            }
                        }
                        Ok(None) => {}
                        Err(_) => {
                            warn!("Refresh of {} timed out after {:?}", peer.host(), TICK_TIMEOUT);
                        }
                    }
                }
                _ = stopped.changed() => {
                    debug!("Endpoint reconciliation for {} stopped", peer.host());
                    break;
                }
            }
        }

        peer
    });

    ReconcileHandle { shutdown, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceError;
    use crate::key::Key;
    use crate::peer::PeerIdentity;
    use crate::resolver::{EndpointResolver, NameLookup, Reachability, ResolverError};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::net::{IpAddr, SocketAddr};
    use std::sync::Mutex;

    struct RecordingSink {
        pushes: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                pushes: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl ConfigSink for RecordingSink {
        async fn apply(&self, config: &str) -> Result<(), DeviceError> {
            self.pushes.lock().unwrap().push(config.to_string());
            if self.fail {
                Err(DeviceError::Rejected("device unavailable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct ScriptedLookup {
        answers: Mutex<VecDeque<Vec<IpAddr>>>,
    }

    impl ScriptedLookup {
        fn new(answers: &[&str]) -> Box<Self> {
            Box::new(Self {
                answers: Mutex::new(
                    answers
                        .iter()
                        .map(|a| vec![a.parse().unwrap()])
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl NameLookup for ScriptedLookup {
        async fn lookup(&self, _host: &str) -> Result<Vec<IpAddr>, ResolverError> {
            let mut answers = self.answers.lock().unwrap();
            if answers.len() > 1 {
                Ok(answers.pop_front().unwrap())
            } else {
                Ok(answers.front().cloned().unwrap_or_default())
            }
        }
    }

    struct AlwaysReachable;

    #[async_trait]
    impl Reachability for AlwaysReachable {
        async fn probe(&self, _addr: SocketAddr) -> std::io::Result<()> {
            Ok(())
        }
    }

    async fn scripted_peer(answers: &[&str]) -> Peer {
        let resolver = EndpointResolver::new("peer.example.test", 51820, ScriptedLookup::new(answers))
            .with_probe(Box::new(AlwaysReachable));
        Peer::bind_resolved(
            PeerIdentity {
                public_key: Key::from_base64("QUJDRA==").unwrap(),
                preshared_key: None,
            },
            None,
            resolver,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_pushes_update_on_change() {
        let peer = scripted_peer(&["203.0.113.5", "203.0.113.9"]).await;
        let sink = RecordingSink::new(false);

        let handle = spawn(peer, sink.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        let peer = handle.shutdown().await;

        // One change, then steady answers: exactly one push.
        let pushes = sink.pushes.lock().unwrap();
        assert_eq!(pushes.len(), 1);
        assert_eq!(
            pushes[0],
            "public_key=41424344\nupdate_only=true\nendpoint=203.0.113.9:51820\n"
        );
        assert_eq!(peer.endpoint().to_string(), "203.0.113.9:51820");
    }

    #[tokio::test]
    async fn test_no_pushes_without_change() {
        let peer = scripted_peer(&["203.0.113.5"]).await;
        let sink = RecordingSink::new(false);

        let handle = spawn(peer, sink.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;
        handle.shutdown().await;

        assert!(sink.pushes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_failure_keeps_task_alive() {
        let peer = scripted_peer(&["203.0.113.5", "203.0.113.9"]).await;
        let sink = RecordingSink::new(true);

        let handle = spawn(peer, sink.clone(), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        let peer = handle.shutdown().await;

        // The push failed but the binding advanced; accepted divergence
        // until the next change.
        assert_eq!(sink.pushes.lock().unwrap().len(), 1);
        assert_eq!(peer.endpoint().to_string(), "203.0.113.9:51820");
    }

    #[tokio::test]
    async fn test_shutdown_is_prompt() {
        let peer = scripted_peer(&["203.0.113.5"]).await;
        let sink = RecordingSink::new(false);

        let handle = spawn(peer, sink, Duration::from_secs(3600));
        // Stops without waiting out the hour-long interval.
        tokio::time::timeout(Duration::from_secs(1), handle.shutdown())
            .await
            .expect("shutdown should not wait for the next tick");
    }
}
