//! Address discovery
//!
//! Instances boot asynchronously, so a freshly created node reports no
//! network address for a while. [`AddressPoller`] fetches the instance with
//! a fixed interval until an address shows up, the attempt ceiling is
//! reached, or the caller cancels.
//!
//! Only the "no address yet" answer is retried. A failed fetch ends polling
//! immediately with [`Discovery::TransportFailed`].

use crate::api::{ComputeApi, GetInstanceInput, with_timeout};
use crate::config::ProvisionConfig;
use crate::error::{ApiError, ReconcileError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::debug;

/// Outcome of one discovery run
#[derive(Debug)]
pub enum Discovery {
    /// At least one address, in the order the remote side reports them
    Found(Vec<String>),
    /// Every attempt succeeded but none reported an address
    Exhausted { attempts: u32 },
    /// A fetch failed; not retried
    TransportFailed(ApiError),
    /// Cancelled between attempts
    Cancelled,
}

impl Discovery {
    /// First discovered address, or the matching reconcile error
    pub fn into_address(self, resource: &str, id: &str) -> Result<String> {
        match self {
            Discovery::Found(addresses) => addresses.into_iter().next().ok_or_else(|| {
                ReconcileError::AddressDiscoveryExhausted {
                    resource: resource.to_string(),
                    id: id.to_string(),
                    attempts: 0,
                }
            }),
            Discovery::Exhausted { attempts } => Err(ReconcileError::AddressDiscoveryExhausted {
                resource: resource.to_string(),
                id: id.to_string(),
                attempts,
            }),
            Discovery::TransportFailed(source) => Err(ReconcileError::Transport {
                resource: resource.to_string(),
                operation: "get_instance",
                source,
            }),
            Discovery::Cancelled => Err(ReconcileError::Cancelled {
                resource: resource.to_string(),
                id: id.to_string(),
            }),
        }
    }
}

/// Bounded fixed-interval poller for instance addresses
#[derive(Clone)]
pub struct AddressPoller {
    api: Arc<dyn ComputeApi>,
    attempts: u32,
    interval: Duration,
    request_timeout: Option<Duration>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl AddressPoller {
    pub fn new(api: Arc<dyn ComputeApi>, attempts: u32, interval: Duration) -> Self {
        Self {
            api,
            attempts,
            interval,
            request_timeout: None,
            shutdown: None,
        }
    }

    pub fn from_config(api: Arc<dyn ComputeApi>, config: &ProvisionConfig) -> Self {
        Self::new(api, config.poll_attempts, config.poll_interval())
            .with_request_timeout(config.request_timeout())
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Stop polling once the channel reports `true`
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Poll instance `id` until it reports an address
    ///
    /// No sleep follows the last attempt, so the worst case is
    /// `(attempts - 1) * interval` plus the fetch time.
    pub async fn discover(&self, id: &str) -> Discovery {
        let mut shutdown = self.shutdown.clone();
        let input = GetInstanceInput::new(id);

        for attempt in 1..=self.attempts {
            if is_cancelled(shutdown.as_ref()) {
                debug!(id, attempt, "Address discovery cancelled");
                return Discovery::Cancelled;
            }

            debug!(id, attempt, max = self.attempts, "Polling instance for addresses");
            match with_timeout(self.request_timeout, self.api.get_instance(&input)).await {
                Err(e) => {
                    debug!(id, attempt, error = %e, "Instance fetch failed");
                    return Discovery::TransportFailed(e);
                }
                Ok(instance) if !instance.ips.is_empty() => {
                    debug!(id, attempt, ips = ?instance.ips, "Addresses discovered");
                    return Discovery::Found(instance.ips);
                }
                Ok(_) => {}
            }

            if attempt < self.attempts {
                match shutdown.as_mut() {
                    Some(rx) => {
                        tokio::select! {
                            _ = sleep(self.interval) => {}
                            _ = cancelled(rx) => {
                                debug!(id, attempt, "Address discovery cancelled");
                                return Discovery::Cancelled;
                            }
                        }
                    }
                    None => sleep(self.interval).await,
                }
            }
        }

        debug!(id, attempts = self.attempts, "Address discovery exhausted");
        Discovery::Exhausted {
            attempts: self.attempts,
        }
    }
}

fn is_cancelled(shutdown: Option<&watch::Receiver<bool>>) -> bool {
    shutdown.is_some_and(|rx| *rx.borrow())
}

/// Resolves once the flag turns `true`; never if the sender is dropped first
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_yields_first_address() {
        let discovery = Discovery::Found(vec!["10.0.0.5".to_string(), "10.0.0.6".to_string()]);
        assert_eq!(discovery.into_address("m", "i-1").unwrap(), "10.0.0.5");
    }

    #[test]
    fn test_exhausted_maps_to_error() {
        let err = Discovery::Exhausted { attempts: 3 }
            .into_address("master-0", "i-1")
            .unwrap_err();

        match err {
            ReconcileError::AddressDiscoveryExhausted {
                resource,
                id,
                attempts,
            } => {
                assert_eq!(resource, "master-0");
                assert_eq!(id, "i-1");
                assert_eq!(attempts, 3);
            }
            other => panic!("Expected AddressDiscoveryExhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_transport_failure_maps_to_transport_error() {
        let err = Discovery::TransportFailed(ApiError::Request("connection reset".to_string()))
            .into_address("node-1", "i-9")
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Transport {
                operation: "get_instance",
                ..
            }
        ));
    }

    #[test]
    fn test_cancelled_maps_to_error() {
        let err = Discovery::Cancelled.into_address("node-1", "i-9").unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_on_flag() {
        let (tx, mut rx) = watch::channel(false);
        tx.send(true).unwrap();
        cancelled(&mut rx).await;
        assert!(is_cancelled(Some(&rx)));
    }
}
