use crate::config::RegistryConfig;
use crate::store::{normalize_base_url, RegistryStore};
use crate::token::TokenProvider;
use arbiter_core::{AgentCard, AgentStatus, ArbiterError, ArbiterResult};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Why a single liveness probe failed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// No identity token could be obtained for the probe.
    #[error("token acquisition failed: {0}")]
    Token(String),
    /// The probe (token included) did not finish in time.
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    /// Connection refused, DNS failure, reset, ...
    #[error("transport error: {0}")]
    Transport(String),
    /// The agent answered with a non-2xx status.
    #[error("HTTP status {0}")]
    Status(u16),
    /// 2xx, but the body is not a valid self-description.
    #[error("unparseable self-description: {0}")]
    Body(String),
}

/// Probes one agent and owns all writes to its registry slot.
pub struct LivenessPoller {
    key: String,
    probe_url: String,
    interval: Duration,
    timeout: Duration,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    store: Arc<RegistryStore>,
}

impl LivenessPoller {
    /// Create a poller for the slot of `base_url`.
    pub fn new(
        store: Arc<RegistryStore>,
        base_url: &str,
        config: &RegistryConfig,
        client: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let key = normalize_base_url(base_url);
        let probe_url = format!("{key}{}", config.well_known_path);
        Self {
            key,
            probe_url,
            interval: config.poll_interval(),
            timeout: config.probe_timeout(),
            client,
            tokens,
            store,
        }
    }

    /// The registry slot this poller writes to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Run one probe and publish the resulting descriptor.
    ///
    /// The probe error, if any, is returned for inspection only; it has
    /// already been folded into the descriptor.
    pub async fn poll_once(&self) -> Result<(), ProbeError> {
        let result = self.probe().await;

        let Some(current) = self.store.current(&self.key) else {
            warn!(agent = %self.key, "Poller has no registry slot");
            return result.map(|_| ());
        };

        let threshold = self.store.failure_threshold();
        let now = Utc::now();
        let next = match &result {
            Ok((card, raw)) => current.with_success(card, raw.clone(), now, threshold),
            Err(_) => current.with_failure(now, threshold),
        };

        match (current.status, next.status) {
            (AgentStatus::Inactive, AgentStatus::Active) => {
                info!(agent = %self.key, id = %next.id, "Agent is active");
            }
            (AgentStatus::Active, AgentStatus::Inactive) => {
                warn!(
                    agent = %self.key,
                    id = %next.id,
                    failures = next.consecutive_failures,
                    "Agent marked inactive"
                );
            }
            _ => {}
        }

        self.store.publish(&self.key, next);
        result.map(|_| ())
    }

    async fn probe(&self) -> Result<(AgentCard, serde_json::Value), ProbeError> {
        match tokio::time::timeout(self.timeout, self.fetch_card()).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(self.timeout)),
        }
    }

    async fn fetch_card(&self) -> Result<(AgentCard, serde_json::Value), ProbeError> {
        let token = self
            .tokens
            .token(&self.key)
            .await
            .map_err(|e| ProbeError::Token(e.to_string()))?;

        let mut request = self.client.get(&self.probe_url).timeout(self.timeout);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        debug!(url = %self.probe_url, "Probing agent");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            match status.as_u16() {
                401 => error!(
                    agent = %self.key,
                    "401 Unauthorized: token invalid, expired, missing or wrong audience"
                ),
                403 => error!(
                    agent = %self.key,
                    "403 Forbidden: the registry identity may not invoke this agent"
                ),
                404 => warn!(
                    url = %self.probe_url,
                    "404 Not Found: self-description not published at this path"
                ),
                code => warn!(agent = %self.key, status = code, "Probe returned error status"),
            }
            return Err(ProbeError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        let raw: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| ProbeError::Body(e.to_string()))?;
        let card = AgentCard::parse(&body).map_err(|e| ProbeError::Body(e.to_string()))?;

        Ok((card, raw))
    }

    /// Start polling on a background task: one probe immediately, then one
    /// per interval until the returned handle is stopped or dropped.
    pub fn spawn(self) -> PollerHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let key = self.key.clone();

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval(self.interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                agent = %self.key,
                interval_secs = self.interval.as_secs(),
                "Liveness poller started"
            );
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = timer.tick() => {}
                }
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    result = self.poll_once() => {
                        if let Err(e) = result {
                            debug!(agent = %self.key, error = %e, "Probe failed");
                        }
                    }
                }
            }
            info!(agent = %self.key, "Liveness poller stopped");
        });

        PollerHandle {
            key,
            stop: stop_tx,
            task,
        }
    }
}

/// Handle to a running poller. Dropping it stops the poller.
pub struct PollerHandle {
    key: String,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Registry slot of the poller.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the poller and wait for it to exit. An in-flight probe is
    /// abandoned without touching the registry slot.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            error!(agent = %self.key, error = %e, "Liveness poller panicked");
        }
    }
}

/// All pollers of a registry, started and stopped together.
pub struct PollerGroup {
    handles: Vec<PollerHandle>,
}

impl PollerGroup {
    /// Spawn one poller per registry slot, sharing one HTTP client.
    pub fn start(
        config: &RegistryConfig,
        store: Arc<RegistryStore>,
        tokens: Arc<dyn TokenProvider>,
    ) -> ArbiterResult<Self> {
        let client = probe_client(config.probe_timeout())?;
        let handles = store
            .keys()
            .into_iter()
            .map(|key| {
                LivenessPoller::new(store.clone(), &key, config, client.clone(), tokens.clone())
                    .spawn()
            })
            .collect::<Vec<_>>();

        info!(agents = handles.len(), "Liveness pollers started");
        Ok(Self { handles })
    }

    /// Number of running pollers.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the group has no pollers.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Stop every poller and wait for all of them.
    pub async fn shutdown(self) {
        for handle in self.handles {
            handle.stop().await;
        }
    }
}

/// HTTP client used for probes.
pub fn probe_client(timeout: Duration) -> ArbiterResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| ArbiterError::Http(format!("Failed to create HTTP client: {e}")))
}
