//! Per-model inference session registry
//!
//! Holds at most one session per [`ModelName`] for the lifetime of the
//! process. Each model owns a single-flight cell: concurrent first requests
//! for the same model await one construction, and a failed construction
//! leaves the cell empty so a later request can try again. Reads of an
//! initialized cell take no lock.

use crate::{
    config::FallbackPolicy,
    error::{BgRemovalError, Result},
    inference::{SegmentationSession, SessionFactory},
    models::ModelName,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Session handed out for a single request
#[derive(Clone)]
pub struct SessionLease {
    pub session: Arc<dyn SegmentationSession>,
    /// Model the caller asked for
    pub requested: ModelName,
    /// Model the session was actually built for
    pub used: ModelName,
    /// `true` when the requested model failed to load and the default was substituted
    pub fallback: bool,
}

/// Registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Construction attempts, including the eager default
    pub constructions: u64,
    /// Lookups served from an already constructed session
    pub cache_hits: u64,
    /// Requests served by the default session after a construction failure
    pub fallbacks: u64,
}

/// Lazily populated cache of inference sessions, one per model
pub struct ModelSessionRegistry {
    factory: Arc<dyn SessionFactory>,
    policy: FallbackPolicy,
    cells: HashMap<ModelName, OnceCell<Arc<dyn SegmentationSession>>>,
    default_session: Arc<dyn SegmentationSession>,
    constructions: AtomicU64,
    cache_hits: AtomicU64,
    fallbacks: AtomicU64,
}

impl ModelSessionRegistry {
    /// Create the registry and eagerly construct the default session
    ///
    /// # Errors
    /// - `SessionConstructionFailed` when the default model cannot be loaded;
    ///   the service cannot run without it
    pub async fn new(factory: Arc<dyn SessionFactory>, policy: FallbackPolicy) -> Result<Self> {
        let start = instant::Instant::now();
        let default_session = factory
            .create_session(ModelName::DEFAULT)
            .await
            .map_err(|e| match e {
                BgRemovalError::SessionConstructionFailed { .. } => e,
                other => BgRemovalError::session_construction(
                    ModelName::DEFAULT.as_str(),
                    other.to_string(),
                ),
            })?;
        tracing::info!(
            model = %ModelName::DEFAULT,
            backend = factory.backend_name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Default session ready"
        );

        let cells = ModelName::ALL
            .into_iter()
            .map(|model| {
                let initial = (model == ModelName::DEFAULT).then(|| Arc::clone(&default_session));
                (model, OnceCell::new_with(initial))
            })
            .collect();

        Ok(Self {
            factory,
            policy,
            cells,
            default_session,
            constructions: AtomicU64::new(1),
            cache_hits: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        })
    }

    /// Get the session for a model, constructing it on first use
    ///
    /// Under [`FallbackPolicy::Degrade`] a construction failure is logged and
    /// the default session is returned with `fallback` set; the failure never
    /// reaches the caller.
    ///
    /// # Errors
    /// - `RemovalFailed` when construction fails under [`FallbackPolicy::Strict`]
    #[tracing::instrument(skip(self))]
    pub async fn get_session(&self, model: ModelName) -> Result<SessionLease> {
        let cell = self
            .cells
            .get(&model)
            .ok_or_else(|| BgRemovalError::internal(format!("No registry slot for {model}")))?;

        if let Some(session) = cell.get() {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Self::lease(session, model, false));
        }

        let constructed = cell
            .get_or_try_init(|| async {
                self.constructions.fetch_add(1, Ordering::Relaxed);
                tracing::info!(model = %model, "Constructing session");
                self.factory.create_session(model).await
            })
            .await;

        match constructed {
            Ok(session) => Ok(Self::lease(session, model, false)),
            Err(err) => match self.policy {
                FallbackPolicy::Degrade => {
                    self.fallbacks.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        model = %model,
                        fallback = %ModelName::DEFAULT,
                        error = %err,
                        "Session construction failed, using default model"
                    );
                    Ok(Self::lease(&self.default_session, model, true))
                },
                FallbackPolicy::Strict => {
                    tracing::error!(model = %model, error = %err, "Session construction failed");
                    Err(BgRemovalError::removal_failed(format!(
                        "Model '{model}' is unavailable: {err}"
                    )))
                },
            },
        }
    }

    /// Models with a constructed session, in declaration order
    #[must_use]
    pub fn loaded_models(&self) -> Vec<ModelName> {
        ModelName::ALL
            .into_iter()
            .filter(|model| self.cells.get(model).is_some_and(OnceCell::initialized))
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            constructions: self.constructions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }

    #[must_use]
    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.factory.backend_name()
    }

    fn lease(
        session: &Arc<dyn SegmentationSession>,
        requested: ModelName,
        fallback: bool,
    ) -> SessionLease {
        SessionLease {
            session: Arc::clone(session),
            requested,
            used: session.model(),
            fallback,
        }
    }
}
