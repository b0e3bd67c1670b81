//! Quality tier resolution.
//!
//! Every track can be streamed at several quality tiers. Before playback all
//! tiers are probed concurrently (`preload`); on a playback failure the
//! remaining tiers are tried one by one (`degrade`), and when every tier of
//! a track is dead the fallback policy may substitute the same song from
//! another provider.

pub mod fallback;

use crate::api::endpoints::Endpoints;
use crate::api::models::{Provider, QualityTier, Track};
use crate::api::{ApiClient, ApiError};
use fallback::{FallbackPolicy, TrackSearch};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;
use thiserror::Error;

/// Final playback URL per tier, for one (provider, track id) pair.
pub type ResolvedUrlMap = BTreeMap<QualityTier, String>;

/// Header-only liveness check that resolves redirects.
pub trait Prober {
    /// Resolves to the final URL after redirects, or fails if the resource
    /// is unreachable.
    fn probe(&self, url: &str) -> impl Future<Output = Result<String, ApiError>> + Send;
}

impl Prober for ApiClient {
    async fn probe(&self, url: &str) -> Result<String, ApiError> {
        self.head_final_url(url).await
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no playable audio: every quality tier failed")]
    Exhausted,
    #[error("no playable audio: no substitute found on {0}")]
    NotFound(Provider),
}

/// Outcome of recovering from a playback failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// A lower-priority tier of the same track is playable.
    Degraded { url: String, tier: QualityTier },
    /// The same song from another provider; the caller restarts the whole
    /// load pipeline for it.
    Substitute(Track),
}

#[derive(Debug, Clone)]
pub struct QualityResolver<P> {
    prober: P,
    endpoints: Endpoints,
}

impl<P: Prober> QualityResolver<P> {
    pub fn new(prober: P, endpoints: Endpoints) -> Self {
        Self { prober, endpoints }
    }

    /// Probe every tier concurrently and keep the ones that answered.
    ///
    /// Failures are logged and omitted. Returns once every probe settled.
    pub async fn preload(
        &self,
        provider: Provider,
        id: &str,
        tiers: &[QualityTier],
    ) -> ResolvedUrlMap {
        let probes = tiers.iter().map(|&tier| async move {
            let url = self.endpoints.track_url(provider, id, tier);
            match self.prober.probe(&url).await {
                Ok(resolved) => Some((tier, resolved)),
                Err(e) => {
                    tracing::debug!(%provider, id, %tier, error = %e, "preload probe failed");
                    None
                }
            }
        });

        let map: ResolvedUrlMap = join_all(probes).await.into_iter().flatten().collect();
        tracing::debug!(%provider, id, resolved = map.len(), "preload finished");
        map
    }

    /// Preloaded URL for `tier`, or the unverified on-demand endpoint.
    pub fn resolve(
        &self,
        tier: QualityTier,
        provider: Provider,
        id: &str,
        map: &ResolvedUrlMap,
    ) -> String {
        map.get(&tier)
            .cloned()
            .unwrap_or_else(|| self.endpoints.track_url(provider, id, tier))
    }

    /// Resolve and probe a single tier.
    pub async fn probe_tier(
        &self,
        tier: QualityTier,
        provider: Provider,
        id: &str,
        map: &ResolvedUrlMap,
    ) -> Result<String, ApiError> {
        let url = self.resolve(tier, provider, id, map);
        self.prober.probe(&url).await
    }

    /// Try the tiers after `current` in `order`, one at a time, and return
    /// the first live one. A `current` missing from `order` scans all of it.
    pub async fn degrade(
        &self,
        current: QualityTier,
        order: &[QualityTier],
        provider: Provider,
        id: &str,
        map: &ResolvedUrlMap,
    ) -> Result<(String, QualityTier), ResolveError> {
        let start = order
            .iter()
            .position(|t| *t == current)
            .map_or(0, |i| i + 1);

        for &tier in &order[start..] {
            match self.probe_tier(tier, provider, id, map).await {
                Ok(url) => {
                    tracing::info!(%provider, id, from = %current, to = %tier, "degraded quality");
                    return Ok((url, tier));
                }
                Err(e) => {
                    tracing::warn!(%provider, id, %tier, error = %e, "quality tier unavailable");
                }
            }
        }
        Err(ResolveError::Exhausted)
    }

    /// `degrade`, then cross-provider substitution when the policy allows it.
    pub async fn recover<S: TrackSearch>(
        &self,
        track: &Track,
        current: QualityTier,
        order: &[QualityTier],
        map: &ResolvedUrlMap,
        policy: &FallbackPolicy,
        search: &S,
    ) -> Result<Recovery, ResolveError> {
        match self
            .degrade(current, order, track.provider, &track.id, map)
            .await
        {
            Ok((url, tier)) => Ok(Recovery::Degraded { url, tier }),
            Err(ResolveError::Exhausted) => match policy.target_for(track) {
                Some(target) => fallback::cross_provider_fallback(track, target, search)
                    .await
                    .map(Recovery::Substitute),
                None => Err(ResolveError::Exhausted),
            },
            Err(e) => Err(e),
        }
    }
}
