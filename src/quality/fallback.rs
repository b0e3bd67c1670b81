use super::ResolveError;
use crate::api::models::{Provider, SearchScope, Track, TrackOrigin};
use crate::api::{ApiClient, ApiError};
use serde::{Deserialize, Serialize};
use std::future::Future;

/// Text search against the upstream catalogue.
pub trait TrackSearch {
    fn search(
        &self,
        scope: SearchScope,
        keyword: &str,
    ) -> impl Future<Output = Result<Vec<Track>, ApiError>> + Send;
}

impl TrackSearch for ApiClient {
    async fn search(&self, scope: SearchScope, keyword: &str) -> Result<Vec<Track>, ApiError> {
        ApiClient::search(self, scope, keyword).await
    }
}

/// When every tier of a `from` track fails, look the song up on `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackRoute {
    pub from: Provider,
    pub to: Provider,
}

#[derive(Debug, Clone, Default)]
pub struct FallbackPolicy {
    routes: Vec<FallbackRoute>,
}

impl FallbackPolicy {
    pub fn new(routes: Vec<FallbackRoute>) -> Self {
        Self { routes }
    }

    /// Kuwo is the unreliable source, QQ the reliable one.
    pub fn default_routes() -> Self {
        Self::new(vec![FallbackRoute {
            from: Provider::Kuwo,
            to: Provider::Qq,
        }])
    }

    /// Provider to search for a substitute of `track`, if any.
    ///
    /// A track that is itself a substitute never falls back again, so a
    /// cyclic policy cannot bounce between providers.
    pub fn target_for(&self, track: &Track) -> Option<Provider> {
        if track.origin.is_some() {
            return None;
        }
        self.routes
            .iter()
            .find(|r| r.from == track.provider && r.to != track.provider)
            .map(|r| r.to)
    }
}

/// Search `target` for `"{name} {artist}"` and take the first hit.
pub async fn cross_provider_fallback<S: TrackSearch>(
    track: &Track,
    target: Provider,
    search: &S,
) -> Result<Track, ResolveError> {
    let keyword = format!("{} {}", track.name, track.artist);
    tracing::info!(from = %track.provider, to = %target, %keyword, "trying cross-provider fallback");

    let results = match search.search(SearchScope::Provider(target), keyword.trim()).await {
        Ok(results) => results,
        Err(e) => {
            tracing::warn!(to = %target, error = %e, "fallback search failed");
            return Err(ResolveError::NotFound(target));
        }
    };

    let mut substitute = results
        .into_iter()
        .next()
        .ok_or(ResolveError::NotFound(target))?;
    substitute.provider = target;
    substitute.origin = Some(TrackOrigin {
        provider: track.provider,
        id: track.id.clone(),
        name: track.name.clone(),
    });
    Ok(substitute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::tests::{FakeSearch, make_track};

    #[test]
    fn test_policy_routes() {
        let policy = FallbackPolicy::default_routes();
        assert_eq!(policy.target_for(&make_track("1", Provider::Kuwo)), Some(Provider::Qq));
        assert_eq!(policy.target_for(&make_track("1", Provider::Netease)), None);
        assert_eq!(policy.target_for(&make_track("1", Provider::Qq)), None);
    }

    #[test]
    fn test_substitute_never_falls_back_again() {
        let policy = FallbackPolicy::new(vec![
            FallbackRoute { from: Provider::Kuwo, to: Provider::Qq },
            FallbackRoute { from: Provider::Qq, to: Provider::Kuwo },
        ]);
        let mut t = make_track("1", Provider::Qq);
        assert_eq!(policy.target_for(&t), Some(Provider::Kuwo));
        t.origin = Some(TrackOrigin {
            provider: Provider::Kuwo,
            id: "0".into(),
            name: "x".into(),
        });
        assert_eq!(policy.target_for(&t), None);
    }

    #[tokio::test]
    async fn test_fallback_tags_origin() {
        let search = FakeSearch {
            results: vec![make_track("qq-5", Provider::Qq)],
            ..Default::default()
        };
        let original = make_track("kw-1", Provider::Kuwo);
        let t = cross_provider_fallback(&original, Provider::Qq, &search)
            .await
            .unwrap();
        assert_eq!(t.id, "qq-5");
        assert_eq!(t.provider, Provider::Qq);
        assert_eq!(t.origin.as_ref().unwrap().name, "Sunny Day");
    }

    #[tokio::test]
    async fn test_fallback_not_found() {
        let search = FakeSearch::default();
        let err = cross_provider_fallback(&make_track("kw-1", Provider::Kuwo), Provider::Qq, &search)
            .await
            .unwrap_err();
        assert_eq!(err, ResolveError::NotFound(Provider::Qq));
    }
}
