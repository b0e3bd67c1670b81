use crate::api::models::{Provider, QualityTier, SearchScope};

/// Builds upstream request URLs. Pure string work, no I/O.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// On-demand resolution endpoint; the upstream answers with a redirect
    /// to the CDN location of the audio file.
    pub fn track_url(&self, provider: Provider, id: &str, tier: QualityTier) -> String {
        self.build(&[
            ("source", provider.as_str()),
            ("id", id),
            ("type", "url"),
            ("br", tier.as_str()),
        ])
    }

    pub fn info(&self, provider: Provider, id: &str) -> String {
        self.build(&[("source", provider.as_str()), ("id", id), ("type", "info")])
    }

    pub fn cover(&self, provider: Provider, id: &str) -> String {
        self.build(&[("source", provider.as_str()), ("id", id), ("type", "pic")])
    }

    pub fn search(&self, scope: SearchScope, keyword: &str) -> String {
        match scope {
            SearchScope::Provider(p) => self.build(&[
                ("source", p.as_str()),
                ("type", "search"),
                ("keyword", keyword),
            ]),
            SearchScope::Aggregate => {
                self.build(&[("type", "aggregateSearch"), ("keyword", keyword)])
            }
        }
    }

    fn build(&self, params: &[(&str, &str)]) -> String {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}/api/?{}", self.base_url, query)
    }
}
