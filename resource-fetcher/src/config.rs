//! The handful of named, typed knobs an embedding application sets before
//! constructing a page load's caches and protocol identity, instead of
//! passing bare integers around: the two cache capacities, the per-host
//! connection budget, and the HTML-resource-inference toggle.

use crate::cache::ResourceCaches;
use crate::error::Result;
use crate::factory::ProtocolConfig;

/// Configuration for one protocol's resource fetching, bundling the
/// capacity constants and scheduler knobs a caller would otherwise thread
/// through by hand.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Identity distinguishing this protocol's cache entries from another
    /// protocol's, even for the same document URI.
    pub protocol_id: String,
    /// User-Agent string passed to the HTML parser.
    pub user_agent: String,
    /// Whether HTML responses are scanned for embedded resources at all.
    pub infer_html_resources: bool,
    /// Maximum concurrent in-flight fetches per origin host.
    pub max_connections_per_host: u32,
    /// Capacity of the process-wide `InferredResourcesCache`.
    pub fetched_html_cache_max_capacity: u64,
    /// Capacity of the process-wide `CssContentCache`.
    pub fetched_css_cache_max_capacity: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            protocol_id: "default".to_string(),
            user_agent: concat!("resource-fetcher/", env!("CARGO_PKG_VERSION")).to_string(),
            infer_html_resources: true,
            max_connections_per_host: 6,
            fetched_html_cache_max_capacity: 1_000,
            fetched_css_cache_max_capacity: 1_000,
        }
    }
}

impl FetcherConfig {
    /// Build the process-wide caches this configuration's capacities
    /// describe.
    pub fn build_caches(&self) -> Result<ResourceCaches> {
        ResourceCaches::new(
            self.fetched_css_cache_max_capacity,
            self.fetched_html_cache_max_capacity,
        )
    }

    /// The subset of this configuration a page load's factory calls need:
    /// protocol identity, user agent, the inference toggle, and the
    /// per-host admission budget.
    #[must_use]
    pub fn protocol_config(&self) -> ProtocolConfig {
        ProtocolConfig {
            protocol_id: self.protocol_id.clone(),
            user_agent: self.user_agent.clone(),
            infer_html_resources: self.infer_html_resources,
            max_connections_per_host: self.max_connections_per_host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds_caches_and_protocol_config() {
        let config = FetcherConfig::default();
        assert!(config.build_caches().is_ok());
        let protocol = config.protocol_config();
        assert_eq!(protocol.protocol_id, "default");
        assert_eq!(protocol.max_connections_per_host, 6);
    }

    #[test]
    fn zero_capacity_propagates_cache_error() {
        let config = FetcherConfig { fetched_css_cache_max_capacity: 0, ..FetcherConfig::default() };
        assert!(config.build_caches().is_err());
    }
}
