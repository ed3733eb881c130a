use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::classifier::{self, PostcodeClass};
use crate::common::constants;
use crate::common::error::Result;

/// Identifies which upstream source produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Licensed,
    Geocoder,
    Places,
    Local,
}

impl ProviderTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTag::Licensed => constants::LICENSED_PROVIDER,
            ProviderTag::Geocoder => constants::GEOCODER_PROVIDER,
            ProviderTag::Places => constants::PLACES_PROVIDER,
            ProviderTag::Local => constants::LOCAL_PROVIDER,
        }
    }
}

impl std::fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WGS84 point. (0, 0) is the "absent" sentinel and fails the authenticity filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_absent(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

/// Structured address parts. Fields are empty strings when the provider did
/// not supply them, so downstream comparisons never deal with missing values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressComponents {
    #[serde(default)]
    pub house_number: String,
    #[serde(default)]
    pub flat_number: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub country: String,
}

/// How a candidate's postcode relates to the requested one. `Outward` marks
/// the lenient same-area path so callers can tell it apart from exact hits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchScope {
    Exact,
    Outward,
    #[default]
    None,
}

/// One possible address match, canonical across all providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressCandidate {
    /// Provider-qualified id, unique within a single response only
    pub id: String,
    pub display_text: String,
    pub full_address: String,
    pub components: AddressComponents,
    pub coordinates: Coordinates,
    pub provider: ProviderTag,
    pub confidence: f64,
    /// Computed ranking score, higher = better. Never provider-supplied.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub has_complete_address: bool,
    #[serde(default)]
    pub is_postcode_match: bool,
    #[serde(default)]
    pub match_scope: MatchScope,
}

impl AddressCandidate {
    /// Combined weight of the detail-bearing components, used as a ranking
    /// key. The house number counts as presence only, so "10 High Street"
    /// never outweighs "2 High Street" on digit width alone.
    pub fn detail_len(&self) -> usize {
        self.components.street.len() + usize::from(!self.components.house_number.is_empty())
    }
}

/// Input to the resolution pipeline. Built once per request; the
/// classification is derived here, never caller-supplied.
#[derive(Debug, Clone)]
pub struct AddressQuery {
    pub raw: String,
    pub country_hint: String,
    pub limit: usize,
    pub classification: PostcodeClass,
}

impl AddressQuery {
    pub fn new(raw: &str, country_hint: Option<&str>, limit: Option<usize>) -> Self {
        let raw = raw.trim().to_string();
        let classification = classifier::classify(&raw);
        let country_hint = country_hint
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| constants::DEFAULT_COUNTRY_HINT.to_string());
        let limit = limit.unwrap_or(10).clamp(1, constants::MAX_RESULT_LIMIT);
        Self {
            raw,
            country_hint,
            limit,
            classification,
        }
    }

    /// The postcode this query asks for, formatted, when the query is
    /// postcode-shaped. Free-text queries have none.
    pub fn requested_postcode(&self) -> Option<String> {
        if self.classification.is_postcode_shaped() {
            Some(classifier::format_postcode(&self.raw))
        } else {
            None
        }
    }
}

/// Outcome of a single provider call, used by the orchestrator to decide fallback
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub provider: ProviderTag,
    pub candidates: Vec<AddressCandidate>,
    pub succeeded: bool,
    pub error: Option<String>,
    pub latency_ms: u64,
}

/// What the cascade hands back to the caller
#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub candidates: Vec<AddressCandidate>,
    pub provider_used: Option<ProviderTag>,
    pub fallback_attempted: bool,
}

impl ResolveOutcome {
    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            provider_used: None,
            fallback_attempted: false,
        }
    }
}

/// Request-scoped cancellation handle. A superseded request flips the flag;
/// the orchestrator checks it between cascade steps and races it against the
/// in-flight provider call, so stale responses never reach the caller.
#[derive(Debug, Clone)]
pub struct CancellationFlag {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancellationFlag {
    fn default() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let _ = self.sender.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once the request has been superseded; pends forever otherwise
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Every handle dropped without cancelling
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Core trait every address data source implements. Adapters are stateless
/// and must return an empty list (not an error) on zero results; the
/// orchestrator, not the adapter, decides whether to fall back.
#[async_trait]
pub trait AddressProvider: Send + Sync {
    /// Unique identifier for this provider
    fn tag(&self) -> ProviderTag;

    /// Fetch candidates for the query, at most `query.limit` of them
    async fn search(&self, query: &AddressQuery) -> Result<Vec<AddressCandidate>>;
}
