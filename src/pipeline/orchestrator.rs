//! Provider cascade.
//!
//! The cascade policy is data, not control flow: an ordered tag list per
//! query class, walked strictly in sequence. Each call gets its own timeout;
//! failures and empty results fall through to the next provider, and a
//! sufficiently rich result set stops the walk early. Total exhaustion is a
//! soft "no results", never an error — the autocomplete UI must keep working
//! whatever the providers do.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::classifier::{self, PostcodeClass};
use crate::common::constants;
use crate::common::types::{
    AddressCandidate, AddressProvider, AddressQuery, CancellationFlag, ProviderResponse,
    ProviderTag, ResolveOutcome,
};
use crate::config::PipelineConfig;
use crate::metrics;
use crate::pipeline::{filter, normalize, rank};

/// Postcode-shaped queries lead with the licensed data, then widen out
const POSTCODE_ORDER: &[ProviderTag] = &[
    ProviderTag::Licensed,
    ProviderTag::Geocoder,
    ProviderTag::Places,
    ProviderTag::Local,
];

/// Free text is what the places API is best at; the geocoder backs it up
const FREE_TEXT_ORDER: &[ProviderTag] = &[ProviderTag::Places, ProviderTag::Geocoder];

pub struct CascadeOrchestrator {
    providers: HashMap<ProviderTag, Arc<dyn AddressProvider>>,
    settings: PipelineConfig,
}

impl CascadeOrchestrator {
    pub fn new(settings: PipelineConfig) -> Self {
        Self {
            providers: HashMap::new(),
            settings,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn AddressProvider>) {
        self.providers.insert(provider.tag(), provider);
    }

    /// The adapter order for a classified query
    pub fn cascade_order(classification: PostcodeClass) -> &'static [ProviderTag] {
        match classification {
            PostcodeClass::FullPostcode
            | PostcodeClass::PartialPostcode
            | PostcodeClass::PostcodeLikeToken => POSTCODE_ORDER,
            PostcodeClass::FreeText => FREE_TEXT_ORDER,
        }
    }

    /// Run the cascade and the full normalize -> filter -> rank pipeline.
    pub async fn resolve(&self, query: &AddressQuery, cancel: &CancellationFlag) -> ResolveOutcome {
        // Hard short-circuit, not a failure: nothing upstream is called
        if query.raw.chars().count() < constants::MIN_QUERY_LEN {
            debug!("query below minimum length, skipping providers");
            return ResolveOutcome::empty();
        }

        let order = Self::cascade_order(query.classification);
        let mut merged: Vec<AddressCandidate> = Vec::new();
        let mut provider_used: Option<ProviderTag> = None;
        let mut last_attempted: Option<ProviderTag> = None;
        let mut fallback_attempted = false;
        let mut attempts = 0usize;

        for tag in order {
            let Some(provider) = self.providers.get(tag) else {
                continue;
            };
            if cancel.is_cancelled() {
                debug!("request superseded, stopping cascade");
                return ResolveOutcome::empty();
            }
            if attempts > 0 {
                fallback_attempted = true;
                metrics::fallback_attempted(*tag);
            }
            attempts += 1;
            last_attempted = Some(*tag);

            // Race the provider call against supersession so an in-flight
            // request is abandoned the moment a newer one arrives
            let response = tokio::select! {
                response = self.call_provider(provider.as_ref(), query) => response,
                _ = cancel.cancelled() => {
                    debug!(provider = %tag, "request superseded mid-call");
                    return ResolveOutcome::empty();
                }
            };
            metrics::provider_call(response.provider, response.succeeded, response.latency_ms);

            if response.succeeded && !response.candidates.is_empty() {
                if provider_used.is_none() {
                    provider_used = Some(response.provider);
                }
                merged.extend(response.candidates);

                // Free-text queries have no exact-postcode signal; the first
                // provider that delivers anything is sufficient there.
                if !query.classification.is_postcode_shaped() {
                    break;
                }

                let exact = count_matching_postcodes(&merged, query);
                if exact > self.settings.sufficient_matches {
                    debug!(
                        provider = %response.provider,
                        exact_matches = exact,
                        "sufficient results, stopping cascade"
                    );
                    break;
                }
            } else if let Some(error) = &response.error {
                warn!(
                    provider = %response.provider,
                    latency_ms = response.latency_ms,
                    "provider failed, falling back: {error}"
                );
            } else {
                info!(
                    provider = %response.provider,
                    latency_ms = response.latency_ms,
                    "provider returned no results, falling back"
                );
            }
        }

        // Stale results must never overwrite fresher state downstream
        if cancel.is_cancelled() {
            return ResolveOutcome::empty();
        }

        let normalized = normalize::normalize_all(&merged, query);
        let filtered = filter::filter_candidates(normalized, query);
        let ranked = rank::rank_candidates(filtered, query);

        ResolveOutcome {
            candidates: ranked,
            provider_used: provider_used.or(last_attempted),
            fallback_attempted,
        }
    }

    /// One provider call with its own timeout. Errors and timeouts are
    /// recovered here; nothing escapes to the filter/rank stages.
    async fn call_provider(
        &self,
        provider: &dyn AddressProvider,
        query: &AddressQuery,
    ) -> ProviderResponse {
        let budget = Duration::from_millis(self.settings.provider_timeout_ms);
        let started = Instant::now();
        let tag = provider.tag();

        let (candidates, succeeded, error) =
            match tokio::time::timeout(budget, provider.search(query)).await {
                Ok(Ok(candidates)) => (candidates, true, None),
                Ok(Err(e)) => (Vec::new(), false, Some(e.to_string())),
                Err(_) => (
                    Vec::new(),
                    false,
                    Some(format!("timed out after {}ms", budget.as_millis())),
                ),
            };

        ProviderResponse {
            provider: tag,
            candidates,
            succeeded,
            error,
            latency_ms: started.elapsed().as_millis() as u64,
        }
    }
}

/// Candidates whose postcode satisfies the query's postcode, counted on the
/// raw merge so the short-circuit decision does not depend on later stages
fn count_matching_postcodes(candidates: &[AddressCandidate], query: &AddressQuery) -> usize {
    let Some(requested) = query.requested_postcode() else {
        return 0;
    };
    let requested_norm = classifier::normalize_postcode(&requested);
    candidates
        .iter()
        .filter(|c| {
            let candidate_norm = classifier::normalize_postcode(&c.components.postcode);
            !candidate_norm.is_empty()
                && (candidate_norm == requested_norm
                    || (query.classification != PostcodeClass::FullPostcode
                        && candidate_norm.starts_with(&requested_norm)))
        })
        .count()
}
