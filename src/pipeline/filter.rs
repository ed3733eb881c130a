//! Deduplication and authenticity filtering.
//!
//! Candidates that fail any rule are dropped, never corrected. Drops are a
//! data-quality event, not an error, so they only show up at debug level
//! and in the filter metrics.

use std::collections::HashSet;

use tracing::debug;

use crate::common::constants;
use crate::common::types::{AddressCandidate, AddressQuery, MatchScope, ProviderTag};
use crate::metrics;

/// True when the text carries a placeholder marker ("123 Test Street" etc.)
fn contains_placeholder(text: &str) -> bool {
    let lowered = text.to_lowercase();
    constants::PLACEHOLDER_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Postcode-class agreement. Exact matches always pass; the lenient
/// same-outward path is reserved for the geocoder fallback, whose results
/// cluster around a proximity bias rather than the exact postcode.
fn postcode_agrees(candidate: &AddressCandidate, query: &AddressQuery) -> bool {
    if !query.classification.is_postcode_shaped() || candidate.components.postcode.is_empty() {
        return true;
    }
    match candidate.match_scope {
        MatchScope::Exact => true,
        MatchScope::Outward => candidate.provider == ProviderTag::Geocoder,
        MatchScope::None => false,
    }
}

pub fn filter_candidates(
    candidates: Vec<AddressCandidate>,
    query: &AddressQuery,
) -> Vec<AddressCandidate> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept = Vec::with_capacity(candidates.len());
    let postcode_shaped = query.classification.is_postcode_shaped();

    for candidate in candidates {
        // First occurrence wins; later duplicates are dropped
        let dedup_key = candidate.display_text.trim().to_lowercase();
        if !seen.insert(dedup_key) {
            debug!(display = %candidate.display_text, "dropped duplicate candidate");
            metrics::candidate_filtered("duplicate");
            continue;
        }

        if candidate.coordinates.is_absent() {
            debug!(display = %candidate.display_text, "dropped candidate without coordinates");
            metrics::candidate_filtered("no_coordinates");
            continue;
        }

        if postcode_shaped
            && (candidate.components.street.is_empty() || candidate.components.postcode.is_empty())
        {
            debug!(display = %candidate.display_text, "dropped candidate missing street/postcode");
            metrics::candidate_filtered("missing_structure");
            continue;
        }

        if contains_placeholder(&candidate.display_text)
            || contains_placeholder(&candidate.full_address)
        {
            debug!(display = %candidate.display_text, "dropped placeholder candidate");
            metrics::candidate_filtered("placeholder");
            continue;
        }

        if !postcode_agrees(&candidate, query) {
            debug!(
                display = %candidate.display_text,
                postcode = %candidate.components.postcode,
                "dropped candidate with non-matching postcode"
            );
            metrics::candidate_filtered("postcode_mismatch");
            continue;
        }

        kept.push(candidate);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{AddressComponents, Coordinates};
    use crate::pipeline::normalize::normalize_all;

    fn candidate(
        display: &str,
        street: &str,
        postcode: &str,
        provider: ProviderTag,
    ) -> AddressCandidate {
        AddressCandidate {
            id: format!("{provider}-{display}"),
            display_text: display.to_string(),
            full_address: display.to_string(),
            components: AddressComponents {
                house_number: "1".to_string(),
                street: street.to_string(),
                city: "London".to_string(),
                postcode: postcode.to_string(),
                country: "United Kingdom".to_string(),
                ..AddressComponents::default()
            },
            coordinates: Coordinates::new(51.5, -0.12),
            provider,
            confidence: 0.9,
            priority: 0,
            has_complete_address: false,
            is_postcode_match: false,
            match_scope: Default::default(),
        }
    }

    fn run(candidates: Vec<AddressCandidate>, query: &AddressQuery) -> Vec<AddressCandidate> {
        filter_candidates(normalize_all(&candidates, query), query)
    }

    #[test]
    fn test_duplicates_first_occurrence_wins() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let mut first = candidate("1 Whitehall, London", "Whitehall", "SW1A 1AA", ProviderTag::Licensed);
        first.confidence = 0.96;
        let second = candidate("1 Whitehall, London", "Whitehall", "SW1A 1AA", ProviderTag::Geocoder);

        let kept = run(vec![first, second], &query);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].provider, ProviderTag::Licensed);
    }

    #[test]
    fn test_zero_coordinates_dropped() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let mut bad = candidate("2 Whitehall, London", "Whitehall", "SW1A 1AA", ProviderTag::Licensed);
        bad.coordinates = Coordinates::new(0.0, 0.0);
        assert!(run(vec![bad], &query).is_empty());
    }

    #[test]
    fn test_missing_structure_dropped_for_postcode_queries() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let bad = candidate("Somewhere in London", "", "SW1A 1AA", ProviderTag::Licensed);
        assert!(run(vec![bad], &query).is_empty());
    }

    #[test]
    fn test_placeholder_markers_dropped() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let fake = candidate("123 Test Street, London", "Test Street", "SW1A 1AA", ProviderTag::Geocoder);
        assert!(run(vec![fake], &query).is_empty());
    }

    #[test]
    fn test_wrong_postcode_dropped() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let wrong = candidate("5 Whitehall, London", "Whitehall", "N1 9GU", ProviderTag::Licensed);
        assert!(run(vec![wrong], &query).is_empty());
    }

    #[test]
    fn test_outward_match_allowed_only_for_geocoder() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let lenient = candidate("7 Whitehall, London", "Whitehall", "SW1A 2AA", ProviderTag::Geocoder);
        let strict = candidate("9 Whitehall, London", "Whitehall", "SW1A 2AA", ProviderTag::Licensed);

        let kept = run(vec![lenient, strict], &query);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].provider, ProviderTag::Geocoder);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let input = normalize_all(
            &[
                candidate("1 Whitehall, London", "Whitehall", "SW1A 1AA", ProviderTag::Licensed),
                candidate("1 Whitehall, London", "Whitehall", "SW1A 1AA", ProviderTag::Geocoder),
                candidate("2 Whitehall, London", "Whitehall", "SW1A 1AA", ProviderTag::Licensed),
            ],
            &query,
        );

        let once = filter_candidates(input, &query);
        let twice = filter_candidates(once.clone(), &query);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_free_text_query_skips_structure_and_postcode_rules() {
        let query = AddressQuery::new("Downing Street", None, Some(10));
        let mut minimal = candidate("Downing Street, London", "Downing Street", "", ProviderTag::Places);
        minimal.components.house_number = String::new();
        let kept = run(vec![minimal], &query);
        assert_eq!(kept.len(), 1);
    }
}
