//! Candidate canonicalization.
//!
//! Every provider's output passes through here before filtering and ranking:
//! whitespace is trimmed, the country is defaulted, postcodes are formatted,
//! and the derived flags are computed against the query. Normalization
//! returns new records; nothing is patched in place.

use crate::classifier::{self, PostcodeClass};
use crate::common::constants;
use crate::common::types::{AddressCandidate, AddressQuery, MatchScope};

/// How the candidate's postcode relates to what the query asked for
fn postcode_scope(candidate_postcode: &str, query: &AddressQuery) -> MatchScope {
    if candidate_postcode.is_empty() {
        return MatchScope::None;
    }
    let Some(requested) = query.requested_postcode() else {
        return MatchScope::None;
    };

    let candidate_norm = classifier::normalize_postcode(candidate_postcode);
    let requested_norm = classifier::normalize_postcode(&requested);

    match query.classification {
        PostcodeClass::FullPostcode => {
            if candidate_norm == requested_norm {
                MatchScope::Exact
            } else if classifier::outward_code(&candidate_norm)
                == classifier::outward_code(&requested_norm)
            {
                MatchScope::Outward
            } else {
                MatchScope::None
            }
        }
        // A partial query names a district; any postcode under it is a hit
        PostcodeClass::PartialPostcode | PostcodeClass::PostcodeLikeToken => {
            if candidate_norm.starts_with(&requested_norm) {
                MatchScope::Exact
            } else {
                MatchScope::None
            }
        }
        PostcodeClass::FreeText => MatchScope::None,
    }
}

pub fn normalize_candidate(candidate: &AddressCandidate, query: &AddressQuery) -> AddressCandidate {
    let mut components = candidate.components.clone();
    components.house_number = components.house_number.trim().to_string();
    components.flat_number = components.flat_number.trim().to_string();
    components.street = components.street.trim().to_string();
    components.city = components.city.trim().to_string();
    components.postcode = if components.postcode.trim().is_empty() {
        String::new()
    } else {
        classifier::format_postcode(&components.postcode)
    };
    if components.country.trim().is_empty() {
        components.country = constants::DEFAULT_COUNTRY.to_string();
    } else {
        components.country = components.country.trim().to_string();
    }

    let display_text = candidate.display_text.trim().to_string();
    let full_address = if candidate.full_address.trim().is_empty() {
        display_text.clone()
    } else {
        candidate.full_address.trim().to_string()
    };

    let premise_line = format!("{} {}", components.house_number, components.street);
    let has_complete_address = !components.house_number.is_empty()
        && !components.street.is_empty()
        && premise_line.trim().len() > 5;

    let match_scope = postcode_scope(&components.postcode, query);

    AddressCandidate {
        id: candidate.id.clone(),
        display_text,
        full_address,
        components,
        coordinates: candidate.coordinates,
        provider: candidate.provider,
        confidence: candidate.confidence.clamp(0.0, 1.0),
        priority: 0,
        has_complete_address,
        is_postcode_match: match_scope != MatchScope::None,
        match_scope,
    }
}

pub fn normalize_all(candidates: &[AddressCandidate], query: &AddressQuery) -> Vec<AddressCandidate> {
    candidates
        .iter()
        .map(|c| normalize_candidate(c, query))
        .collect()
}
