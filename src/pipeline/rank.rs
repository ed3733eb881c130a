//! Ranking and deterministic ordering.
//!
//! Each candidate gets an integer priority score, then the whole set is
//! stably sorted: complete addresses first, postcode matches next, more
//! detailed components next, and finally natural street/house/flat order so
//! "2 High Street" lands before "10 High Street". Truncation to the request
//! limit happens only after the full sort, so a later provider's stronger
//! match can displace an earlier provider's weaker one.

use std::cmp::Ordering;

use crate::common::types::{AddressCandidate, AddressQuery, MatchScope};

/// Integer priority, higher = better. Mirrors what the autocomplete UI uses
/// to group suggestions; the comparator below is the authoritative order.
fn score(candidate: &AddressCandidate, query: &AddressQuery) -> i32 {
    let query_lower = query.raw.to_lowercase();
    let display_lower = candidate.display_text.to_lowercase();
    let city_lower = candidate.components.city.to_lowercase();

    let mut priority = if query.classification.is_postcode_shaped() {
        match candidate.match_scope {
            MatchScope::Exact => {
                if candidate.has_complete_address {
                    10
                } else if candidate.display_text.len() > 3 {
                    8
                } else {
                    6
                }
            }
            MatchScope::Outward => {
                if candidate.has_complete_address {
                    7
                } else {
                    4
                }
            }
            MatchScope::None => {
                if !candidate.components.postcode.is_empty() {
                    if candidate.has_complete_address {
                        5
                    } else {
                        2
                    }
                } else if !city_lower.is_empty() && city_lower.contains(&query_lower) {
                    1
                } else {
                    0
                }
            }
        }
    } else if display_lower.contains(&query_lower) {
        if candidate.has_complete_address {
            6
        } else {
            3
        }
    } else if !city_lower.is_empty() && city_lower.contains(&query_lower) {
        2
    } else {
        0
    };

    if candidate.has_complete_address {
        priority += 1;
    }
    priority
}

/// Natural house-number key: numeric prefix first, letter suffix second,
/// so 2 < 10 < 10A. Missing numbers sort after numbered premises.
fn house_number_key(house: &str) -> (u64, String) {
    let digits: String = house.chars().take_while(|c| c.is_ascii_digit()).collect();
    let suffix = house[digits.len()..].trim().to_lowercase();
    let number = if digits.is_empty() {
        u64::MAX
    } else {
        digits.parse().unwrap_or(u64::MAX)
    };
    (number, suffix)
}

fn compare(a: &AddressCandidate, b: &AddressCandidate) -> Ordering {
    // Complete structured addresses before anything else
    b.has_complete_address
        .cmp(&a.has_complete_address)
        // Then candidates matching the requested postcode
        .then_with(|| b.is_postcode_match.cmp(&a.is_postcode_match))
        // Then richer component detail
        .then_with(|| b.detail_len().cmp(&a.detail_len()))
        // Then natural street / house / flat order
        .then_with(|| {
            a.components
                .street
                .to_lowercase()
                .cmp(&b.components.street.to_lowercase())
        })
        .then_with(|| {
            house_number_key(&a.components.house_number)
                .cmp(&house_number_key(&b.components.house_number))
        })
        .then_with(|| a.components.flat_number.cmp(&b.components.flat_number))
}

pub fn rank_candidates(
    candidates: Vec<AddressCandidate>,
    query: &AddressQuery,
) -> Vec<AddressCandidate> {
    let mut ranked: Vec<AddressCandidate> = candidates
        .into_iter()
        .map(|mut c| {
            c.priority = score(&c, query);
            c
        })
        .collect();

    ranked.sort_by(compare);
    ranked.truncate(query.limit);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::{AddressComponents, Coordinates, ProviderTag};
    use crate::pipeline::normalize::normalize_all;

    fn candidate(house: &str, flat: &str, street: &str, postcode: &str) -> AddressCandidate {
        let display = if flat.is_empty() {
            format!("{house} {street}, London")
        } else {
            format!("{house} {street}, Flat {flat}, London")
        };
        AddressCandidate {
            id: format!("t-{house}-{flat}-{street}"),
            display_text: display.clone(),
            full_address: display,
            components: AddressComponents {
                house_number: house.to_string(),
                flat_number: flat.to_string(),
                street: street.to_string(),
                city: "London".to_string(),
                postcode: postcode.to_string(),
                country: "United Kingdom".to_string(),
            },
            coordinates: Coordinates::new(51.5, -0.1),
            provider: ProviderTag::Licensed,
            confidence: 0.95,
            priority: 0,
            has_complete_address: false,
            is_postcode_match: false,
            match_scope: Default::default(),
        }
    }

    fn rank(mut input: Vec<AddressCandidate>, query: &AddressQuery) -> Vec<AddressCandidate> {
        input = normalize_all(&input, query);
        rank_candidates(input, query)
    }

    #[test]
    fn test_numeric_house_order_within_street() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let ranked = rank(
            vec![
                candidate("10", "", "High Street", "SW1A 1AA"),
                candidate("2", "", "High Street", "SW1A 1AA"),
                candidate("10", "2B", "High Street", "SW1A 1AA"),
            ],
            &query,
        );

        let order: Vec<(&str, &str)> = ranked
            .iter()
            .map(|c| {
                (
                    c.components.house_number.as_str(),
                    c.components.flat_number.as_str(),
                )
            })
            .collect();
        assert_eq!(order, vec![("2", ""), ("10", ""), ("10", "2B")]);
    }

    #[test]
    fn test_streets_sort_alphabetically() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let ranked = rank(
            vec![
                candidate("1", "", "Cedar Road", "SW1A 1AA"),
                candidate("1", "", "Abbey Road", "SW1A 1AA"),
            ],
            &query,
        );
        // Streets tie on detail length here, so alphabetical order decides
        assert_eq!(ranked[0].components.street, "Abbey Road");
    }

    #[test]
    fn test_complete_addresses_first() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let mut incomplete = candidate("", "", "Whitehall", "SW1A 1AA");
        incomplete.display_text = "Whitehall, London".to_string();
        let complete = candidate("12", "", "Whitehall", "SW1A 1AA");

        let ranked = rank(vec![incomplete, complete], &query);
        assert!(ranked[0].has_complete_address);
        assert_eq!(ranked[0].components.house_number, "12");
    }

    #[test]
    fn test_postcode_match_outranks_outward_match() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let mut outward = candidate("1", "", "Whitehall", "SW1A 2AA");
        outward.provider = ProviderTag::Geocoder;
        let exact = candidate("1", "", "Horse Guards Road", "SW1A 1AA");

        let ranked = rank(vec![outward, exact], &query);
        // Both have complete addresses and count as postcode matches; the
        // exact one carries the longer street detail and the higher priority
        assert_eq!(ranked[0].components.postcode, "SW1A 1AA");
        assert!(ranked[0].priority > ranked[1].priority);
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let input = vec![
            candidate("3", "", "Whitehall", "SW1A 1AA"),
            candidate("1", "", "Birdcage Walk", "SW1A 1AA"),
            candidate("2", "1/1", "Whitehall", "SW1A 1AA"),
        ];
        let query2 = query.clone();

        let first = rank(input.clone(), &query);
        for _ in 0..5 {
            let again = rank(input.clone(), &query2);
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_truncation_happens_after_sort() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(2));
        let ranked = rank(
            vec![
                candidate("30", "", "Whitehall", "SW1A 1AA"),
                candidate("20", "", "Whitehall", "SW1A 1AA"),
                candidate("1", "", "Whitehall", "SW1A 1AA"),
            ],
            &query,
        );
        assert_eq!(ranked.len(), 2);
        // The best two by house number survive, not the first two seen
        assert_eq!(ranked[0].components.house_number, "1");
        assert_eq!(ranked[1].components.house_number, "20");
    }

    #[test]
    fn test_priority_assigned() {
        let query = AddressQuery::new("SW1A 1AA", None, Some(10));
        let ranked = rank(vec![candidate("12", "", "Whitehall", "SW1A 1AA")], &query);
        // Exact postcode + complete address lands at the top of the ladder
        assert_eq!(ranked[0].priority, 11);
    }
}
