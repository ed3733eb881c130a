//! Commercial places/text-search adapter.
//!
//! First choice for free-text queries. The upstream happily returns
//! locality and postcode-area pins alongside real buildings, so every
//! result is checked for both a route/street component and a postal-code
//! component before it becomes a candidate.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::common::error::{AddressError, Result};
use crate::common::types::{
    AddressCandidate, AddressComponents, AddressProvider, AddressQuery, Coordinates, ProviderTag,
};
use crate::config::ProviderEndpoint;

/// Flat-slash notation sometimes carried in the result name, e.g. "1/2 Duke Street"
static NAME_FLAT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+/\d+)").unwrap());

pub struct PlacesProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<PlaceResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    status: String,
    result: Option<PlaceResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceResult {
    place_id: String,
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    name: String,
    geometry: Geometry,
    #[serde(default)]
    address_components: Vec<ComponentEntry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: Location,
}

#[derive(Debug, Deserialize)]
struct Location {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct ComponentEntry {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

fn component<'a>(entries: &'a [ComponentEntry], kind: &str) -> &'a str {
    entries
        .iter()
        .find(|c| c.types.iter().any(|t| t == kind))
        .map(|c| c.long_name.as_str())
        .unwrap_or("")
}

impl PlacesProvider {
    pub fn new(endpoint: &ProviderEndpoint) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            api_key: endpoint.api_key.clone(),
        })
    }

    /// Map one raw result, or None when it is a locality/postcode-area pin.
    /// The authoritative rule: a real address carries both a route and a
    /// postal code.
    fn result_to_candidate(result: &PlaceResult, confidence: f64) -> Option<AddressCandidate> {
        let street = component(&result.address_components, "route");
        let postcode = component(&result.address_components, "postal_code");
        if street.is_empty() || postcode.is_empty() {
            return None;
        }

        let street_number = component(&result.address_components, "street_number");
        let premise = component(&result.address_components, "premise");
        let house_number = if !street_number.is_empty() {
            street_number
        } else {
            premise
        };

        let mut flat_number = component(&result.address_components, "subpremise").to_string();
        if let Some(m) = NAME_FLAT_RE.captures(&result.name) {
            // The name field is more precise for tenement-style flats
            flat_number = m[1].to_string();
        }

        let locality = component(&result.address_components, "locality");
        let postal_town = component(&result.address_components, "postal_town");
        let city = if !postal_town.is_empty() {
            postal_town
        } else {
            locality
        };
        let country = component(&result.address_components, "country");

        let display_text = if !flat_number.is_empty() && !house_number.is_empty() {
            format!("{flat_number} {house_number} {street}, {city}")
        } else if !house_number.is_empty() {
            format!("{house_number} {street}, {city}")
        } else {
            format!("{street}, {city}")
        };

        Some(AddressCandidate {
            id: result.place_id.clone(),
            display_text,
            full_address: result.formatted_address.clone(),
            components: AddressComponents {
                house_number: house_number.to_string(),
                flat_number,
                street: street.to_string(),
                city: city.to_string(),
                postcode: postcode.to_string(),
                country: country.to_string(),
            },
            coordinates: Coordinates::new(
                result.geometry.location.lat,
                result.geometry.location.lng,
            ),
            provider: ProviderTag::Places,
            confidence,
            priority: 0,
            has_complete_address: false,
            is_postcode_match: false,
            match_scope: Default::default(),
        })
    }

    /// Full detail lookup by provider id, used by the details endpoint once
    /// the user picks a suggestion.
    pub async fn details(&self, place_id: &str) -> Result<AddressCandidate> {
        let url = format!("{}/maps/api/place/details/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("place_id", place_id),
                (
                    "fields",
                    "place_id,formatted_address,geometry,address_components,name",
                ),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: DetailsResponse = response.json().await?;
        if data.status != "OK" {
            return Err(AddressError::Provider {
                message: format!(
                    "places details error: {} - {}",
                    data.status,
                    data.error_message.unwrap_or_default()
                ),
            });
        }
        let result = data.result.ok_or_else(|| {
            AddressError::MissingField("places details result missing".to_string())
        })?;
        Self::result_to_candidate(&result, 0.98).ok_or(AddressError::Provider {
            message: "places details returned a non-address pin".to_string(),
        })
    }
}

#[async_trait]
impl AddressProvider for PlacesProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Places
    }

    #[instrument(skip(self), fields(provider = "places"))]
    async fn search(&self, query: &AddressQuery) -> Result<Vec<AddressCandidate>> {
        let url = format!("{}/maps/api/place/textsearch/json", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query.raw.as_str()),
                ("region", &query.country_hint.to_lowercase()),
                ("language", "en"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?;

        let data: TextSearchResponse = response.json().await?;
        match data.status.as_str() {
            "OK" => {}
            // Zero results is a normal outcome, not a provider failure
            "ZERO_RESULTS" => return Ok(Vec::new()),
            other => {
                return Err(AddressError::Provider {
                    message: format!(
                        "places search error: {} - {}",
                        other,
                        data.error_message.unwrap_or_default()
                    ),
                })
            }
        }

        let candidates: Vec<AddressCandidate> = data
            .results
            .iter()
            .filter_map(|r| Self::result_to_candidate(r, 0.9))
            .take(query.limit)
            .collect();
        debug!(
            raw = data.results.len(),
            kept = candidates.len(),
            "places search mapped results"
        );
        Ok(candidates)
    }
}
