//! Generic forward-geocoder adapter.
//!
//! Fallback for both query shapes. Labels come back as free-form strings
//! ("1/2 10 Sword Street, Glasgow, G31 1HZ, United Kingdom"), so house and
//! flat numbers are recovered with small regex parsers kept as pure
//! functions. For postcode queries the adapter first resolves the postcode
//! centroid and then runs several proximity-biased pattern searches, since a
//! bare postcode query mostly returns area pins rather than buildings.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::classifier::{self, PostcodeClass};
use crate::common::error::{AddressError, Result};
use crate::common::types::{
    AddressCandidate, AddressComponents, AddressProvider, AddressQuery, Coordinates, ProviderTag,
};
use crate::config::GeocoderConfig;

/// Tenement flat-slash notation: "0/2 10 Sword Street"
static FLAT_SLASH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+/\d+)\s+(.+)$").unwrap());

/// Named sub-building prefix: "Flat 3 40 High Street", "Unit 2 ..."
static NAMED_FLAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^((?:flat|unit)\s*\d+[A-Za-z]?)\s+(.+)$").unwrap());

/// House-number prefix with optional letter suffix: "12A Duke Street"
static HOUSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+[A-Za-z]?)\s+(.+)$").unwrap());

pub struct GeocoderProvider {
    client: reqwest::Client,
    base_url: String,
    centroid_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ForwardResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    place_name: String,
    #[serde(default)]
    place_type: Vec<String>,
    relevance: Option<f64>,
    center: Option<[f64; 2]>,
    #[serde(default)]
    context: Vec<ContextEntry>,
}

#[derive(Debug, Deserialize)]
struct ContextEntry {
    #[serde(default)]
    id: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct CentroidResponse {
    result: Option<Centroid>,
}

#[derive(Debug, Deserialize)]
struct Centroid {
    latitude: f64,
    longitude: f64,
}

/// Parts recovered from the leading segment of a geocoder label
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Premise {
    pub flat: String,
    pub house: String,
    pub street: String,
}

/// Split "0/2 10 Sword Street" into flat, house number and street name.
/// Pure; feeds both candidate components and the ranking keys.
pub(crate) fn extract_premise(label: &str) -> Premise {
    let label = label.trim();

    if let Some(caps) = FLAT_SLASH_RE.captures(label) {
        let flat = caps[1].to_string();
        let rest = caps[2].trim();
        return match HOUSE_RE.captures(rest) {
            Some(inner) => Premise {
                flat,
                house: inner[1].to_string(),
                street: inner[2].to_string(),
            },
            None => Premise {
                flat,
                house: String::new(),
                street: rest.to_string(),
            },
        };
    }

    if let Some(caps) = NAMED_FLAT_RE.captures(label) {
        let flat = caps[1].to_string();
        let rest = caps[2].trim();
        return match HOUSE_RE.captures(rest) {
            Some(inner) => Premise {
                flat,
                house: inner[1].to_string(),
                street: inner[2].to_string(),
            },
            None => Premise {
                flat,
                house: String::new(),
                street: rest.to_string(),
            },
        };
    }

    if let Some(caps) = HOUSE_RE.captures(label) {
        return Premise {
            flat: String::new(),
            house: caps[1].to_string(),
            street: caps[2].to_string(),
        };
    }

    Premise {
        flat: String::new(),
        house: String::new(),
        street: label.to_string(),
    }
}

fn context_value<'a>(context: &'a [ContextEntry], prefix: &str) -> &'a str {
    context
        .iter()
        .find(|c| c.id.starts_with(prefix))
        .map(|c| c.text.as_str())
        .unwrap_or("")
}

/// Map one feature, or None when it is not a usable street address.
/// Features whose label leads with the bare postcode are area pins
/// ("G31 1DZ, Glasgow, Scotland, United Kingdom"), not buildings.
fn feature_to_candidate(feature: &Feature, limit_confidence: f64) -> Option<AddressCandidate> {
    if !feature.place_type.iter().any(|t| t == "address") {
        return None;
    }

    let first_segment = feature.place_name.split(',').next().unwrap_or("").trim();
    if first_segment.is_empty() {
        return None;
    }
    if classifier::classify(first_segment) == PostcodeClass::FullPostcode {
        return None;
    }

    let premise = extract_premise(first_segment);
    let street = if premise.street.is_empty() {
        feature.text.clone()
    } else {
        premise.street.clone()
    };

    // Context is authoritative; older label formats only carry the
    // postcode inside the formatted place name
    let mut postcode = context_value(&feature.context, "postcode").to_string();
    if postcode.is_empty() {
        postcode = classifier::find_postcode(&feature.place_name).unwrap_or_default();
    }
    let city = [
        context_value(&feature.context, "place"),
        context_value(&feature.context, "locality"),
        context_value(&feature.context, "district"),
    ]
    .into_iter()
    .find(|v| !v.is_empty())
    .unwrap_or("");

    let coordinates = feature
        .center
        .map(|[lng, lat]| Coordinates::new(lat, lng))
        .unwrap_or_default();

    Some(AddressCandidate {
        id: feature.id.clone(),
        display_text: feature.place_name.clone(),
        full_address: feature.place_name.clone(),
        components: AddressComponents {
            house_number: premise.house,
            flat_number: premise.flat,
            street,
            city: city.to_string(),
            postcode,
            ..AddressComponents::default()
        },
        coordinates,
        provider: ProviderTag::Geocoder,
        confidence: feature.relevance.unwrap_or(limit_confidence),
        priority: 0,
        has_complete_address: false,
        is_postcode_match: false,
        match_scope: Default::default(),
    })
}

impl GeocoderProvider {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            centroid_url: config.centroid_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn forward(
        &self,
        text: &str,
        country: &str,
        limit: usize,
        proximity: Option<Coordinates>,
    ) -> Result<Vec<Feature>> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| AddressError::Config(format!("invalid geocoder base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AddressError::Config("geocoder base url cannot be a base".to_string()))?
            .extend(["geocoding", "v5", "mapbox.places"])
            .push(&format!("{text}.json"));
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("access_token", &self.api_key)
                .append_pair("country", &country.to_lowercase())
                .append_pair("types", "address")
                .append_pair("language", "en")
                .append_pair("autocomplete", "true")
                .append_pair("limit", &limit.to_string());
            if let Some(c) = proximity {
                pairs.append_pair("proximity", &format!("{},{}", c.lng, c.lat));
            }
        }

        let response = self.client.get(url).send().await?.error_for_status()?;
        let data: ForwardResponse = response.json().await?;
        Ok(data.features)
    }

    /// Postcode-to-centroid lookup used purely for proximity bias
    async fn fetch_centroid(&self, postcode: &str) -> Result<Coordinates> {
        let compact = classifier::normalize_postcode(postcode);
        let url = format!("{}/postcodes/{}", self.centroid_url, compact);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        let data: CentroidResponse = response.json().await?;
        let centroid = data.result.ok_or_else(|| {
            AddressError::MissingField(format!("no centroid for postcode {postcode}"))
        })?;
        Ok(Coordinates::new(centroid.latitude, centroid.longitude))
    }
}

#[async_trait]
impl AddressProvider for GeocoderProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Geocoder
    }

    #[instrument(skip(self), fields(provider = "geocoder"))]
    async fn search(&self, query: &AddressQuery) -> Result<Vec<AddressCandidate>> {
        let mut features: Vec<Feature> = Vec::new();

        if let Some(postcode) = query.requested_postcode() {
            let proximity = match self.fetch_centroid(&postcode).await {
                Ok(c) => Some(c),
                Err(e) => {
                    debug!("centroid lookup failed, searching without bias: {e}");
                    None
                }
            };

            // A bare postcode query returns mostly area pins; street-word
            // variants pull in actual buildings around the centroid.
            let patterns = [
                postcode.clone(),
                format!("street {postcode}"),
                format!("road {postcode}"),
                format!("avenue {postcode}"),
            ];

            let mut seen: HashSet<String> = HashSet::new();
            let mut first_error: Option<AddressError> = None;
            for pattern in &patterns {
                match self
                    .forward(pattern, &query.country_hint, 10, proximity)
                    .await
                {
                    Ok(batch) => {
                        for feature in batch {
                            if seen.insert(feature.id.clone()) {
                                features.push(feature);
                            }
                        }
                    }
                    Err(e) => {
                        warn!(pattern = %pattern, "geocoder pattern search failed: {e}");
                        if first_error.is_none() {
                            first_error = Some(e);
                        }
                    }
                }
            }

            // Every pattern failing is a provider failure, not zero results
            if features.is_empty() {
                if let Some(e) = first_error {
                    return Err(e);
                }
            }
        } else {
            features = self
                .forward(&query.raw, &query.country_hint, query.limit, None)
                .await?;
        }

        let candidates: Vec<AddressCandidate> = features
            .iter()
            .filter_map(|f| feature_to_candidate(f, 0.8))
            .take(query.limit)
            .collect();
        debug!(kept = candidates.len(), "geocoder search mapped features");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_premise_flat_slash() {
        let premise = extract_premise("0/2 10 Sword Street");
        assert_eq!(premise.flat, "0/2");
        assert_eq!(premise.house, "10");
        assert_eq!(premise.street, "Sword Street");
    }

    #[test]
    fn test_extract_premise_flat_slash_without_house() {
        let premise = extract_premise("1/1 Hillfoot Street");
        assert_eq!(premise.flat, "1/1");
        assert_eq!(premise.house, "");
        assert_eq!(premise.street, "Hillfoot Street");
    }

    #[test]
    fn test_extract_premise_house_with_suffix() {
        let premise = extract_premise("12A Duke Street");
        assert_eq!(premise.flat, "");
        assert_eq!(premise.house, "12A");
        assert_eq!(premise.street, "Duke Street");
    }

    #[test]
    fn test_extract_premise_named_flat() {
        let premise = extract_premise("Flat 3 40 High Street");
        assert_eq!(premise.flat, "Flat 3");
        assert_eq!(premise.house, "40");
        assert_eq!(premise.street, "High Street");
    }

    #[test]
    fn test_extract_premise_street_only() {
        let premise = extract_premise("Hillfoot Street");
        assert_eq!(premise.flat, "");
        assert_eq!(premise.house, "");
        assert_eq!(premise.street, "Hillfoot Street");
    }

    fn feature(value: serde_json::Value) -> Feature {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_feature_to_candidate_full_label() {
        let f = feature(json!({
            "id": "address.123",
            "text": "Sword Street",
            "place_name": "0/2 10 Sword Street, Glasgow, G31 1HZ, United Kingdom",
            "place_type": ["address"],
            "relevance": 0.92,
            "center": [-4.2212, 55.8563],
            "context": [
                {"id": "postcode.456", "text": "G31 1HZ"},
                {"id": "place.789", "text": "Glasgow"}
            ]
        }));
        let candidate = feature_to_candidate(&f, 0.8).unwrap();
        assert_eq!(candidate.components.flat_number, "0/2");
        assert_eq!(candidate.components.house_number, "10");
        assert_eq!(candidate.components.street, "Sword Street");
        assert_eq!(candidate.components.city, "Glasgow");
        assert_eq!(candidate.components.postcode, "G31 1HZ");
        assert_eq!(candidate.coordinates, Coordinates::new(55.8563, -4.2212));
        assert_eq!(candidate.confidence, 0.92);
        assert_eq!(candidate.provider, ProviderTag::Geocoder);
    }

    #[test]
    fn test_postcode_area_pin_rejected() {
        let f = feature(json!({
            "id": "postcode.1",
            "text": "G31 1DZ",
            "place_name": "G31 1DZ, Glasgow, Glasgow City, Scotland, United Kingdom",
            "place_type": ["address"],
            "center": [-4.2, 55.85],
            "context": []
        }));
        assert!(feature_to_candidate(&f, 0.8).is_none());
    }

    #[test]
    fn test_non_address_feature_rejected() {
        let f = feature(json!({
            "id": "poi.1",
            "text": "Glasgow",
            "place_name": "Glasgow, Scotland, United Kingdom",
            "place_type": ["place"],
            "center": [-4.25, 55.86],
            "context": []
        }));
        assert!(feature_to_candidate(&f, 0.8).is_none());
    }

    #[test]
    fn test_postcode_recovered_from_label_when_context_lacks_it() {
        let f = feature(json!({
            "id": "address.77",
            "text": "Duke Street",
            "place_name": "100 Duke Street, Glasgow G31 1HZ, United Kingdom",
            "place_type": ["address"],
            "center": [-4.22, 55.85],
            "context": [{"id": "place.789", "text": "Glasgow"}]
        }));
        let candidate = feature_to_candidate(&f, 0.8).unwrap();
        assert_eq!(candidate.components.postcode, "G31 1HZ");
    }

    #[test]
    fn test_missing_center_yields_absent_coordinates() {
        let f = feature(json!({
            "id": "address.9",
            "text": "Duke Street",
            "place_name": "100 Duke Street, Glasgow, United Kingdom",
            "place_type": ["address"],
            "context": []
        }));
        let candidate = feature_to_candidate(&f, 0.8).unwrap();
        assert!(candidate.coordinates.is_absent());
    }
}
