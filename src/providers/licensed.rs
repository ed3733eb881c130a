//! Licensed PAF-backed postcode lookup.
//!
//! Highest-trust source: a per-postcode endpoint returning every deliverable
//! address in the postcode as comma-separated PAF lines, with a single
//! postcode-level centroid. First choice for postcode-classified queries.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::classifier::{self, PostcodeClass};
use crate::common::error::Result;
use crate::common::types::{
    AddressCandidate, AddressComponents, AddressProvider, AddressQuery, Coordinates, ProviderTag,
};
use crate::config::ProviderEndpoint;

pub struct LicensedProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Wire shape of the find endpoint: address lines plus a postcode centroid
#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    addresses: Vec<String>,
    #[serde(default)]
    latitude: f64,
    #[serde(default)]
    longitude: f64,
}

impl LicensedProvider {
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

    /// PAF lines arrive as "building, thoroughfare, locality, town" with
    /// empty segments preserved. Index-based split is the documented format.
    fn line_to_candidate(
        line: &str,
        postcode: &str,
        centroid: Coordinates,
        index: usize,
    ) -> AddressCandidate {
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let house_number = parts.first().copied().unwrap_or("").to_string();
        let street = parts.get(1).copied().unwrap_or("").to_string();
        let city = if parts.len() >= 3 {
            parts[parts.len() - 2].to_string()
        } else {
            String::new()
        };

        let display_text = parts
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(", ");
        let full_address = format!("{display_text}, {postcode}");

        AddressCandidate {
            id: format!(
                "licensed-{}-{}",
                classifier::normalize_postcode(postcode),
                index
            ),
            display_text,
            full_address,
            components: AddressComponents {
                house_number,
                street,
                city,
                postcode: postcode.to_string(),
                ..AddressComponents::default()
            },
            coordinates: centroid,
            provider: ProviderTag::Licensed,
            confidence: 0.96,
            priority: 0,
            has_complete_address: false,
            is_postcode_match: false,
            match_scope: Default::default(),
        }
    }
}

#[async_trait]
impl AddressProvider for LicensedProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Licensed
    }

    #[instrument(skip(self), fields(provider = "licensed"))]
    async fn search(&self, query: &AddressQuery) -> Result<Vec<AddressCandidate>> {
        // The find endpoint is keyed by complete postcode; partial queries
        // fall through to the geocoder.
        if query.classification != PostcodeClass::FullPostcode {
            return Ok(Vec::new());
        }
        let postcode = classifier::format_postcode(&query.raw);
        let compact = classifier::normalize_postcode(&query.raw);

        let url = format!("{}/find/{}", self.base_url, compact);
        let response = self
            .client
            .get(&url)
            .query(&[("api-key", self.api_key.as_str()), ("format", "true")])
            .send()
            .await?
            .error_for_status()?;

        let data: FindResponse = response.json().await?;
        let centroid = Coordinates::new(data.latitude, data.longitude);
        debug!(
            postcode = %postcode,
            lines = data.addresses.len(),
            "licensed lookup returned address lines"
        );

        Ok(data
            .addresses
            .iter()
            .take(query.limit)
            .enumerate()
            .map(|(i, line)| Self::line_to_candidate(line, &postcode, centroid, i))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_to_candidate_parses_paf_segments() {
        let centroid = Coordinates::new(51.514, -0.098);
        let candidate = LicensedProvider::line_to_candidate(
            "3, Paternoster Row, London, Greater London",
            "EC1A 1BB",
            centroid,
            2,
        );

        assert_eq!(candidate.components.house_number, "3");
        assert_eq!(candidate.components.street, "Paternoster Row");
        assert_eq!(candidate.components.city, "London");
        assert_eq!(candidate.components.postcode, "EC1A 1BB");
        assert_eq!(
            candidate.display_text,
            "3, Paternoster Row, London, Greater London"
        );
        assert_eq!(
            candidate.full_address,
            "3, Paternoster Row, London, Greater London, EC1A 1BB"
        );
        assert_eq!(candidate.id, "licensed-EC1A1BB-2");
        assert_eq!(candidate.provider, ProviderTag::Licensed);
        assert_eq!(candidate.coordinates, centroid);
    }

    #[test]
    fn test_line_to_candidate_short_line() {
        let candidate = LicensedProvider::line_to_candidate(
            "The Old Mill",
            "G1 1DZ",
            Coordinates::new(55.86, -4.25),
            0,
        );
        assert_eq!(candidate.components.house_number, "The Old Mill");
        assert_eq!(candidate.components.street, "");
        assert_eq!(candidate.components.city, "");
        assert_eq!(candidate.display_text, "The Old Mill");
    }

    #[test]
    fn test_find_response_deserialization() {
        let body = r#"{
            "addresses": ["1, Paternoster Row, , London", "2, Paternoster Row, , London"],
            "latitude": 51.514,
            "longitude": -0.098
        }"#;
        let parsed: FindResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.addresses.len(), 2);
        assert_eq!(parsed.latitude, 51.514);
    }
}
