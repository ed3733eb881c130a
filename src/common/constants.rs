/// Provider name constants to ensure consistency across the codebase
// Provider tags (used in responses, CLI and metrics labels)
pub const LICENSED_PROVIDER: &str = "licensed";
pub const GEOCODER_PROVIDER: &str = "geocoder";
pub const PLACES_PROVIDER: &str = "places";
pub const LOCAL_PROVIDER: &str = "local";

/// Country fields default to the United Kingdom when a provider omits them
pub const DEFAULT_COUNTRY: &str = "United Kingdom";
pub const DEFAULT_COUNTRY_HINT: &str = "GB";

// Query shape limits enforced at the endpoint boundary
pub const MIN_QUERY_LEN: usize = 2;
pub const MAX_QUERY_LEN: usize = 200;
pub const MAX_RESULT_LIMIT: usize = 50;

/// Markers that identify placeholder/test data slipped into provider responses.
/// Any candidate whose display text contains one of these is dropped.
pub const PLACEHOLDER_MARKERS: &[&str] = &[
    "test", "fake", "dummy", "sample", "example", "mock", "lorem", "ipsum",
];
