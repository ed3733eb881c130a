// One adapter per upstream address source. Each owns its wire-format
// parsing and hands back canonical candidates; nothing provider-shaped
// crosses this boundary.

pub mod geocoder;
pub mod licensed;
pub mod local;
pub mod places;

pub use geocoder::GeocoderProvider;
pub use licensed::LicensedProvider;
pub use local::LocalProvider;
pub use places::PlacesProvider;
