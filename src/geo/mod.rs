//! Geolocation of uploads from embedded GPS metadata.
//!
//! Coordinate resolution and place-name resolution fail independently:
//! - no usable GPS tags: `GeoResult::Unknown` (null coordinates, "Unknown")
//! - coordinates but a failed reverse lookup: coordinates kept, place
//!   "Unknown Location"
//!
//! Resolution never fails the caller. Degraded outcomes are logged.

mod geocode;
mod metadata;

use std::path::Path;

pub use geocode::{DisabledGeocoder, GoogleGeocoder, ReverseGeocoder, DEFAULT_GEOCODE_ENDPOINT};
pub use metadata::{dms_to_degrees, ExifTagReader, PositionTagReader, PositionTags};

/// Place name when the image has no usable coordinates.
pub const UNKNOWN_PLACE: &str = "Unknown";
/// Place name when coordinates exist but reverse geocoding failed.
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Resolved location of an upload.
///
/// Latitude and longitude are present together or not at all.
#[derive(Clone, Debug, PartialEq)]
pub enum GeoResult {
    Unknown,
    Located {
        latitude: f64,
        longitude: f64,
        place: String,
    },
}

impl GeoResult {
    pub fn latitude(&self) -> Option<f64> {
        match self {
            GeoResult::Unknown => None,
            GeoResult::Located { latitude, .. } => Some(*latitude),
        }
    }

    pub fn longitude(&self) -> Option<f64> {
        match self {
            GeoResult::Unknown => None,
            GeoResult::Located { longitude, .. } => Some(*longitude),
        }
    }

    pub fn place_name(&self) -> &str {
        match self {
            GeoResult::Unknown => UNKNOWN_PLACE,
            GeoResult::Located { place, .. } => place,
        }
    }
}

pub struct GeoResolver {
    reader: Box<dyn PositionTagReader>,
    geocoder: Box<dyn ReverseGeocoder>,
}

impl GeoResolver {
    pub fn new(reader: Box<dyn PositionTagReader>, geocoder: Box<dyn ReverseGeocoder>) -> Self {
        Self { reader, geocoder }
    }

    /// EXIF reader with the given geocoder.
    pub fn with_geocoder<G: ReverseGeocoder + 'static>(geocoder: G) -> Self {
        Self::new(Box::new(ExifTagReader), Box::new(geocoder))
    }

    pub fn resolve(&self, image_path: &Path) -> GeoResult {
        let tags = match self.reader.read_position_tags(image_path) {
            Ok(Some(tags)) => tags,
            Ok(None) => return GeoResult::Unknown,
            Err(err) => {
                log::warn!("geolocation degraded: metadata unreadable: {:#}", err);
                return GeoResult::Unknown;
            }
        };
        let Some((latitude, longitude)) = tags.to_decimal() else {
            log::debug!("no complete GPS position in {}", image_path.display());
            return GeoResult::Unknown;
        };

        let place = match self.geocoder.lookup(latitude, longitude) {
            Ok(place) => place,
            Err(err) => {
                log::warn!(
                    "geolocation degraded: reverse geocode of ({:.5}, {:.5}) failed: {:#}",
                    latitude,
                    longitude,
                    err
                );
                UNKNOWN_LOCATION.to_string()
            }
        };
        GeoResult::Located {
            latitude,
            longitude,
            place,
        }
    }
}

impl Default for GeoResolver {
    fn default() -> Self {
        Self::with_geocoder(DisabledGeocoder)
    }
}
