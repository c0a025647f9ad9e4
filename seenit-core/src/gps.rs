//! GPS coordinate extraction from embedded EXIF metadata.
//!
//! Reads the EXIF block of any container `kamadak-exif` understands (JPEG,
//! TIFF, HEIF, PNG, WebP) and converts the GPS degree/minute/second rationals
//! to signed decimal degrees.

use std::io::Cursor;

use exif::{Exif, In, Reader, Tag, Value};
use tracing::debug;

use crate::location::Coordinates;

/// Extract GPS coordinates from image bytes.
///
/// Returns `None` when the bytes carry no readable EXIF block, when the GPS
/// tags are missing or malformed, or when the result is outside WGS84 bounds.
pub fn extract_coordinates(bytes: &[u8]) -> Option<Coordinates> {
    let exif = match Reader::new().read_from_container(&mut Cursor::new(bytes)) {
        Ok(exif) => exif,
        Err(e) => {
            debug!(error = %e, "No readable EXIF block");
            return None;
        }
    };
    coordinates_from_exif(&exif)
}

pub(crate) fn coordinates_from_exif(exif: &Exif) -> Option<Coordinates> {
    let latitude = signed_degrees(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S')?;
    let longitude = signed_degrees(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W')?;

    let coords = Coordinates::new(latitude, longitude);
    if !coords.is_valid() {
        debug!(latitude, longitude, "GPS coordinates out of range");
        return None;
    }
    Some(coords)
}

fn signed_degrees(exif: &Exif, value_tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let degrees = match field.value {
        Value::Rational(ref parts) if !parts.is_empty() => {
            let component = |i: usize| parts.get(i).map(|r| r.to_f64()).unwrap_or(0.0);
            component(0) + component(1) / 60.0 + component(2) / 3600.0
        }
        _ => {
            debug!(tag = %value_tag, "GPS tag has unexpected type");
            return None;
        }
    };

    // A missing reference tag means north / east.
    let negative = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| match f.value {
            Value::Ascii(ref strings) => strings.first().and_then(|s| s.first()).copied(),
            _ => None,
        })
        .map(|c| c.eq_ignore_ascii_case(&negative_ref))
        .unwrap_or(false);

    Some(if negative { -degrees } else { degrees })
}
