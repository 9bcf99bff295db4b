//! GPS position tags read from EXIF metadata.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use exif::{In, Reader, Tag, Value};

/// Raw GPS tag values as stored in the image.
///
/// Coordinates are (degrees, minutes, seconds) components; trailing
/// components may be missing in sloppy writers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PositionTags {
    pub latitude: Option<Vec<f64>>,
    pub latitude_ref: Option<String>,
    pub longitude: Option<Vec<f64>>,
    pub longitude_ref: Option<String>,
}

impl PositionTags {
    /// Signed decimal (latitude, longitude), or `None` when a coordinate or
    /// its hemisphere reference is missing.
    pub fn to_decimal(&self) -> Option<(f64, f64)> {
        let lat = dms_to_degrees(self.latitude.as_deref()?)?;
        let lon = dms_to_degrees(self.longitude.as_deref()?)?;
        let lat_ref = self.latitude_ref.as_deref()?.trim();
        let lon_ref = self.longitude_ref.as_deref()?.trim();

        let lat = if lat_ref.eq_ignore_ascii_case("S") { -lat } else { lat };
        let lon = if lon_ref.eq_ignore_ascii_case("W") { -lon } else { lon };
        Some((lat, lon))
    }
}

/// `degrees + minutes/60 + seconds/3600`.
pub fn dms_to_degrees(components: &[f64]) -> Option<f64> {
    let degrees = *components.first()?;
    let minutes = components.get(1).copied().unwrap_or(0.0);
    let seconds = components.get(2).copied().unwrap_or(0.0);
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    value.is_finite().then_some(value)
}

/// Metadata reader collaborator.
pub trait PositionTagReader: Send + Sync {
    /// Read GPS tags. `Ok(None)` when the image carries no metadata at all.
    fn read_position_tags(&self, image_path: &Path) -> Result<Option<PositionTags>>;
}

/// Reads GPS tags with `kamadak-exif`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExifTagReader;

impl PositionTagReader for ExifTagReader {
    fn read_position_tags(&self, image_path: &Path) -> Result<Option<PositionTags>> {
        let file = File::open(image_path)
            .with_context(|| format!("open {} for metadata", image_path.display()))?;
        let mut reader = BufReader::new(file);
        let exif = match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("read EXIF from {}", image_path.display())
                })
            }
        };

        let rationals = |tag: Tag| {
            exif.get_field(tag, In::PRIMARY).and_then(|field| match &field.value {
                Value::Rational(parts) => {
                    Some(parts.iter().map(|r| r.to_f64()).collect::<Vec<f64>>())
                }
                _ => None,
            })
        };
        let ascii = |tag: Tag| {
            exif.get_field(tag, In::PRIMARY).and_then(|field| match &field.value {
                Value::Ascii(parts) => parts
                    .first()
                    .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string()),
                _ => None,
            })
        };

        Ok(Some(PositionTags {
            latitude: rationals(Tag::GPSLatitude),
            latitude_ref: ascii(Tag::GPSLatitudeRef),
            longitude: rationals(Tag::GPSLongitude),
            longitude_ref: ascii(Tag::GPSLongitudeRef),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exif::experimental::Writer;
    use exif::{Field, Rational};
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn dms(d: u32, m: u32, s: u32) -> Value {
        Value::Rational(vec![Rational::from((d, 1)), (m, 1).into(), (s, 1).into()])
    }

    fn ascii_field(tag: Tag, text: &str) -> Field {
        Field {
            tag,
            ifd_num: In::PRIMARY,
            value: Value::Ascii(vec![text.as_bytes().to_vec()]),
        }
    }

    /// Baseline JPEG carrying an APP1 Exif segment with the given GPS fields.
    fn jpeg_with_gps(fields: &[Field]) -> Vec<u8> {
        let jpeg = crate::codec::encode(&RgbImage::new(8, 8), ImageFormat::Jpeg).unwrap();
        let mut writer = Writer::new();
        for field in fields {
            writer.push_field(field);
        }
        let mut tiff = Cursor::new(Vec::new());
        writer.write(&mut tiff, false).unwrap();
        let tiff = tiff.into_inner();

        let segment_len = u16::try_from(2 + 6 + tiff.len()).unwrap();
        let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
        out.extend_from_slice(&jpeg[..2]);
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&segment_len.to_be_bytes());
        out.extend_from_slice(b"Exif\0\0");
        out.extend_from_slice(&tiff);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    fn tags(lat: &[f64], lat_ref: &str, lon: &[f64], lon_ref: &str) -> PositionTags {
        PositionTags {
            latitude: Some(lat.to_vec()),
            latitude_ref: Some(lat_ref.to_string()),
            longitude: Some(lon.to_vec()),
            longitude_ref: Some(lon_ref.to_string()),
        }
    }

    #[test]
    fn converts_dms_with_hemisphere_signs() {
        let (lat, lon) = tags(&[40.0, 26.0, 46.0], "N", &[79.0, 56.0, 55.0], "W")
            .to_decimal()
            .unwrap();
        assert!((lat - 40.446111).abs() < 1e-5);
        assert!((lon + 79.948611).abs() < 1e-5);

        let (lat, lon) = tags(&[33.0, 52.0, 4.0], "S", &[151.0, 12.0, 36.0], "E")
            .to_decimal()
            .unwrap();
        assert!(lat < 0.0);
        assert!(lon > 0.0);
    }

    #[test]
    fn missing_reference_means_no_position() {
        let mut t = tags(&[10.0, 0.0, 0.0], "N", &[20.0, 0.0, 0.0], "E");
        t.longitude_ref = None;
        assert_eq!(t.to_decimal(), None);

        assert_eq!(PositionTags::default().to_decimal(), None);
    }

    #[test]
    fn partial_dms_components_default_to_zero() {
        assert_eq!(dms_to_degrees(&[12.5]), Some(12.5));
        assert_eq!(dms_to_degrees(&[12.0, 30.0]), Some(12.5));
        assert_eq!(dms_to_degrees(&[]), None);
    }

    #[test]
    fn png_without_metadata_reads_as_none() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("plain.png");
        image::RgbImage::new(4, 4).save(&path)?;
        let result = ExifTagReader.read_position_tags(&path);
        // kamadak-exif reports PNGs without an eXIf chunk as NotFound.
        assert!(matches!(result, Ok(None)));
        Ok(())
    }

    #[test]
    fn reads_gps_tags_embedded_in_jpeg() -> Result<()> {
        let fields = [
            Field {
                tag: Tag::GPSLatitude,
                ifd_num: In::PRIMARY,
                value: dms(40, 26, 46),
            },
            ascii_field(Tag::GPSLatitudeRef, "N"),
            Field {
                tag: Tag::GPSLongitude,
                ifd_num: In::PRIMARY,
                value: dms(79, 56, 55),
            },
            ascii_field(Tag::GPSLongitudeRef, "W"),
        ];
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tagged.jpg");
        std::fs::write(&path, jpeg_with_gps(&fields))?;

        let tags = ExifTagReader.read_position_tags(&path)?.expect("exif present");
        assert_eq!(tags.latitude, Some(vec![40.0, 26.0, 46.0]));
        assert_eq!(tags.latitude_ref.as_deref(), Some("N"));
        assert_eq!(tags.longitude_ref.as_deref(), Some("W"));
        let (lat, lon) = tags.to_decimal().expect("complete position");
        assert!((lat - 40.446111).abs() < 1e-5);
        assert!((lon + 79.948611).abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn jpeg_without_hemisphere_has_no_position() -> Result<()> {
        let fields = [Field {
            tag: Tag::GPSLatitude,
            ifd_num: In::PRIMARY,
            value: dms(40, 26, 46),
        }];
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("partial.jpg");
        std::fs::write(&path, jpeg_with_gps(&fields))?;

        let tags = ExifTagReader.read_position_tags(&path)?.expect("exif present");
        assert_eq!(tags.longitude, None);
        assert_eq!(tags.to_decimal(), None);
        Ok(())
    }
}
