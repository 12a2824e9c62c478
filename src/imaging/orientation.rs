//! EXIF orientation for every container that can carry it.
//!
//! Only one field matters for renditions: Orientation (tag 0x0112 in IFD0).
//! Camera sources are frequently stored sideways with this tag telling
//! viewers how to rotate them. Since renditions are re-encoded without EXIF,
//! the rotation has to be baked into the pixels before any sizing happens.
//!
//! `kamadak-exif` locates the EXIF block in JPEG (APP1), TIFF, PNG (`eXIf`),
//! WebP (`EXIF` chunk) and HEIF containers.

use image::DynamicImage;
use std::io::Cursor;

/// Read the EXIF orientation (1-8). `None` when absent, unparsable or out of range.
pub fn read_orientation(data: &[u8]) -> Option<u16> {
    let mut cursor = Cursor::new(data);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .and_then(|value| u16::try_from(value).ok())
        .filter(|o| (1..=8).contains(o))
}

/// Bake an EXIF orientation into the pixels. Values other than 2-8 are a no-op.
///
/// | Orientation | Stored as | Fix |
/// |---|---|---|
/// | 2 | mirrored | flip horizontal |
/// | 3 | upside down | rotate 180 |
/// | 4 | mirrored upside down | flip vertical |
/// | 5 | mirrored, rotated 90 CCW | rotate 90 CW + flip horizontal |
/// | 6 | rotated 90 CCW | rotate 90 CW |
/// | 7 | mirrored, rotated 90 CW | rotate 270 CW + flip horizontal |
/// | 8 | rotated 90 CW | rotate 270 CW |
pub fn apply_orientation(image: DynamicImage, orientation: u16) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
