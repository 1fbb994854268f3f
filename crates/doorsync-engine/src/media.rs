//! Image media type detection.

use doorsync_core::constants::DEFAULT_IMAGE_MIME;

/// Media type of a face image.
///
/// Magic bytes decide first, then the suffix of the photo reference (query
/// and fragment ignored), then `image/jpeg`.
pub fn detect_media_type(bytes: &[u8], photo_ref: &str) -> &'static str {
    sniff(bytes)
        .or_else(|| from_suffix(photo_ref))
        .unwrap_or(DEFAULT_IMAGE_MIME)
}

fn sniff(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        [b'B', b'M', ..] => Some("image/bmp"),
        _ => None,
    }
}

fn from_suffix(photo_ref: &str) -> Option<&'static str> {
    let path = photo_ref.split(['?', '#']).next().unwrap_or(photo_ref);
    let extension = path.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
