//! Column name cleanup.
//!
//! Export paths repeat the same wrapper segments over and over
//! (`media_media_metadata_photo_metadata_exif_data_...`). Those markers are
//! dropped wherever they start a path segment. Distinct paths may collapse to
//! the same name; the table then keeps the later value.

/// Markers removed when they begin a segment.
pub const NOISY_MARKERS: &[&str] = &["media_", "metadata_", "exif_"];

/// Strip [`NOISY_MARKERS`] from `name`.
///
/// A marker is only removed at the start of the name or right after a `_`,
/// so `social_media_id` keeps its `social_` part and `multimedia_x` is left
/// alone. A name made only of markers is returned unchanged.
///
/// ```
/// # use selfscape::flatten::clean_column;
/// assert_eq!(clean_column("attachments_data_media_uri"), "attachments_data_uri");
/// assert_eq!(clean_column("multimedia_x"), "multimedia_x");
/// ```
pub fn clean_column(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;

    while !rest.is_empty() {
        // `rest` always begins at a segment boundary here.
        if let Some(marker) = NOISY_MARKERS.iter().find(|m| rest.starts_with(*m)) {
            rest = &rest[marker.len()..];
            continue;
        }
        match rest.find('_') {
            Some(idx) => {
                out.push_str(&rest[..=idx]);
                rest = &rest[idx + 1..];
            }
            None => {
                out.push_str(rest);
                rest = "";
            }
        }
    }

    if out.len() == name.len() {
        return out;
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        name.to_string()
    } else {
        trimmed.to_string()
    }
}
