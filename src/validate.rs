//! Per-item checks run before anything touches the scratch directory.

use crate::error::PdftikError;

/// Check one HTML payload against the size limit.
///
/// Fails with [`PdftikError::EmptyContent`] when `content` is absent or
/// empty and with [`PdftikError::ContentTooLarge`] when its UTF-8 byte
/// length exceeds `max_file_size`. Pure: no I/O, no staging.
pub fn validate_item(content: Option<&str>, max_file_size: usize) -> Result<&str, PdftikError> {
    let html = match content {
        Some(s) if !s.is_empty() => s,
        _ => return Err(PdftikError::EmptyContent),
    };
    if html.len() > max_file_size {
        return Err(PdftikError::ContentTooLarge {
            size: html.len(),
            max: max_file_size,
        });
    }
    Ok(html)
}
