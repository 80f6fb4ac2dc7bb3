pub mod absen;
pub mod cleanup;
pub mod database;
pub mod rekap;
pub mod verifikasi;

/// Upload validation shared by attendance capture and employee photo
/// management. The payload is the camera's base64 data URI; its character
/// count stands in for the byte size.
pub(crate) fn validate_photo(payload: &str, max_chars: usize) -> Result<(), &'static str> {
    if payload.is_empty() {
        return Err("Photo payload is required");
    }
    if !payload.starts_with("data:image/") {
        return Err("Photo must be an image data URI");
    }
    if payload.chars().count() > max_chars {
        return Err("Photo exceeds the maximum allowed size");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_photo;

    #[test]
    fn rejects_missing_wrong_type_and_oversized_payloads() {
        assert!(validate_photo("", 100).is_err());
        assert!(validate_photo("data:text/plain;base64,AAAA", 100).is_err());
        assert!(validate_photo(&format!("data:image/png;base64,{}", "A".repeat(200)), 100).is_err());
        assert!(validate_photo("data:image/jpeg;base64,AAAA", 100).is_ok());
    }
}
