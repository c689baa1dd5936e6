/// Hard cap on a PRIMARY selection payload.
pub const MAX_SELECTION_SIZE: usize = 1024 * 1024;

/// Hard cap on a CLIPBOARD payload.
pub const MAX_CLIPBOARD_SIZE: usize = 4 * 1024 * 1024;

/// MIME types that mark an offer as carrying text.
pub const ACCEPTED_TEXT_MIMES: [&str; 5] = [
    "text/plain;charset=utf-8",
    "text/plain",
    "UTF8_STRING",
    "TEXT",
    "STRING",
];

/// MIME types advertised when this program owns the clipboard.
pub const OFFERED_TEXT_MIMES: [&str; 4] = [
    "text/plain;charset=utf-8",
    "text/plain",
    "UTF8_STRING",
    "STRING",
];

/// Transfer type requested when receiving an offer.
pub const RECEIVE_MIME: &str = "text/plain;charset=utf-8";

// Distinct transfer properties so parallel PRIMARY/CLIPBOARD conversions on
// the same display cannot collide.
pub const PRIMARY_TRANSFER_PROP: &str = "ZES_SEL";
pub const CLIPBOARD_TRANSFER_PROP: &str = "ZES_CLIP";

pub fn is_text_mime(mime: &str) -> bool {
    ACCEPTED_TEXT_MIMES.contains(&mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_mime_detection_covers_legacy_x11_names() {
        for m in ACCEPTED_TEXT_MIMES {
            assert!(is_text_mime(m));
        }
        assert!(!is_text_mime("image/png"));
        assert!(!is_text_mime("text/html"));
    }
}
