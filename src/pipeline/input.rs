//! Input resolution: turn a caller-supplied payload into trustworthy text.
//!
//! Screenplays exported from older tools frequently arrive in CP1251,
//! KOI8-R or MacRoman rather than UTF-8. The document-text extractor that
//! runs before this crate hands us whatever bytes it produced, so we detect
//! the encoding before anything else sees the text. We also reject payloads
//! that are clearly not text (a PDF passed in by mistake) so callers get a
//! meaningful error instead of a breakdown full of garbage.

use crate::error::ExtractError;
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE};
use tracing::debug;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Text decoded from a byte payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    /// Name of the detected encoding, e.g. `UTF-8`, `windows-1251`.
    pub encoding: String,
}

/// Decode a byte payload into UTF-8 text.
///
/// Detection priority:
/// 1. BOM (UTF-8, UTF-16 LE/BE)
/// 2. Valid UTF-8
/// 3. chardetng statistical detection for legacy single-byte encodings
///
/// # Errors
/// Returns [`ExtractError::BinaryInput`] when the payload holds NUL bytes in
/// a pattern that no text encoding explains.
pub fn decode_input(bytes: &[u8], max_binary_ratio: f64) -> Result<DecodedText, ExtractError> {
    let (text, encoding) = if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
        (String::from_utf8_lossy(rest).into_owned(), "UTF-8")
    } else if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        (decode_with(UTF_16LE, rest), UTF_16LE.name())
    } else if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        (decode_with(UTF_16BE, rest), UTF_16BE.name())
    } else if let Ok(s) = std::str::from_utf8(bytes) {
        (s.to_string(), "UTF-8")
    } else {
        let mut detector = EncodingDetector::new();
        detector.feed(bytes, true);
        let encoding = detector.guess(None, true);
        (decode_with(encoding, bytes), encoding.name())
    };

    debug!("Decoded {} bytes as {}", bytes.len(), encoding);
    ensure_text(&text, max_binary_ratio)?;

    Ok(DecodedText {
        text,
        encoding: encoding.to_string(),
    })
}

fn decode_with(encoding: &'static Encoding, bytes: &[u8]) -> String {
    let (cow, _, _) = encoding.decode(bytes);
    cow.into_owned()
}

/// Share of characters that cannot appear in extracted document text.
///
/// Counts NUL, control characters other than whitespace and form feed, and
/// U+FFFD replacement characters left by a lossy decode.
pub fn binary_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut binary = 0usize;
    for c in text.chars() {
        total += 1;
        let suspicious = c == '\u{FFFD}'
            || (c.is_control() && !matches!(c, '\n' | '\r' | '\t' | '\u{000C}'));
        if suspicious {
            binary += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        binary as f64 / total as f64
    }
}

/// Reject text whose [`binary_ratio`] exceeds `max_ratio`.
pub fn ensure_text(text: &str, max_ratio: f64) -> Result<(), ExtractError> {
    let ratio = binary_ratio(text);
    if ratio > max_ratio {
        return Err(ExtractError::BinaryInput { ratio });
    }
    Ok(())
}

/// Guess the document language from its script mix.
///
/// Returns `ru` when Cyrillic letters dominate, `en` when Latin letters do,
/// and `und` when the text has too few letters to tell.
pub fn detect_language(text: &str) -> &'static str {
    let mut cyrillic = 0usize;
    let mut latin = 0usize;
    for c in text.chars().filter(|c| c.is_alphabetic()) {
        if ('\u{0400}'..='\u{04FF}').contains(&c) {
            cyrillic += 1;
        } else if c.is_ascii_alphabetic() {
            latin += 1;
        }
    }
    if cyrillic + latin < 3 {
        "und"
    } else if cyrillic > latin {
        "ru"
    } else {
        "en"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passthrough() {
        let decoded = decode_input("INT. KITCHEN - DAY".as_bytes(), 0.1).expect("decode");
        assert_eq!(decoded.text, "INT. KITCHEN - DAY");
        assert_eq!(decoded.encoding, "UTF-8");
    }

    #[test]
    fn utf8_bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"EXT. STREET - NIGHT");
        let decoded = decode_input(&bytes, 0.1).expect("decode");
        assert_eq!(decoded.text, "EXT. STREET - NIGHT");
    }

    #[test]
    fn utf16_le_with_bom() {
        let mut bytes = UTF16_LE_BOM.to_vec();
        for unit in "INT. HALL".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = decode_input(&bytes, 0.1).expect("decode");
        assert_eq!(decoded.text, "INT. HALL");
        assert_eq!(decoded.encoding, "UTF-16LE");
    }

    #[test]
    fn windows_1251_is_detected() {
        let source = "ИНТ. КАБИНЕТ - ДЕНЬ\n\
Иван говорит по телефону. Иван смотрит в окно, потом садится за стол.\n\
Мария входит в кабинет с папкой документов и кладёт её на стол.\n\
НАТ. УЛИЦА - НОЧЬ\nМашина медленно проезжает мимо фонаря.";
        let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode(source);
        let decoded = decode_input(&encoded, 0.1).expect("decode");
        assert_eq!(decoded.text, source);
    }

    #[test]
    fn binary_payload_is_rejected() {
        let mut bytes = b"%PDF-1.7\n".to_vec();
        bytes.extend_from_slice(&[0u8; 64]);
        let err = decode_input(&bytes, 0.1).unwrap_err();
        assert!(matches!(err, ExtractError::BinaryInput { .. }));
    }

    #[test]
    fn form_feed_is_not_binary() {
        assert_eq!(binary_ratio("page one\u{000C}page two"), 0.0);
    }

    #[test]
    fn language_detection() {
        assert_eq!(detect_language("INT. KITCHEN - DAY"), "en");
        assert_eq!(detect_language("НАТ. УЛИЦА - НОЧЬ"), "ru");
        assert_eq!(detect_language("12"), "und");
    }
}
