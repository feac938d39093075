//! Legacy string decoding policy: UTF-8, then Windows-1252, then MacRoman,
//! first lossless decode wins. The winning strategy is recorded on the
//! `Datafile` so callers can tell which encoding a file's strings used.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TextEncoding {
    Utf8,
    Windows1252,
    MacRoman,
}

impl TextEncoding {
    /// How far down the fallback chain this encoding sits: 0 for the first
    /// choice tried, up to 2 for the last-resort fallback.
    fn fallback_rank(self) -> u8 {
        match self {
            TextEncoding::Utf8 => 0,
            TextEncoding::Windows1252 => 1,
            TextEncoding::MacRoman => 2,
        }
    }

    /// The encoding that required more fallback of the two. Used to roll up
    /// a single "winning strategy" across every string decoded in a file,
    /// even when different strings in the same file resolve differently.
    pub fn worse(self, other: TextEncoding) -> TextEncoding {
        if other.fallback_rank() > self.fallback_rank() {
            other
        } else {
            self
        }
    }
}

/// High half (0x80..=0xFF) of Mac OS Roman, indexed by `byte - 0x80`.
/// encoding_rs does not ship a MacRoman decoder, so this table is carried
/// by hand; it is a closed, static 128-entry mapping, no crate exists for
/// it in this ecosystem the way Windows-1252 already does.
const MACROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è', 'ê', 'ë', 'í',
    'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü', '†', '°', '¢', '£', '§', '•',
    '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø', '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏',
    'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø', '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', ' ', 'À',
    'Ã', 'Õ', 'Œ', 'œ', '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '€', '‹', '›', 'ﬁ',
    'ﬂ', '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô', '\u{f8ff}',
    'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ',
];

fn decode_macroman(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b < 0x80 { b as char } else { MACROMAN_HIGH[(b - 0x80) as usize] })
        .collect()
}

/// Windows-1252 leaves five byte values officially unassigned; the WHATWG
/// encoding standard (which `encoding_rs` implements) maps them to their
/// raw C1 control code point rather than erroring, so `decode()` alone
/// cannot tell us the decode was implausible. A resulting string built
/// from printable text should never contain these control points.
const WINDOWS_1252_UNASSIGNED: [char; 5] = ['\u{81}', '\u{8d}', '\u{8f}', '\u{90}', '\u{9d}'];

/// Tries UTF-8, then Windows-1252, then MacRoman. The first candidate that
/// decodes without error (UTF-8) or without hitting one of Windows-1252's
/// unassigned code points wins. If neither succeeds, MacRoman — a total,
/// gap-free mapping — is used as the deterministic fallback and the result
/// is reported as lossy so the caller can attach a [`crate::error::Warning`].
pub fn decode_legacy_string(bytes: &[u8]) -> (String, TextEncoding, bool) {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return (s.to_string(), TextEncoding::Utf8, true);
    }

    let (cow, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    if !cow.chars().any(|c| WINDOWS_1252_UNASSIGNED.contains(&c)) {
        return (cow.into_owned(), TextEncoding::Windows1252, true);
    }

    (decode_macroman(bytes), TextEncoding::MacRoman, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_utf8() {
        let (s, enc, lossless) = decode_legacy_string(b"channel 1");
        assert_eq!(s, "channel 1");
        assert_eq!(enc, TextEncoding::Utf8);
        assert!(lossless);
    }

    #[test]
    fn windows_1252_high_bytes() {
        // 0x93/0x94 are curly quotes in Windows-1252, invalid as UTF-8 continuation bytes here.
        let bytes = [0x93u8, b'x', 0x94u8];
        let (s, enc, lossless) = decode_legacy_string(&bytes);
        assert_eq!(enc, TextEncoding::Windows1252);
        assert!(lossless);
        assert!(s.contains('x'));
    }

    #[test]
    fn macroman_fallback_for_cant_decide_bytes() {
        // 0x81 is undefined in Windows-1252 (decodes with replacement) but
        // maps to 'Å' in MacRoman.
        let bytes = [0x81u8];
        let (s, enc, _) = decode_legacy_string(&bytes);
        assert_eq!(enc, TextEncoding::MacRoman);
        assert_eq!(s, "Å");
    }

    #[test]
    fn worse_picks_the_deeper_fallback_regardless_of_call_order() {
        assert_eq!(TextEncoding::Utf8.worse(TextEncoding::Windows1252), TextEncoding::Windows1252);
        assert_eq!(TextEncoding::Windows1252.worse(TextEncoding::Utf8), TextEncoding::Windows1252);
        assert_eq!(TextEncoding::MacRoman.worse(TextEncoding::Windows1252), TextEncoding::MacRoman);
        assert_eq!(TextEncoding::Utf8.worse(TextEncoding::Utf8), TextEncoding::Utf8);
    }
}
