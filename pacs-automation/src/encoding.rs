//! Best-effort decoding of byte streams with missing or wrong charset
//! labels, tuned for Korean pages, plus repair of Latin-1 mojibake in text
//! that was already decoded with the wrong code page.
//!
//! Every candidate decoding is scored by [`TextScore`]: fewer U+FFFD
//! replacement characters wins, ties go to more Hangul. Nothing here fails;
//! the worst case is the plain UTF-8 decoding.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, EUC_KR, UTF_8, WINDOWS_1252};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use tracing::debug;

/// Only this much of the body is scanned for `<meta charset>` declarations.
const META_SCAN_LIMIT: usize = 256 * 1024;

/// Latin-1 high characters needed before whole-text repair is attempted.
const MOJIBAKE_MIN_LATIN1: usize = 6;
const MOJIBAKE_MAX_HANGUL: usize = 3;

static META_CHARSET: Lazy<regex::bytes::Regex> = Lazy::new(|| {
    regex::bytes::Regex::new(r"(?i)charset\s*=\s*([A-Za-z0-9_-]+)")
        .unwrap_or_else(|e| panic!("invalid meta charset pattern: {e}"))
});

static LATIN1_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new("[\u{00A0}-\u{00FF}\u{20AC}]+")
        .unwrap_or_else(|e| panic!("invalid latin-1 run pattern: {e}"))
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextScore {
    pub replacements: usize,
    pub hangul: usize,
}

impl TextScore {
    pub fn of(text: &str) -> Self {
        let mut score = TextScore {
            replacements: 0,
            hangul: 0,
        };
        for ch in text.chars() {
            if ch == '\u{FFFD}' {
                score.replacements += 1;
            } else if is_hangul(ch) {
                score.hangul += 1;
            }
        }
        score
    }

    /// Strictly better: fewer replacements, then more Hangul.
    pub fn beats(&self, other: &TextScore) -> bool {
        self.cmp_quality(other) == Ordering::Greater
    }

    fn cmp_quality(&self, other: &TextScore) -> Ordering {
        other
            .replacements
            .cmp(&self.replacements)
            .then(self.hangul.cmp(&other.hangul))
    }
}

/// Hangul syllables and compatibility Jamo.
pub fn is_hangul(ch: char) -> bool {
    matches!(ch, '\u{AC00}'..='\u{D7A3}' | '\u{3130}'..='\u{318F}')
}

/// Keeps the first candidate unless a later one strictly beats it.
struct Best {
    text: String,
    score: TextScore,
}

impl Best {
    fn new(text: String) -> Self {
        let score = TextScore::of(&text);
        Self { text, score }
    }

    fn consider(&mut self, candidate: Option<String>) {
        let Some(candidate) = candidate.filter(|c| !c.is_empty()) else {
            return;
        };
        let score = TextScore::of(&candidate);
        if score.beats(&self.score) {
            self.text = candidate;
            self.score = score;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Known(&'static Encoding),
    /// True ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
}

impl Charset {
    fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Known(enc) => enc.decode_without_bom_handling(bytes).0.into_owned(),
            Charset::Latin1 => latin1_decode(bytes),
        }
    }
}

fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Bytes of `text` when every character fits in one Latin-1 byte.
fn latin1_encode(text: &str) -> Option<Vec<u8>> {
    text.chars().map(|c| u8::try_from(u32::from(c)).ok()).collect()
}

/// Maps a charset label to a decoder. Korean aliases all decode as
/// windows-949, which is a superset of EUC-KR.
fn resolve_label(label: &str) -> Option<Charset> {
    let label = label.trim().trim_matches(|c| c == '"' || c == '\'');
    let lower = label.to_ascii_lowercase();
    match lower.as_str() {
        "" => None,
        "euc-kr" | "ks_c_5601-1987" | "cp949" | "ms949" | "x-windows-949" | "windows-949"
        | "uhc" => Some(Charset::Known(EUC_KR)),
        "iso-8859-1" | "latin1" | "latin-1" | "l1" => Some(Charset::Latin1),
        _ => Encoding::for_label(lower.as_bytes()).map(Charset::Known),
    }
}

fn indicates_korean(label: &str) -> bool {
    let lower = label.to_ascii_lowercase();
    lower.contains("949") || lower.contains("euc-kr") || lower.contains("ks_c_5601")
}

/// `charset=` parameter of a Content-Type header value.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    })
}

fn meta_charsets(bytes: &[u8]) -> Vec<String> {
    let head = &bytes[..bytes.len().min(META_SCAN_LIMIT)];
    META_CHARSET
        .captures_iter(head)
        .filter_map(|c| c.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
        .collect()
}

/// Decodes an HTTP body. `header_charset` is the charset from the
/// Content-Type header, if any.
pub fn decode_html(bytes: &[u8], header_charset: Option<&str>) -> String {
    if bytes.is_empty() {
        return String::new();
    }
    if let Some((enc, bom_len)) = Encoding::for_bom(bytes) {
        debug!("BOM detected: {}", enc.name());
        return enc
            .decode_without_bom_handling(&bytes[bom_len..])
            .0
            .into_owned();
    }

    let mut candidates: Vec<Charset> = Vec::new();
    let mut korean_hint = false;

    if let Some(label) = header_charset {
        korean_hint |= indicates_korean(label);
        candidates.extend(resolve_label(label));
    }

    let metas = meta_charsets(bytes);
    let meta_euc_kr = metas
        .iter()
        .any(|m| m.eq_ignore_ascii_case("euc-kr") || m.eq_ignore_ascii_case("ks_c_5601-1987"));
    for label in &metas {
        korean_hint |= indicates_korean(label);
        candidates.extend(resolve_label(label));
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let guess = detector.guess(None, true);
    if meta_euc_kr && guess == WINDOWS_1252 {
        debug!("ignoring windows-1252 guess, page declares EUC-KR");
    } else {
        candidates.push(Charset::Known(guess));
    }

    candidates.extend([Charset::Known(EUC_KR), Charset::Known(UTF_8), Charset::Latin1]);
    let mut unique: Vec<Charset> = Vec::with_capacity(candidates.len());
    for c in candidates {
        if !unique.contains(&c) {
            unique.push(c);
        }
    }

    let mut best: Option<Best> = None;
    for charset in &unique {
        let text = charset.decode(bytes);
        match best.as_mut() {
            None => best = Some(Best::new(text)),
            Some(b) => b.consider(Some(text)),
        }
    }
    let mut best = best.unwrap_or_else(|| Best::new(String::from_utf8_lossy(bytes).into_owned()));

    if korean_hint {
        best.consider(Some(Charset::Known(EUC_KR).decode(bytes)));
        best.consider(Some(Charset::Known(UTF_8).decode(bytes)));
        best.consider(Some(decode_mixed_utf8_cp949(bytes)));
    }
    debug!(
        "decoded {} bytes, {} replacements, {} hangul",
        bytes.len(),
        best.score.replacements,
        best.score.hangul
    );

    normalize_mojibake(&best.text)
}

/// Repairs Latin-1 mojibake runs, then the whole text if it still looks
/// like mojibake. Correct text comes back unchanged.
pub fn normalize_mojibake(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let repaired = repair_latin1_runs(text);
    if !looks_latin1_mojibake(&repaired) {
        return repaired;
    }
    let mut best = Best::new(repaired.clone());
    for alt in repair_alternatives(&repaired) {
        best.consider(alt);
    }
    if best.text == repaired {
        repaired
    } else {
        repair_latin1_runs(&best.text)
    }
}

pub fn looks_latin1_mojibake(text: &str) -> bool {
    let latin1_high = text
        .chars()
        .filter(|c| ('\u{00A0}'..='\u{00FF}').contains(c))
        .count();
    let hangul = text.chars().filter(|c| is_hangul(*c)).count();
    latin1_high >= MOJIBAKE_MIN_LATIN1 && hangul < MOJIBAKE_MAX_HANGUL
}

fn repair_alternatives(text: &str) -> [Option<String>; 3] {
    let latin1 = latin1_encode(text);
    [
        latin1
            .as_ref()
            .map(|b| UTF_8.decode_without_bom_handling(b).0.into_owned()),
        {
            let (bytes, _, unmappable) = WINDOWS_1252.encode(text);
            (!unmappable).then(|| UTF_8.decode_without_bom_handling(&bytes).0.into_owned())
        },
        latin1
            .as_ref()
            .map(|b| EUC_KR.decode_without_bom_handling(b).0.into_owned()),
    ]
}

/// Replaces each run of Latin-1 high characters with its best re-decoding.
pub fn repair_latin1_runs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for run in LATIN1_RUN.find_iter(text) {
        out.push_str(&text[last..run.start()]);
        let mut best = Best::new(run.as_str().to_string());
        for alt in repair_alternatives(run.as_str()) {
            best.consider(alt);
        }
        out.push_str(&best.text);
        last = run.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Scans a stream that mixes UTF-8 Hangul with CP949 bytes. ASCII passes
/// through; a 3-byte UTF-8 sequence is taken when it decodes to Hangul or
/// Jamo, a valid 2-byte UTF-8 sequence when it is non-ASCII; anything else
/// is looked up as a CP949 pair, then as a single byte.
pub fn decode_mixed_utf8_cp949(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b0 = bytes[i];
        if b0 < 0x80 {
            out.push(char::from(b0));
            i += 1;
            continue;
        }

        if b0 & 0xF0 == 0xE0 && i + 2 < bytes.len() {
            if let Ok(s) = std::str::from_utf8(&bytes[i..i + 3]) {
                if s.chars().next().is_some_and(|c| is_hangul(c) || is_jamo(c)) {
                    out.push_str(s);
                    i += 3;
                    continue;
                }
            }
        }

        if b0 & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            if let Ok(s) = std::str::from_utf8(&bytes[i..i + 2]) {
                if s.chars().next().is_some_and(|c| u32::from(c) >= 0x80) {
                    out.push_str(s);
                    i += 2;
                    continue;
                }
            }
        }

        if i + 1 < bytes.len() {
            if let Some(s) = EUC_KR.decode_without_bom_handling_and_without_replacement(&bytes[i..i + 2]) {
                if let Some(c) = s.chars().next().filter(|c| *c != '?' && *c != '\u{FFFD}') {
                    out.push(c);
                    i += 2;
                    continue;
                }
            }
        }

        out.push_str(&EUC_KR.decode_without_bom_handling(&bytes[i..i + 1]).0);
        i += 1;
    }
    out
}

fn is_jamo(ch: char) -> bool {
    matches!(ch, '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn euc_kr(text: &str) -> Vec<u8> {
        EUC_KR.encode(text).0.into_owned()
    }

    #[test]
    fn fewer_replacements_always_win() {
        let clean = TextScore::of("abc");
        let broken = TextScore::of("\u{AC00}\u{AC01}\u{FFFD}");
        assert!(clean.beats(&broken));
        assert!(!broken.beats(&clean));
    }

    #[test]
    fn hangul_breaks_ties() {
        let more = TextScore::of("\u{D55C}\u{AE00}");
        let less = TextScore::of("ab");
        assert!(more.beats(&less));
        assert!(!less.beats(&more));
        assert!(!more.beats(&more));
    }

    #[test]
    fn utf8_text_is_returned_unchanged() {
        let text = "Hello, 세계! 검사 결과: 정상 ☕";
        assert_eq!(decode_html(text.as_bytes(), None), text);
        assert_eq!(decode_html(text.as_bytes(), Some("utf-8")), text);
        assert_eq!(normalize_mojibake(text), text);
        assert_eq!(normalize_mojibake("café naïve façade"), "café naïve façade");
    }

    #[test]
    fn bom_decides_encoding() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("판독".as_bytes());
        assert_eq!(decode_html(&bytes, Some("euc-kr")), "판독");

        let mut le = vec![0xFF, 0xFE];
        for unit in "검사".encode_utf16() {
            le.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_html(&le, None), "검사");
    }

    #[test]
    fn euc_kr_page_with_meta_declaration() {
        let html = "<html><head><meta charset=\"euc-kr\"></head><body>영상의학과 판독 소견</body></html>";
        assert_eq!(decode_html(&euc_kr(html), None), html);
    }

    #[test]
    fn mislabelled_header_is_overruled_by_scoring() {
        let html = "<p>흉부 X선 검사 결과 이상 소견 없음</p>";
        assert_eq!(decode_html(&euc_kr(html), Some("utf-8")), html);
    }

    #[test]
    fn latin1_runs_of_utf8_bytes_are_repaired() {
        let mojibake = latin1_decode("결국 경기".as_bytes());
        assert!(looks_latin1_mojibake(&mojibake));
        assert_eq!(normalize_mojibake(&mojibake), "결국 경기");
    }

    #[test]
    fn latin1_runs_of_cp949_bytes_are_repaired() {
        let mojibake = latin1_decode(&euc_kr("환자"));
        assert_eq!(normalize_mojibake(&format!("ID: {mojibake}")), "ID: 환자");
    }

    #[test]
    fn mixed_scanner_handles_both_encodings() {
        let mut bytes = "A ".as_bytes().to_vec();
        bytes.extend_from_slice("한국".as_bytes());
        bytes.push(b' ');
        bytes.extend_from_slice(&euc_kr("영상"));
        assert_eq!(decode_mixed_utf8_cp949(&bytes), "A 한국 영상");
    }

    #[test]
    fn content_type_charset_parsing() {
        assert_eq!(
            charset_from_content_type("text/html; charset=\"EUC-KR\"").as_deref(),
            Some("EUC-KR")
        );
        assert_eq!(charset_from_content_type("text/html"), None);
        assert_eq!(resolve_label("ks_c_5601-1987"), Some(Charset::Known(EUC_KR)));
        assert_eq!(resolve_label("cp949"), Some(Charset::Known(EUC_KR)));
        assert_eq!(resolve_label("ISO-8859-1"), Some(Charset::Latin1));
    }
}
