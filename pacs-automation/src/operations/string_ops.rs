//! Text transforms and boolean predicates. Booleans are the strings
//! `"true"` and `"false"`.

use super::{OperationRegistry, Signature, SlotSpec, StepContext, StepOutcome};
use crate::procedure::ArgKind;
use crate::utils::unescape;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Joins the fields of a split that kept all parts.
pub const FIELD_SEPARATOR: char = '\u{1F}';

const VAR: SlotSpec = SlotSpec::on(ArgKind::Var);
const STRING: SlotSpec = SlotSpec::on(ArgKind::String);

pub(super) fn register(registry: &mut OperationRegistry) {
    registry.register_sync(
        "Split",
        Signature::new(
            VAR,
            STRING.with_default(","),
            SlotSpec::on(ArgKind::Number).with_default("0"),
        ),
        split,
    );
    registry.register_sync("IsMatch", Signature::two(VAR, VAR), is_match);
    registry.register_sync("IsAlmostMatch", Signature::two(VAR, VAR), is_almost_match);
    registry.register_sync("And", Signature::two(VAR, VAR), and);
    registry.register_sync("Not", Signature::one(VAR), not);
    registry.register_sync("IsBlank", Signature::one(SlotSpec::ANY), is_blank);
    registry.register_sync("Echo", Signature::one(SlotSpec::ANY), echo);
    registry.register_sync("GetLongerText", Signature::two(VAR, VAR), longer_text);
    registry.register_sync("TrimString", Signature::two(VAR, STRING), trim_string);
    registry.register_sync(
        "Replace",
        Signature::new(VAR, SlotSpec::ANY, SlotSpec::ANY),
        replace,
    );
    registry.register_sync(
        "Merge",
        Signature::new(SlotSpec::ANY, SlotSpec::ANY, SlotSpec::ANY),
        merge,
    );
    registry.register_sync("TakeLast", Signature::one(VAR), take_last);
    registry.register_sync("Trim", Signature::one(VAR), trim);
    registry.register_sync("ToDateTime", Signature::one(VAR), to_datetime);
}

fn split(step: &mut StepContext<'_>) -> StepOutcome {
    split_text(step.arg1().as_deref(), &step.arg2().unwrap_or_default(), step.arg3().as_deref())
}

/// `sep` is either a literal (with escapes) or `re:`/`regex:` followed by a
/// pattern. With a numeric `index` the single field is returned.
pub fn split_text(input: Option<&str>, sep: &str, index: Option<&str>) -> StepOutcome {
    let Some(input) = input else {
        return StepOutcome::status("(null)");
    };

    let parts: Vec<String> = if let Some(pattern) = regex_pattern(sep) {
        if pattern.is_empty() {
            return StepOutcome::status("(empty pattern)");
        }
        let re = match RegexBuilder::new(pattern)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()
        {
            Ok(re) => re,
            Err(e) => return StepOutcome::status(format!("(regex error: {e})")),
        };
        re.split(input).map(str::to_string).collect()
    } else {
        let sep = unescape(sep);
        let mut parts = split_literal(input, &sep);
        if parts.len() == 1 && sep.contains('\n') && !sep.contains("\r\n") {
            parts = split_literal(input, &sep.replace('\n', "\r\n"));
        }
        parts
    };

    match index.map(str::trim).filter(|s| !s.is_empty()).map(str::parse::<i64>) {
        Some(Ok(i)) => match usize::try_from(i).ok().and_then(|i| parts.get(i)) {
            Some(field) => StepOutcome::same(field.as_str()),
            None => StepOutcome::status(format!("(index out of range {})", parts.len())),
        },
        _ => {
            let joined = parts.join(&FIELD_SEPARATOR.to_string());
            StepOutcome::text(format!("{} parts", parts.len()), joined)
        }
    }
}

fn regex_pattern(sep: &str) -> Option<&str> {
    let lower = sep.get(..6).unwrap_or(sep).to_ascii_lowercase();
    if lower.starts_with("re:") {
        Some(&sep[3..])
    } else if lower.starts_with("regex:") {
        Some(&sep[6..])
    } else {
        None
    }
}

/// An empty separator leaves the input whole.
fn split_literal(input: &str, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return vec![input.to_string()];
    }
    input.split(sep).map(str::to_string).collect()
}

fn is_match(step: &mut StepContext<'_>) -> StepOutcome {
    let a = step.arg1().unwrap_or_default();
    let b = step.arg2().unwrap_or_default();
    let result = a == b;
    StepOutcome::boolean(result, format!("{result} ('{a}' vs '{b}')"))
}

fn is_almost_match(step: &mut StepContext<'_>) -> StepOutcome {
    almost_match(&step.arg1().unwrap_or_default(), &step.arg2().unwrap_or_default())
}

pub fn almost_match(a: &str, b: &str) -> StepOutcome {
    if a == b {
        return StepOutcome::boolean(true, "true (exact match)");
    }
    if alphanumeric_upper(a) == alphanumeric_upper(b) {
        return StepOutcome::boolean(true, "true (normalized match)");
    }
    if datetime_similar(a, b) {
        return StepOutcome::boolean(true, "true (datetime similar)");
    }
    StepOutcome::boolean(false, "false")
}

fn alphanumeric_upper(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

// OCR reads time separators as digits or look-alike letters.
static OCR_DATETIME: Lazy<Option<Regex>> = Lazy::new(|| {
    RegexBuilder::new(r"(\d{4}-\d{2}-\d{2})\s*(\d{1,2})[\D:lI1]?(\d{2})[\D:lI1]?(\d{2})")
        .case_insensitive(true)
        .build()
        .ok()
});

/// Same date and the same HHMMSS once OCR separators are ignored, e.g.
/// `2025-10-24 0456126` and `2025-10-24 04:56:26`.
fn datetime_similar(a: &str, b: &str) -> bool {
    let Some(re) = OCR_DATETIME.as_ref() else {
        return false;
    };
    let key = |s: &str| {
        let c = re.captures(s)?;
        Some((
            c[1].to_string(),
            format!("{:0>2}{}{}", &c[2], &c[3], &c[4]),
        ))
    };
    match (key(a), key(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn is_true(s: &str) -> bool {
    s.eq_ignore_ascii_case("true")
}

fn and(step: &mut StepContext<'_>) -> StepOutcome {
    let a = step.arg1().unwrap_or_default();
    let b = step.arg2().unwrap_or_default();
    let result = is_true(&a) && is_true(&b);
    StepOutcome::boolean(result, format!("{result} ({a} AND {b})"))
}

fn not(step: &mut StepContext<'_>) -> StepOutcome {
    let a = step.arg1().unwrap_or_default();
    let result = !is_true(&a);
    StepOutcome::boolean(result, format!("{result} (NOT {a})"))
}

fn is_blank(step: &mut StepContext<'_>) -> StepOutcome {
    let blank = step.arg1().map_or(true, |s| s.trim().is_empty());
    StepOutcome::boolean(blank, blank.to_string())
}

fn echo(step: &mut StepContext<'_>) -> StepOutcome {
    match step.arg1() {
        Some(value) => StepOutcome::same(value),
        None => StepOutcome::status("(null)"),
    }
}

fn longer_text(step: &mut StepContext<'_>) -> StepOutcome {
    let a = step.arg1().unwrap_or_default();
    let b = step.arg2().unwrap_or_default();
    let (la, lb) = (a.chars().count(), b.chars().count());
    let longer = if la >= lb { a } else { b };
    StepOutcome::text(
        format!("{} chars (text1: {la}, text2: {lb})", la.max(lb)),
        longer,
    )
}

fn trim_string(step: &mut StepContext<'_>) -> StepOutcome {
    let source = step.arg1().unwrap_or_default();
    let trim = step.arg2().unwrap_or_default();
    StepOutcome::same(strip_repeated(&source, &trim))
}

/// Removes every leading and trailing occurrence of `pattern`.
pub fn strip_repeated<'s>(source: &'s str, pattern: &str) -> &'s str {
    if pattern.is_empty() {
        return source;
    }
    let mut s = source;
    while let Some(rest) = s.strip_prefix(pattern) {
        s = rest;
    }
    while let Some(rest) = s.strip_suffix(pattern) {
        s = rest;
    }
    s
}

fn replace(step: &mut StepContext<'_>) -> StepOutcome {
    let input = step.arg1().unwrap_or_default();
    let find = unescape(&step.arg2().unwrap_or_default());
    if find.is_empty() {
        return StepOutcome::same(input);
    }
    let with = unescape(&step.arg3().unwrap_or_default());
    StepOutcome::same(input.replace(&find, &with))
}

fn merge(step: &mut StepContext<'_>) -> StepOutcome {
    let a = step.arg1().unwrap_or_default();
    let b = step.arg2().unwrap_or_default();
    let sep = step.arg3().unwrap_or_default();
    StepOutcome::same(format!("{a}{sep}{b}"))
}

fn take_last(step: &mut StepContext<'_>) -> StepOutcome {
    let joined = step.arg1().unwrap_or_default();
    let last = joined.rsplit(FIELD_SEPARATOR).next().unwrap_or_default();
    StepOutcome::same(last)
}

fn trim(step: &mut StepContext<'_>) -> StepOutcome {
    match step.arg1() {
        Some(s) => StepOutcome::same(s.trim()),
        None => StepOutcome::status("(null)"),
    }
}

fn to_datetime(step: &mut StepContext<'_>) -> StepOutcome {
    let Some(raw) = step.arg1().filter(|s| !s.trim().is_empty()) else {
        return StepOutcome::status("(null)");
    };
    match parse_datetime(&raw) {
        Some(dt) => StepOutcome::text(
            dt.format(DISPLAY_FORMAT).to_string(),
            dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string(),
        ),
        None => StepOutcome::status("(parse fail)"),
    }
}

pub(crate) const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
    "%Y%m%d%H%M%S",
    "%Y%m%d %H%M%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%Y%m%d", "%m/%d/%Y"];

/// Lenient date/time parsing for values scraped from viewer UIs. Offsets
/// are dropped; date-only input means midnight.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VarValue;

    fn joined(parts: &[&str]) -> VarValue {
        VarValue::text(parts.join("\u{1F}"))
    }

    #[test]
    fn split_literal_with_and_without_index() {
        let all = split_text(Some("a,b,,c"), ",", None);
        assert_eq!(all.preview, "4 parts");
        assert_eq!(all.value, joined(&["a", "b", "", "c"]));

        let one = split_text(Some("a,b,c"), ",", Some(" 1 "));
        assert_eq!(one.preview, "b");
        assert_eq!(one.value, VarValue::text("b"));

        let empty = split_text(Some("a,b,,c"), ",", Some("2"));
        assert_eq!(empty.preview, "");
        assert_eq!(empty.value, VarValue::text(""));

        let out = split_text(Some("a,b,c"), ",", Some("3"));
        assert_eq!(out.preview, "(index out of range 3)");
        assert_eq!(out.value, VarValue::None);
        assert_eq!(split_text(Some("a,b"), ",", Some("-1")).value, VarValue::None);
    }

    #[test]
    fn split_escapes_and_crlf_retry() {
        let r = split_text(Some("x\r\ny\r\nz"), "\\n", Some("2"));
        assert_eq!(r.value, VarValue::text("z"));
        let tab = split_text(Some("k\tv"), "\\t", Some("1"));
        assert_eq!(tab.value, VarValue::text("v"));
    }

    #[test]
    fn split_regex_is_case_insensitive() {
        let r = split_text(Some("oneANDtwoandthree"), "re:and", None);
        assert_eq!(r.value, joined(&["one", "two", "three"]));
        assert_eq!(split_text(Some("x"), "regex:", None).preview, "(empty pattern)");
        assert!(split_text(Some("x"), "re:(", None)
            .preview
            .starts_with("(regex error:"));
        assert_eq!(split_text(None, ",", None).preview, "(null)");
    }

    #[test]
    fn split_on_empty_separator_keeps_input() {
        let r = split_text(Some("abc"), "", None);
        assert_eq!(r.preview, "1 parts");
        assert_eq!(r.value, VarValue::text("abc"));
    }

    #[test]
    fn almost_match_levels() {
        assert_eq!(almost_match("A-1", "A-1").preview, "true (exact match)");
        assert_eq!(almost_match("ab 12", "AB-12").preview, "true (normalized match)");
        assert_eq!(
            almost_match("2025-10-24 0456126", "2025-10-24 04:56:26").preview,
            "true (datetime similar)"
        );
        let no = almost_match("2025-10-24 04:56:26", "2025-10-25 04:56:26");
        assert_eq!(no.value, VarValue::text("false"));
    }

    #[test]
    fn strip_repeated_removes_all_occurrences() {
        assert_eq!(strip_repeated("--x--", "-"), "x");
        assert_eq!(strip_repeated("abab", "ab"), "");
        assert_eq!(strip_repeated("keep", ""), "keep");
    }

    #[test]
    fn datetime_forms() {
        let expect = NaiveDate::from_ymd_opt(2024, 3, 5)
            .and_then(|d| d.and_hms_opt(14, 7, 9))
            .unwrap();
        for raw in [
            "2024-03-05 14:07:09",
            "2024-03-05T14:07:09",
            "2024/03/05 14:07:09",
            "20240305140709",
            "2024-03-05T14:07:09+09:00",
            "03/05/2024 02:07:09 PM",
        ] {
            assert_eq!(parse_datetime(raw), Some(expect), "{raw}");
        }
        assert_eq!(
            parse_datetime("2024-03-05").map(|d| d.format(DISPLAY_FORMAT).to_string()),
            Some("2024-03-05 00:00:00".to_string())
        );
        assert_eq!(parse_datetime("yesterday"), None);
    }
}
