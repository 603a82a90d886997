use crate::errors::AutomationError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// Reads a JSON document; missing, unreadable or corrupt files give `T::default()`.
pub(crate) fn load_json_or_default<T>(path: &Path, what: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} not found at {}, starting empty", what, path.display());
            return T::default();
        }
        Err(e) => {
            warn!("failed to read {} at {}: {}", what, path.display(), e);
            return T::default();
        }
    };
    match serde_json::from_str(raw.trim_start_matches('\u{feff}')) {
        Ok(value) => value,
        Err(e) => {
            warn!("corrupt {} at {}, resetting: {}", what, path.display(), e);
            T::default()
        }
    }
}

/// Writes pretty JSON, creating the parent directory when needed.
pub(crate) fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AutomationError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    debug!("saved {}", path.display());
    Ok(())
}

/// Expands regex-style escapes in user-entered separators: `\n`, `\r`,
/// `\t`, `\f`, `\v`, `\a`, `\e`, `\0`, `\xHH`, `\uXXXX`. Any other escaped
/// character stands for itself. Malformed hex escapes are kept verbatim.
pub fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            out.push('\\');
            break;
        };
        match e {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'f' => out.push('\u{0C}'),
            'v' => out.push('\u{0B}'),
            'a' => out.push('\u{07}'),
            'e' => out.push('\u{1B}'),
            '0' => out.push('\0'),
            'x' | 'u' => {
                let width = if e == 'x' { 2 } else { 4 };
                let digits: String = chars.clone().take(width).collect();
                match (digits.len() == width)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                {
                    Some(decoded) => {
                        out.push(decoded);
                        for _ in 0..width {
                            chars.next();
                        }
                    }
                    None => {
                        out.push('\\');
                        out.push(e);
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_handles_common_sequences() {
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r"\r\n"), "\r\n");
        assert_eq!(unescape(r"\t|\\"), "\t|\\");
        assert_eq!(unescape(r"\u001F"), "\u{1F}");
        assert_eq!(unescape(r"\x41\."), "A.");
        assert_eq!(unescape(r"\xZZ"), r"\xZZ");
        assert_eq!(unescape("plain"), "plain");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }
}
