use std::path::Path;

/// Helper function to check extensions in filenames
pub(crate) fn check_extension(filename: impl AsRef<Path>, extension: impl AsRef<Path>) -> bool {
    filename
        .as_ref()
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension.as_ref()))
}

/// Check if a file name ends with the given (possibly multi part) suffix, ignoring case
pub(crate) fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name.is_char_boundary(name.len() - suffix.len())
        && name[name.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
}

/// Remove a suffix ignoring case, returns the name unchanged if it does not end with the suffix
pub(crate) fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> &'a str {
    if ends_with_ignore_case(name, suffix) {
        &name[..name.len() - suffix.len()]
    } else {
        name
    }
}

/// The file name part of a path as text
pub(crate) fn file_name(path: impl AsRef<Path>) -> String {
    path.as_ref()
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().to_string())
}

/// Remove any directories and the last extension from a file name
pub(crate) fn remove_extension(name: &str) -> &str {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    name.rsplit_once('.')
        .filter(|(stem, _)| !stem.is_empty())
        .map_or(name, |(stem, _)| stem)
}

/// Split a line on tabs, trimming a trailing carriage return
pub(crate) fn tab_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(['\r', '\n']).split('\t').collect()
}

/// Compare two masses with the given absolute tolerance
pub(crate) fn masses_match(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Decode `application/x-www-form-urlencoded` text: `%XX` escapes and `+` for a space. Invalid
/// escapes are kept as is.
pub(crate) fn url_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let escaped = (bytes[index] == b'%')
            .then(|| text.get(index + 1..index + 3))
            .flatten()
            .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        if let Some(byte) = escaped {
            decoded.push(byte);
            index += 3;
        } else {
            decoded.push(if bytes[index] == b'+' {
                b' '
            } else {
                bytes[index]
            });
            index += 1;
        }
    }
    String::from_utf8_lossy(&decoded).into_owned()
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        assert_eq!(remove_extension("run1.mgf"), "run1");
        assert_eq!(remove_extension("/data/run1.mgf"), "run1");
        assert_eq!(remove_extension("C:\\data\\run1.mgf"), "run1");
        assert_eq!(remove_extension("run1"), "run1");
        assert_eq!(remove_extension(".hidden"), ".hidden");
        assert!(ends_with_ignore_case("a.Tide-Search.target.txt", ".tide-search.target.txt"));
        assert_eq!(
            strip_suffix_ignore_case("run1.PNOVO.txt", ".pnovo.txt"),
            "run1"
        );
        assert!(check_extension("file.mzid", "MZID"));
        assert_eq!(file_name("/a/b/c.res"), "c.res");
    }

    #[test]
    fn decode() {
        assert_eq!(url_decode("File%3A+run1%2C+scan+3"), "File: run1, scan 3");
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
    }
}
