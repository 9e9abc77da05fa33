use regex::Regex;
use std::collections::HashMap;

/// Splits a file name into its stem and every trailing suffix concatenated,
/// dot included.
///
/// `archive.tar.gz` yields `("archive", ".tar.gz")`. Leading dots belong to the stem, so
/// `.bashrc` has no extension and `.config.toml` has `.toml`. A name ending
/// with a dot has no extension at all.
pub fn split_extension(name: &str) -> (&str, &str) {
    if name.ends_with('.') {
        return (name, "");
    }
    let leading = name.len() - name.trim_start_matches('.').len();
    match name[leading..].find('.') {
        Some(pos) => name.split_at(leading + pos),
        None => (name, ""),
    }
}

pub fn split_segments(stem: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        return vec![stem.to_string()];
    }
    stem.split(delimiter).map(str::to_string).collect()
}

/// Compiles a user pattern so that it only matches at the start of a stem.
pub fn anchored_regex(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"\A(?:{pattern})"))
}

/// Named groups that participated in the match. Unmatched optional groups
/// and a failed match both leave the map without those keys.
pub fn capture_named(regex: &Regex, stem: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let Some(caps) = regex.captures(stem) else {
        return out;
    };
    for name in regex.capture_names().flatten() {
        if let Some(m) = caps.name(name) {
            out.insert(name.to_string(), m.as_str().to_string());
        }
    }
    out
}
