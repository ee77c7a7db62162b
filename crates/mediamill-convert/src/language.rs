//! ISO 639-2 language-code normalization.
//!
//! Configuration and probe output meet here: codes may arrive as two-letter
//! ISO 639-1, as a terminological three-letter variant (fra, deu), or as an
//! English language name. Everything is collapsed to the bibliographic
//! three-letter code the prober reports in `tags.language`.

/// (alpha-2, alpha-3 bibliographic, alpha-3 terminological, english name)
const LANGUAGES: &[(&str, &str, &str, &str)] = &[
    ("ar", "ara", "ara", "arabic"),
    ("cs", "cze", "ces", "czech"),
    ("da", "dan", "dan", "danish"),
    ("de", "ger", "deu", "german"),
    ("el", "gre", "ell", "greek"),
    ("en", "eng", "eng", "english"),
    ("es", "spa", "spa", "spanish"),
    ("fa", "per", "fas", "persian"),
    ("fi", "fin", "fin", "finnish"),
    ("fr", "fre", "fra", "french"),
    ("he", "heb", "heb", "hebrew"),
    ("hi", "hin", "hin", "hindi"),
    ("hu", "hun", "hun", "hungarian"),
    ("it", "ita", "ita", "italian"),
    ("ja", "jpn", "jpn", "japanese"),
    ("ko", "kor", "kor", "korean"),
    ("nl", "dut", "nld", "dutch"),
    ("no", "nor", "nor", "norwegian"),
    ("pl", "pol", "pol", "polish"),
    ("pt", "por", "por", "portuguese"),
    ("ro", "rum", "ron", "romanian"),
    ("ru", "rus", "rus", "russian"),
    ("sv", "swe", "swe", "swedish"),
    ("th", "tha", "tha", "thai"),
    ("tr", "tur", "tur", "turkish"),
    ("uk", "ukr", "ukr", "ukrainian"),
    ("vi", "vie", "vie", "vietnamese"),
    ("zh", "chi", "zho", "chinese"),
];

/// Undetermined language, the prober's default for untagged streams.
pub const UNDETERMINED: &str = "und";

/// Normalize a language code or name to its bibliographic three-letter code.
/// Returns None for codes outside the known set.
pub fn normalize(code: &str) -> Option<&'static str> {
    let code = code.trim().to_lowercase();
    if code == UNDETERMINED {
        return Some(UNDETERMINED);
    }
    for (alpha2, alpha3b, alpha3t, name) in LANGUAGES {
        if code == *alpha2 || code == *alpha3b || code == *alpha3t || code == *name {
            return Some(alpha3b);
        }
    }
    None
}

/// Normalize a list of configured codes, dropping anything unknown.
pub fn normalize_all(codes: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for code in codes {
        match normalize(code) {
            Some(canonical) => {
                let canonical = canonical.to_string();
                if !out.contains(&canonical) {
                    out.push(canonical);
                }
            }
            None => tracing::warn!("dropping unknown language code {:?}", code),
        }
    }
    out
}
