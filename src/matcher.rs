use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::index::{file_name, file_stem, LookupIndex};
use crate::models::FileRecord;

static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Minimum window for the fuzzy overlap strategy
const FUZZY_MIN_WINDOW: usize = 3;
/// Prefix length compared by the extension fallback
const PREFIX_LEN: usize = 5;

/// Which heuristic located a file, in descending confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchStrategy {
    UrlBasename,
    HashSubstring,
    NormalizedName,
    FuzzyOverlap,
    ExtensionPrefix,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::UrlBasename => "url-basename",
            MatchStrategy::HashSubstring => "hash-substring",
            MatchStrategy::NormalizedName => "normalized-name",
            MatchStrategy::FuzzyOverlap => "fuzzy-overlap",
            MatchStrategy::ExtensionPrefix => "extension-prefix",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMatch<'a> {
    pub path: &'a Path,
    pub strategy: MatchStrategy,
}

/// Associates database records with physical files
pub struct Matcher<'a> {
    index: &'a LookupIndex,
}

impl<'a> Matcher<'a> {
    pub fn new(index: &'a LookupIndex) -> Self {
        Self { index }
    }

    /// Best candidate for `record`, trying each strategy in order and
    /// stopping at the first hit. `None` means the record is unresolved.
    pub fn find(&self, record: &FileRecord) -> Option<FileMatch<'a>> {
        let ext = record.ext.as_deref();
        let hit = |path: Option<&'a Path>, strategy| path.map(|path| FileMatch { path, strategy });

        hit(self.by_url_basename(&record.url), MatchStrategy::UrlBasename)
            .or_else(|| hit(self.by_hash(&record.hash), MatchStrategy::HashSubstring))
            .or_else(|| hit(self.by_normalized_name(&record.name), MatchStrategy::NormalizedName))
            .or_else(|| hit(self.by_fuzzy_overlap(&record.name), MatchStrategy::FuzzyOverlap))
            .or_else(|| hit(self.by_extension_prefix(&record.name, ext), MatchStrategy::ExtensionPrefix))
    }

    /// The URL's last path segment equals a physical filename
    pub fn by_url_basename(&self, url: &str) -> Option<&'a Path> {
        let basename = url_basename(url);
        if basename.is_empty() {
            return None;
        }
        // The key map also holds stems; only accept a real filename hit.
        match self.index.get(basename) {
            Some(path) if file_name(path) == Some(basename) => Some(path),
            _ => self.find_path(|path| file_name(path) == Some(basename)),
        }
    }

    /// The content hash occurs inside a physical filename
    pub fn by_hash(&self, hash: &str) -> Option<&'a Path> {
        if hash.is_empty() {
            return None;
        }
        self.find_path(|path| file_name(path).is_some_and(|name| name.contains(hash)))
    }

    /// Normalized record name and normalized filename contain one another
    pub fn by_normalized_name(&self, name: &str) -> Option<&'a Path> {
        let wanted: Vec<String> = [normalize_name(name, "_"), normalize_name(name, "-")]
            .into_iter()
            .filter(|n| !n.is_empty())
            .collect();
        if wanted.is_empty() {
            return None;
        }

        self.find_path(|path| {
            let Some(candidate) = file_name(path).map(|n| normalize_name(n, "_")) else {
                return false;
            };
            !candidate.is_empty()
                && wanted
                    .iter()
                    .any(|w| candidate.contains(w.as_str()) || w.contains(candidate.as_str()))
        })
    }

    /// Some window of the record name, `max(3, floor(0.6 * shorter length))`
    /// characters long, occurs in the filename
    pub fn by_fuzzy_overlap(&self, name: &str) -> Option<&'a Path> {
        let search = alnum_lower(name);
        if search.is_empty() {
            return None;
        }

        self.find_path(|path| {
            let candidate = file_name(path).map(alnum_lower).unwrap_or_default();
            let shorter = search.len().min(candidate.len());
            let window = FUZZY_MIN_WINDOW.max(shorter * 3 / 5);
            if search.len() < window {
                return false;
            }
            (0..=search.len() - window).any(|i| candidate.contains(&search[i..i + window]))
        })
    }

    /// Same extension, and the first five normalized characters of one stem
    /// occur in the other
    pub fn by_extension_prefix(&self, name: &str, fallback_ext: Option<&str>) -> Option<&'a Path> {
        let name_path = Path::new(name);
        let ext = name_path
            .extension()
            .and_then(|e| e.to_str())
            .or_else(|| fallback_ext.map(|e| e.trim_start_matches('.')))
            .filter(|e| !e.is_empty())?;

        let base = alnum_lower(file_stem(name_path).unwrap_or(name));
        let base_prefix = prefix(&base);

        self.find_path(|path| {
            let same_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext));
            if !same_ext {
                return false;
            }
            let candidate = file_stem(path).map(alnum_lower).unwrap_or_default();
            let candidate_prefix = prefix(&candidate);
            (!base_prefix.is_empty() && candidate.contains(base_prefix))
                || (!candidate_prefix.is_empty() && base.contains(candidate_prefix))
        })
    }

    fn find_path<P>(&self, mut predicate: P) -> Option<&'a Path>
    where
        P: FnMut(&Path) -> bool,
    {
        self.index
            .paths()
            .iter()
            .map(|p| p.as_path())
            .find(|&p| predicate(p))
    }
}

/// Last segment of a URL or path, without query string or fragment
pub fn url_basename(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query.rsplit('/').next().unwrap_or(without_query)
}

/// Lower-cases, collapses whitespace runs into `sep` and drops everything
/// outside `[a-z0-9._-]`
pub fn normalize_name(name: &str, sep: &str) -> String {
    RE_WHITESPACE
        .replace_all(name.trim(), sep)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(*c, '.' | '_' | '-'))
        .collect()
}

/// Lower-case ASCII alphanumerics only
pub fn alnum_lower(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

fn prefix(s: &str) -> &str {
    &s[..s.len().min(PREFIX_LEN)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::files::fixtures::record;
    use std::path::PathBuf;

    fn index(names: &[&str]) -> LookupIndex {
        LookupIndex::from_paths(names.iter().map(|n| PathBuf::from("/uploads").join(n)).collect())
    }

    fn found(index: &LookupIndex, rec: &FileRecord) -> Option<(String, MatchStrategy)> {
        Matcher::new(index)
            .find(rec)
            .map(|m| (file_name(m.path).unwrap().to_string(), m.strategy))
    }

    #[test]
    fn test_url_basename_wins_over_everything() {
        let idx = index(&["abc123_other.png", "holiday_f00d.png", "sunset.png"]);
        let rec = record(1, "sunset.png", "abc123", "/uploads/holiday_f00d.png", "local");
        assert_eq!(
            found(&idx, &rec),
            Some(("holiday_f00d.png".to_string(), MatchStrategy::UrlBasename))
        );
    }

    #[test]
    fn test_url_basename_ignores_stem_only_keys() {
        let idx = index(&["photo.png"]);
        let matcher = Matcher::new(&idx);
        assert!(matcher.by_url_basename("/uploads/photo").is_none());
        assert!(matcher.by_url_basename("/uploads/photo.png?v=2").is_some());
        assert!(matcher.by_url_basename("/uploads/").is_none());
    }

    #[test]
    fn test_hash_substring() {
        let idx = index(&["image_abc123_large.jpg", "zzz.gif"]);
        let rec = record(2, "Vacation Pic.jpg", "abc123", "/uploads/vacation_pic_abc123.jpg", "local");
        assert_eq!(
            found(&idx, &rec),
            Some(("image_abc123_large.jpg".to_string(), MatchStrategy::HashSubstring))
        );
        assert!(Matcher::new(&idx).by_hash("").is_none());
    }

    #[test]
    fn test_normalized_name() {
        let idx = index(&["my_photo.png"]);
        let rec = record(3, "My Photo!!.png", "ffff99", "/uploads/unknown.png", "local");
        assert_eq!(
            found(&idx, &rec),
            Some(("my_photo.png".to_string(), MatchStrategy::NormalizedName))
        );

        let idx = index(&["team-offsite-2023_x1y2.jpeg"]);
        let matcher = Matcher::new(&idx);
        assert!(matcher.by_normalized_name("Team Offsite 2023").is_some());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("My Photo!!.png", "_"), "my_photo.png");
        assert_eq!(normalize_name("  Big   Cat  ", "-"), "big-cat");
        assert_eq!(normalize_name("!!!", "_"), "");
        assert_eq!(alnum_lower("Résumé 2024.PDF"), "rsum2024pdf");
    }

    #[test]
    fn test_fuzzy_overlap() {
        // "quarterlyreportpdf" vs "qtrquarterlyrepxpdf": window = max(3, 18*3/5 = 10)
        let idx = index(&["qtr-quarterly-rep-x.pdf"]);
        let matcher = Matcher::new(&idx);
        assert!(matcher.by_fuzzy_overlap("Quarterly Report.pdf").is_some());
        assert!(matcher.by_normalized_name("Quarterly Report.pdf").is_none());

        let idx = index(&["zz.txt"]);
        assert!(Matcher::new(&idx).by_fuzzy_overlap("Quarterly Report.pdf").is_none());
        assert!(Matcher::new(&idx).by_fuzzy_overlap("!!").is_none());
    }

    #[test]
    fn test_fuzzy_overlap_strategy_reported() {
        let idx = index(&["qtr-quarterly-rep-x.pdf"]);
        let rec = record(4, "Quarterly Report.pdf", "", "/uploads/gone.pdf", "local");
        assert_eq!(
            found(&idx, &rec).map(|(_, s)| s),
            Some(MatchStrategy::FuzzyOverlap)
        );
    }

    #[test]
    fn test_extension_prefix_fallback() {
        let idx = index(&["wintr.JPG", "winter.png"]);
        let matcher = Matcher::new(&idx);
        // extension comparison ignores case
        assert_eq!(
            matcher.by_extension_prefix("wintr-scene.jpg", None),
            Some(Path::new("/uploads/wintr.JPG"))
        );
        // extension taken from the record when the name has none
        assert_eq!(
            matcher.by_extension_prefix("winter", Some(".png")),
            Some(Path::new("/uploads/winter.png"))
        );
        assert!(matcher.by_extension_prefix("winter", None).is_none());
        assert!(matcher.by_extension_prefix("winter.gif", None).is_none());
    }

    #[test]
    fn test_no_match() {
        let idx = index(&["alpha.png", "beta.png"]);
        let rec = record(5, "Zebra.tiff", "q9q9q9", "/uploads/zebra_q9q9q9.tiff", "local");
        assert_eq!(found(&idx, &rec), None);
        assert_eq!(found(&LookupIndex::default(), &rec), None);
    }

    #[test]
    fn test_ties_resolve_lexicographically() {
        let idx = index(&["b_abc123.png", "a_abc123.png"]);
        let rec = record(6, "x", "abc123", "/uploads/missing.png", "local");
        assert_eq!(
            found(&idx, &rec),
            Some(("a_abc123.png".to_string(), MatchStrategy::HashSubstring))
        );
    }

    #[test]
    fn test_url_basename() {
        assert_eq!(url_basename("/uploads/a_b.png"), "a_b.png");
        assert_eq!(url_basename("https://host/x/y.jpg?w=10#frag"), "y.jpg");
        assert_eq!(url_basename("plain.gif"), "plain.gif");
    }
}
