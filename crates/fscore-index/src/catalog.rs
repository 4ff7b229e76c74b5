use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::path::Path;

/// Filename → set of absolute paths sharing that name.
///
/// Names and paths are kept as the platform gave them, so filenames that are not valid
/// UTF-8 survive indexing and snapshots unchanged. Paths inside one filename are kept
/// unique and in byte order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathCatalog {
    entries: BTreeMap<OsString, BTreeSet<OsString>>,
    path_count: usize,
}

/// One catalogued file whose name matched a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogMatch<'a> {
    pub name: &'a OsStr,
    pub path: &'a Path,
}

impl PathCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_entries(entries: BTreeMap<OsString, BTreeSet<OsString>>) -> Self {
        let path_count = entries.values().map(BTreeSet::len).sum();
        Self {
            entries,
            path_count,
        }
    }

    pub(crate) fn entries(&self) -> &BTreeMap<OsString, BTreeSet<OsString>> {
        &self.entries
    }

    /// Adds `path` under `filename`. Returns false if the pair was already present.
    pub fn insert(&mut self, filename: impl Into<OsString>, path: impl Into<OsString>) -> bool {
        let inserted = self
            .entries
            .entry(filename.into())
            .or_default()
            .insert(path.into());
        if inserted {
            self.path_count += 1;
        }
        inserted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.path_count = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct filenames.
    pub fn name_count(&self) -> usize {
        self.entries.len()
    }

    pub fn path_count(&self) -> usize {
        self.path_count
    }

    /// Exact, case-sensitive lookup of one filename.
    pub fn paths_for(&self, filename: impl AsRef<OsStr>) -> impl Iterator<Item = &Path> {
        self.entries
            .get(filename.as_ref())
            .into_iter()
            .flat_map(|paths| paths.iter().map(Path::new))
    }

    /// Every file whose name contains `fragment`, ignoring case.
    ///
    /// Duplicates are removed and the result is sorted by path. An empty fragment
    /// matches nothing. Names that are not valid UTF-8 are matched on their lossy form.
    pub fn matches(&self, fragment: &str) -> Vec<CatalogMatch<'_>> {
        if fragment.is_empty() {
            return Vec::new();
        }

        let needle = fragment.to_lowercase();
        let mut hits = BTreeMap::new();
        for (name, paths) in &self.entries {
            if name_contains(name, &needle) {
                for path in paths {
                    hits.entry(path.as_os_str()).or_insert(name.as_os_str());
                }
            }
        }

        hits.into_iter()
            .map(|(path, name)| CatalogMatch {
                name,
                path: Path::new(path),
            })
            .collect()
    }

    /// Paths of [`matches`](Self::matches).
    pub fn lookup_by_substring(&self, fragment: &str) -> Vec<&Path> {
        self.matches(fragment)
            .into_iter()
            .map(|hit| hit.path)
            .collect()
    }
}

/// `needle_lower` must already be lowercased.
fn name_contains(name: &OsStr, needle_lower: &str) -> bool {
    if needle_lower.is_ascii() && name.as_encoded_bytes().is_ascii() {
        return contains_ascii_case_insensitive(name.as_encoded_bytes(), needle_lower);
    }

    name.to_string_lossy().to_lowercase().contains(needle_lower)
}

fn contains_ascii_case_insensitive(haystack: &[u8], needle_lower_ascii: &str) -> bool {
    let n = needle_lower_ascii.as_bytes();
    if n.len() > haystack.len() {
        return false;
    }

    let first = n[0];
    haystack.windows(n.len()).any(|window| {
        window[0].to_ascii_lowercase() == first
            && window[1..]
                .iter()
                .zip(&n[1..])
                .all(|(hb, nb)| hb.to_ascii_lowercase() == *nb)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_catalog() -> PathCatalog {
        let mut catalog = PathCatalog::new();
        catalog.insert("report.txt", "/a/report.txt");
        catalog.insert("report.txt", "/b/report.txt");
        catalog
    }

    fn lookup<'a>(catalog: &'a PathCatalog, fragment: &str) -> Vec<&'a str> {
        catalog
            .lookup_by_substring(fragment)
            .into_iter()
            .map(|path| path.to_str().unwrap())
            .collect()
    }

    #[test]
    fn substring_match_ignores_case() {
        let catalog = report_catalog();
        assert_eq!(lookup(&catalog, "report"), vec!["/a/report.txt", "/b/report.txt"]);
        assert_eq!(lookup(&catalog, "REPORT"), vec!["/a/report.txt", "/b/report.txt"]);
        assert!(lookup(&catalog, "xyz").is_empty());
    }

    #[test]
    fn empty_fragment_matches_nothing() {
        assert!(report_catalog().lookup_by_substring("").is_empty());
        assert!(PathCatalog::new().matches("").is_empty());
    }

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut catalog = report_catalog();
        assert!(!catalog.insert("report.txt", "/a/report.txt"));
        assert_eq!(catalog.path_count(), 2);
        assert_eq!(catalog.lookup_by_substring("rep").len(), 2);
    }

    #[test]
    fn lookup_spans_filenames_and_sorts_by_path() {
        let mut catalog = PathCatalog::new();
        catalog.insert("Notes.md", "/z/Notes.md");
        catalog.insert("notes.txt", "/a/notes.txt");
        catalog.insert("todo.txt", "/a/todo.txt");

        assert_eq!(lookup(&catalog, "NOTES"), vec!["/a/notes.txt", "/z/Notes.md"]);
    }

    #[test]
    fn matches_carry_the_catalogued_name() {
        let mut catalog = PathCatalog::new();
        catalog.insert("draft\\final.txt", "/docs/draft\\final.txt");

        let hits = catalog.matches("draft");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, OsStr::new("draft\\final.txt"));
        assert_eq!(hits[0].path, Path::new("/docs/draft\\final.txt"));
    }

    #[test]
    fn non_ascii_names_match_case_insensitively() {
        let mut catalog = PathCatalog::new();
        catalog.insert("Übersicht.pdf", "/docs/Übersicht.pdf");

        assert_eq!(lookup(&catalog, "übersicht"), vec!["/docs/Übersicht.pdf"]);
        assert_eq!(lookup(&catalog, "SICHT"), vec!["/docs/Übersicht.pdf"]);
    }

    #[cfg(unix)]
    #[test]
    fn names_that_are_not_utf8_are_kept_verbatim() {
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(b"budget\xff.xlsx");
        let path = OsStr::from_bytes(b"/docs/budget\xff.xlsx");
        let mut catalog = PathCatalog::new();
        catalog.insert(name, path);

        let hits = catalog.matches("BUDGET");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, name);
        assert_eq!(hits[0].path.as_os_str(), path);
        assert_eq!(catalog.paths_for(name).count(), 1);
    }

    #[test]
    fn clear_empties_everything() {
        let mut catalog = report_catalog();
        catalog.clear();
        assert!(catalog.is_empty());
        assert_eq!(catalog.path_count(), 0);
        assert!(catalog.lookup_by_substring("report").is_empty());
    }

    #[test]
    fn ascii_matcher_handles_edges() {
        assert!(contains_ascii_case_insensitive(b"HelloWorld", "hello"));
        assert!(contains_ascii_case_insensitive(b"HelloWorld", "d"));
        assert!(!contains_ascii_case_insensitive(b"HelloWorld", "xyz"));
        assert!(!contains_ascii_case_insensitive(b"ab", "abc"));
    }
}
