//! Extension classifier deciding whether a URL is crawled or archived

/// What to do with a fetched URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// HTML page: extract links and recurse
    Page,
    /// Downloadable document: hand to the archiver
    Document,
}

/// Classifies a URL path against the document allowlist
///
/// The path is lower-cased and compared by suffix against every allowlist
/// entry. Anything that matches no entry, including directory-style paths
/// ending in `/` and paths without an extension, is a [`Classification::Page`].
///
/// # Examples
///
/// ```
/// use site_harvester::crawler::{classify, Classification};
///
/// let allow = [".pdf".to_string()];
/// assert_eq!(classify("/docs/report.pdf", &allow), Classification::Document);
/// assert_eq!(classify("/projects/123", &allow), Classification::Page);
/// assert_eq!(classify("/about/", &allow), Classification::Page);
/// ```
pub fn classify<S: AsRef<str>>(url_path: &str, allowlist: &[S]) -> Classification {
    let path = url_path.to_lowercase();

    if allowlist
        .iter()
        .any(|ext| path.ends_with(&ext.as_ref().to_lowercase()))
    {
        Classification::Document
    } else {
        Classification::Page
    }
}
