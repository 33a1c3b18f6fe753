use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host, it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_harvester::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// The single site a crawl run is allowed to visit
///
/// Membership is decided by host and effective port, so `http://x.org/` and
/// `https://x.org/` are in scope while `https://sub.x.org/` and
/// `http://x.org:8080/` are not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteScope {
    host: String,
    port: Option<u16>,
}

impl SiteScope {
    /// Builds the scope from the seed URL
    ///
    /// Returns None if the seed has no host.
    pub fn from_seed(seed: &Url) -> Option<Self> {
        Some(Self {
            host: extract_domain(seed)?,
            port: effective_port(seed),
        })
    }

    /// The allowed host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns true if the URL is on the allowed site
    pub fn contains(&self, url: &Url) -> bool {
        match extract_domain(url) {
            Some(host) => host == self.host && effective_port(url) == self.port,
            None => false,
        }
    }
}

/// Port used on the wire, with 80/443 treated alike so that a scheme switch on
/// the same host stays in scope
fn effective_port(url: &Url) -> Option<u16> {
    match url.port_or_known_default() {
        Some(80) | Some(443) => None,
        other => other,
    }
}
