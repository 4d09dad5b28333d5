use url::Url;

/// Returns the network location (`host[:port]`) of a URL
///
/// The port is only present when it was written explicitly and differs from
/// the scheme's default; the `url` crate drops default ports while parsing.
/// URLs without a host (e.g. `mailto:`) have an empty network location.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use linkrelay::url::netloc;
///
/// let url = Url::parse("http://a.test:8080/about").unwrap();
/// assert_eq!(netloc(&url), "a.test:8080");
///
/// let url = Url::parse("https://A.test/").unwrap();
/// assert_eq!(netloc(&url), "a.test");
/// ```
pub fn netloc(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Decides whether `candidate` is internal to the page at `base`
///
/// Compares the network locations textually. The scheme is not compared,
/// subdomains are not grouped, and no IDN equivalence is applied. This is a
/// crawl scope boundary, not a security control.
pub fn is_internal(base: &Url, candidate: &Url) -> bool {
    netloc(base) == netloc(candidate)
}
