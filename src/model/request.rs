use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

/// One unit of work to fetch
///
/// The depth is the number of derivation hops from the seed request. The
/// scheduler seeds at depth 0 and the analyzer overwrites the depth of every
/// derived request, so a depth set by a parse function is never trusted.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    depth: u32,
}

impl Request {
    /// Creates a GET request for `url` at depth 0
    pub fn new(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            depth: 0,
        }
    }

    /// Parses `url` and creates a GET request for it
    ///
    /// # Example
    ///
    /// ```
    /// use ripple_engine::Request;
    ///
    /// let request = Request::parse("https://example.com/docs").unwrap();
    /// assert_eq!(request.depth(), 0);
    /// assert!(request.valid());
    /// ```
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(url)?))
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns true if the target is a well-formed HTTP(S) URL with a host
    pub fn valid(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https") && self.url.host_str().is_some()
    }
}
