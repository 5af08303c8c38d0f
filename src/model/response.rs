use reqwest::header::HeaderMap;
use url::Url;

/// The result of one fetch
#[derive(Debug, Clone)]
pub struct Response {
    url: Url,
    status: u16,
    headers: HeaderMap,
    body: String,
    depth: u32,
}

impl Response {
    /// Creates a response for the final `url` after any redirects
    pub fn new(url: Url, status: u16, body: impl Into<String>) -> Self {
        Self {
            url,
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            depth: 0,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns true if the status code is a real HTTP status
    pub fn valid(&self) -> bool {
        (100..600).contains(&self.status)
    }

    /// Returns true for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://example.com/").unwrap()
    }

    #[test]
    fn test_response_valid() {
        assert!(Response::new(url(), 200, "").valid());
        assert!(Response::new(url(), 404, "").valid());
        assert!(!Response::new(url(), 0, "").valid());
        assert!(!Response::new(url(), 700, "").valid());
    }

    #[test]
    fn test_response_success() {
        assert!(Response::new(url(), 204, "").is_success());
        assert!(!Response::new(url(), 301, "").is_success());
    }
}
