//! Fetched page wrapper.

use std::collections::HashMap;

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// URL that was requested.
    pub url: String,
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
    /// Lowercased header names.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Build a 200 response, mostly useful for tests and in-memory fetchers.
    pub fn ok(url: impl Into<String>, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        let url = url.into();
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Self {
            final_url: url.clone(),
            url,
            status: 200,
            headers,
            body: body.into(),
        }
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Get the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(|s| s.as_str())
    }

    /// Content-Type without parameters, lowercased.
    pub fn mime_type(&self) -> Option<String> {
        self.content_type()
            .and_then(|ct| ct.split(';').next())
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_strips_parameters() {
        let page = FetchedPage::ok("https://a.b", "Text/HTML; charset=utf-8", "<p>x</p>");
        assert_eq!(page.mime_type().as_deref(), Some("text/html"));
        assert!(page.is_success());
        assert_eq!(page.text(), "<p>x</p>");
    }

    #[test]
    fn test_lossy_text() {
        let page = FetchedPage::ok("u", "text/html", vec![b'a', 0xff, b'b']);
        assert_eq!(page.text(), "a\u{fffd}b");
    }
}
