//! Browser-like request headers for the Vietnamese market endpoints.
//!
//! The endpoints reject requests that do not look like they come from their
//! own web frontends, so each client sends a matching referer and origin.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/120.0.0.0 Safari/537.36";

const JSON: &str = "application/json";
const FORM: &str = "application/x-www-form-urlencoded";

fn browser_headers(content_type: &'static str, referer: &'static str, origin: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(REFERER, HeaderValue::from_static(referer));
    headers.insert(ORIGIN, HeaderValue::from_static(origin));
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    if content_type == JSON {
        headers.insert(ACCEPT, HeaderValue::from_static(JSON));
    }
    headers
}

pub fn vci_headers() -> HeaderMap {
    browser_headers(
        JSON,
        "https://trading.vietcap.com.vn/",
        "https://trading.vietcap.com.vn/",
    )
}

pub fn fmarket_headers() -> HeaderMap {
    browser_headers(JSON, "https://fmarket.vn/", "https://fmarket.vn/")
}

/// SJC expects a form-encoded body.
pub fn sjc_headers() -> HeaderMap {
    browser_headers(FORM, "https://sjc.com.vn/bieu-do-gia-vang", "https://sjc.com.vn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_endpoints_accept_json() {
        for headers in [vci_headers(), fmarket_headers()] {
            assert_eq!(headers.get(ACCEPT).unwrap(), JSON);
            assert!(headers.contains_key(REFERER));
            assert!(headers.contains_key(ORIGIN));
            assert!(headers.contains_key(USER_AGENT));
        }
    }

    #[test]
    fn test_sjc_uses_form_encoding() {
        let headers = sjc_headers();
        let content_type = headers.get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.contains("x-www-form-urlencoded"));
        assert!(!headers.contains_key(ACCEPT));
    }
}
