use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Reasons a URL is refused as a feed address.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a URL a user wants to register as a feed.
///
/// Registered feeds are fetched again later, possibly from another machine,
/// so addresses that only make sense locally are refused: non-HTTP(S)
/// schemes, localhost, and private or link-local IP ranges.
///
/// Returns the parsed [`Url`]; callers store the original string so that the
/// uniqueness check compares exactly what the user typed.
///
/// # Examples
///
/// ```
/// use gator::util::validate_feed_url;
///
/// assert!(validate_feed_url("https://www.wagslane.dev/index.xml").is_ok());
/// assert!(validate_feed_url("http://localhost/feed").is_err());
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if host.eq_ignore_ascii_case("localhost") {
        return Err(UrlValidationError::Localhost);
    }

    // IPv6 hosts come back bracketed
    let bare_host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    if let Ok(ip) = bare_host.parse::<IpAddr>() {
        if ip.is_loopback() {
            return Err(UrlValidationError::Localhost);
        }
        if is_private_ip(&ip) {
            return Err(UrlValidationError::PrivateIp(ip.to_string()));
        }
    }

    Ok(url)
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => ipv4.is_private() || ipv4.is_link_local() || ipv4.is_unspecified(),
        IpAddr::V6(ipv6) => {
            if ipv6.is_unspecified() {
                return true;
            }
            let first = ipv6.segments()[0];
            // fc00::/7 unique local, fe80::/10 link-local
            (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_feed_urls_accepted() {
        for url in [
            "https://www.wagslane.dev/index.xml",
            "http://news.example.org/rss",
            "https://example.com:8443/feed.xml",
        ] {
            assert!(validate_feed_url(url).is_ok(), "{} should be accepted", url);
        }
    }

    #[test]
    fn test_unparseable_url_rejected() {
        assert!(matches!(
            validate_feed_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_non_http_schemes_rejected() {
        assert_eq!(
            validate_feed_url("ftp://example.com/feed"),
            Err(UrlValidationError::UnsupportedScheme("ftp".to_string()))
        );
        assert!(validate_feed_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_local_addresses_rejected() {
        for url in [
            "http://localhost/feed",
            "http://LOCALHOST:3000/feed",
            "http://127.0.0.1/feed",
            "http://[::1]/feed",
        ] {
            assert_eq!(validate_feed_url(url), Err(UrlValidationError::Localhost), "{}", url);
        }
    }

    #[test]
    fn test_private_ranges_rejected() {
        for url in [
            "http://192.168.1.1/feed",
            "http://10.0.0.1:8080/feed",
            "http://172.16.0.1/feed",
            "http://169.254.1.1/feed",
            "http://0.0.0.0/feed",
            "http://[fe80::1]/feed",
            "http://[fd00::1]/feed",
        ] {
            assert!(
                matches!(validate_feed_url(url), Err(UrlValidationError::PrivateIp(_))),
                "{} should be rejected as private",
                url
            );
        }
    }
}
