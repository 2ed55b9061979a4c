//! Absolute request-target parsing.
//!
//! Proxy requests carry the full URI (`http://host[:port]/path`) on the
//! request line. Only the `http` scheme is understood.

use crate::http::error::HttpError;

const SCHEME: &str = "http://";
const DEFAULT_PORT: u16 = 80;

/// Origin location extracted from an absolute URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsoluteUri {
    pub host: String,
    pub port: u16,
    /// Path and query, always starting with `/`.
    pub path: String,
}

impl AbsoluteUri {
    /// Value for the outbound `Host` header; the port is omitted when it is 80.
    pub fn authority(&self) -> String {
        if self.port == DEFAULT_PORT {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Split `http://host[:port]/path` into its parts.
///
/// The host runs up to the first `:` or `/`. A port is read only when a `:`
/// comes before the first `/`. Everything from the first `/` on is the path.
pub fn parse_absolute_uri(target: &str) -> Result<AbsoluteUri, HttpError> {
    let invalid = |reason: &str| HttpError::InvalidUri(format!("{}: {}", reason, target));

    let rest = match target.get(..SCHEME.len()) {
        Some(scheme) if scheme.eq_ignore_ascii_case(SCHEME) => &target[SCHEME.len()..],
        _ => return Err(invalid("missing http:// scheme")),
    };

    let slash = rest.find('/').ok_or_else(|| invalid("missing path"))?;
    let (authority, path) = rest.split_at(slash);

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| invalid("bad port"))?;
            (host, port)
        }
        None => (authority, DEFAULT_PORT),
    };

    if host.is_empty() {
        return Err(invalid("missing host"));
    }

    Ok(AbsoluteUri {
        host: host.to_string(),
        port,
        path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(target: &str) -> (String, u16, String) {
        let uri = parse_absolute_uri(target).unwrap();
        (uri.host, uri.port, uri.path)
    }

    #[test]
    fn explicit_port() {
        assert_eq!(
            parts("http://example.com:8080/a/b"),
            ("example.com".into(), 8080, "/a/b".into())
        );
    }

    #[test]
    fn default_port() {
        assert_eq!(
            parts("http://example.com/"),
            ("example.com".into(), 80, "/".into())
        );
    }

    #[test]
    fn query_stays_in_path() {
        assert_eq!(
            parts("http://localhost:15213/cgi-bin/adder?1&2").2,
            "/cgi-bin/adder?1&2"
        );
    }

    #[test]
    fn colon_after_slash_is_path() {
        assert_eq!(
            parts("http://example.com/a:b"),
            ("example.com".into(), 80, "/a:b".into())
        );
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert_eq!(parts("HTTP://example.com/x").0, "example.com");
    }

    #[test]
    fn rejects_missing_scheme() {
        assert!(matches!(
            parse_absolute_uri("/index.html"),
            Err(HttpError::InvalidUri(_))
        ));
        assert!(matches!(
            parse_absolute_uri("https://example.com/"),
            Err(HttpError::InvalidUri(_))
        ));
    }

    #[test]
    fn rejects_missing_path() {
        assert!(matches!(
            parse_absolute_uri("http://example.com"),
            Err(HttpError::InvalidUri(_))
        ));
    }

    #[test]
    fn rejects_bad_port_and_host() {
        for target in [
            "http://example.com:/",
            "http://example.com:http/",
            "http://example.com:70000/",
            "http://:8080/",
            "http:///",
        ] {
            assert!(parse_absolute_uri(target).is_err(), "{}", target);
        }
    }

    #[test]
    fn authority_omits_default_port() {
        assert_eq!(parse_absolute_uri("http://a.test/").unwrap().authority(), "a.test");
        assert_eq!(
            parse_absolute_uri("http://a.test:8080/").unwrap().authority(),
            "a.test:8080"
        );
    }
}
