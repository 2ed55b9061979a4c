//! Origin-facing request serialization.
//!
//! Every forwarded request is `HTTP/1.0` with a fixed header set, whatever
//! version the client spoke.

use crate::http::request::Header;

/// Headers the proxy always writes itself; client copies are dropped.
const REWRITTEN_HEADERS: [&str; 4] = ["host", "user-agent", "connection", "proxy-connection"];

/// Serialize the request sent to the origin.
///
/// `extra_headers` are appended after the fixed set, minus any the proxy
/// rewrites. Pass an empty slice to send only the fixed set.
pub fn build_forward_request(
    method: &str,
    path: &str,
    host: &str,
    user_agent: &str,
    extra_headers: &[Header],
) -> Vec<u8> {
    let mut request = format!(
        "{} {} HTTP/1.0\r\nHost: {}\r\nUser-Agent: {}\r\nConnection: close\r\nProxy-Connection: close\r\n",
        method, path, host, user_agent
    );

    for (name, value) in extra_headers {
        if REWRITTEN_HEADERS
            .iter()
            .any(|rewritten| name.eq_ignore_ascii_case(rewritten))
        {
            continue;
        }
        request.push_str(name);
        request.push_str(": ");
        request.push_str(value);
        request.push_str("\r\n");
    }

    request.push_str("\r\n");
    request.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DEFAULT_USER_AGENT;

    #[test]
    fn fixed_header_set() {
        let bytes = build_forward_request("GET", "/a/b", "example.com:8080", DEFAULT_USER_AGENT, &[]);
        let expected = format!(
            "GET /a/b HTTP/1.0\r\n\
             Host: example.com:8080\r\n\
             User-Agent: {}\r\n\
             Connection: close\r\n\
             Proxy-Connection: close\r\n\
             \r\n",
            DEFAULT_USER_AGENT
        );
        assert_eq!(String::from_utf8(bytes).unwrap(), expected);
    }

    #[test]
    fn extra_headers_skip_rewritten_ones() {
        let extra = vec![
            ("Host".to_string(), "spoofed".to_string()),
            ("Accept".to_string(), "text/html".to_string()),
            ("connection".to_string(), "keep-alive".to_string()),
            ("Proxy-Connection".to_string(), "keep-alive".to_string()),
            ("USER-AGENT".to_string(), "curl".to_string()),
        ];
        let bytes = build_forward_request("GET", "/", "x.test", "ua", &extra);
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with("GET / HTTP/1.0\r\nHost: x.test\r\n"));
        assert!(text.ends_with("Proxy-Connection: close\r\nAccept: text/html\r\n\r\n"));
        assert!(!text.contains("spoofed"));
        assert!(!text.contains("keep-alive"));
        assert!(!text.contains("curl"));
    }
}
