//! Target resolution, header list construction and body encoding.
//!
//! # Design
//! Target parsing follows `urlsplit` rules rather than WHATWG URL parsing:
//! `http:netloc/path` has a scheme but no host and must be rejected, which a
//! normalizing parser would silently repair.

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::http::{HeaderArg, Headers, Params};

/// Default port per scheme. Unknown schemes fall back to 80.
const DEFAULT_PORTS: [(&str, u16); 4] = [("http", 80), ("ws", 80), ("https", 443), ("wss", 443)];

const DEFAULT_HEADERS: [(&str, &str); 4] = [
    ("user-agent", "testclient"),
    ("accept-encoding", "gzip, deflate"),
    ("accept", "*/*"),
    ("connection", "keep-alive"),
];

/// A target split into the pieces the connection descriptor needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Target {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    pub query: String,
}

impl Target {
    pub fn url(&self) -> String {
        let mut url = format!("{}://{}", self.scheme, self.host);
        if default_port(&self.scheme) != self.port {
            url.push_str(&format!(":{}", self.port));
        }
        url.push_str(&self.path);
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&self.query);
        }
        url
    }
}

fn default_port(scheme: &str) -> u16 {
    DEFAULT_PORTS
        .iter()
        .find(|(s, _)| *s == scheme)
        .map(|(_, port)| *port)
        .unwrap_or(80)
}

/// Split off a leading `scheme:` if the prefix is a legal scheme.
fn split_scheme(url: &str) -> (&str, &str) {
    if let Some((scheme, rest)) = url.split_once(':') {
        let mut chars = scheme.chars();
        let legal = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if legal {
            return (scheme, rest);
        }
    }
    ("", url)
}

/// Split `host:port`, leaving bracketed IPv6 literals intact.
fn split_port(hostport: &str) -> (&str, Option<&str>) {
    let colon = match hostport.rfind(']') {
        Some(end) => hostport[end..].find(':').map(|i| end + i),
        None => hostport.rfind(':'),
    };
    match colon {
        Some(i) => (&hostport[..i], Some(&hostport[i + 1..])),
        None => (hostport, None),
    }
}

/// Resolve `target` against `base_url`, validate it and merge `params` into
/// its query string.
pub(crate) fn resolve_target(base_url: &str, target: &str, params: &Params) -> Result<Target> {
    let url = if target.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), target)
    } else {
        target.to_string()
    };

    let (scheme, rest) = split_scheme(&url);
    if scheme.is_empty() {
        return Err(Error::invalid_target(
            &url,
            format!("no scheme supplied, perhaps you meant http://{url}"),
        ));
    }
    let scheme = scheme.to_ascii_lowercase();

    let (netloc, rest) = match rest.strip_prefix("//") {
        Some(after) => {
            let end = after.find(['/', '?', '#']).unwrap_or(after.len());
            after.split_at(end)
        }
        None => ("", rest),
    };
    if netloc.is_empty() {
        return Err(Error::invalid_target(&url, "no host supplied"));
    }

    let rest = rest.split('#').next().unwrap_or_default();
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let path = if path.is_empty() { "/" } else { path };

    let hostport = netloc.rsplit_once('@').map_or(netloc, |(_, h)| h);
    let (host, port) = match split_port(hostport) {
        (host, Some(port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::invalid_target(&url, format!("invalid port {port:?}")))?;
            (host, port)
        }
        (host, None) => (host, default_port(&scheme)),
    };
    if host.is_empty() {
        return Err(Error::invalid_target(&url, "no host supplied"));
    }

    let mut query = query.to_string();
    if !params.is_empty() {
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&params.encode());
    }

    Ok(Target {
        scheme,
        host: host.to_string(),
        port,
        path: path.to_string(),
        query,
    })
}

/// Build the request header list: `host`, the defaults, caller headers, then
/// the cookie header if one is supplied.
pub(crate) fn prepare_headers(host: &str, extra: &[HeaderArg], cookie: Option<String>) -> Result<Headers> {
    let mut headers = Headers::new();
    headers.push("host", host.to_string());
    for (name, value) in DEFAULT_HEADERS {
        headers.push(name, value);
    }
    for arg in extra {
        for (name, value) in header_pairs(arg)? {
            let name = http::HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| Error::InvalidHeaders(format!("illegal header name {name:?}")))?;
            http::HeaderValue::from_str(&value)
                .map_err(|_| Error::InvalidHeaders(format!("illegal value for header {name}")))?;
            headers.push(name.as_str().to_string(), value);
        }
    }
    if let Some(cookie) = cookie {
        headers.push("cookie", cookie);
    }
    Ok(headers)
}

fn header_pairs(arg: &HeaderArg) -> Result<Vec<(String, String)>> {
    use serde_json::Value;

    let unsupported = || Error::InvalidHeaders("headers must be a map or a list of pairs".into());
    let string = |value: &Value| value.as_str().map(str::to_string).ok_or_else(unsupported);

    match arg {
        HeaderArg::Pairs(pairs) => Ok(pairs.clone()),
        HeaderArg::Json(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| -> Result<(String, String)> { Ok((k.clone(), string(v)?)) })
            .collect(),
        HeaderArg::Json(Value::Array(items)) => items
            .iter()
            .map(|item| -> Result<(String, String)> {
                match item.as_array().map(Vec::as_slice) {
                    Some([k, v]) => Ok((string(k)?, string(v)?)),
                    _ => Err(unsupported()),
                }
            })
            .collect(),
        HeaderArg::Json(_) => Err(unsupported()),
    }
}

/// Encode the body and append `content-type` / `content-length`.
///
/// A non-empty form wins over JSON; JSON is used only when no form is given.
pub(crate) fn prepare_body(
    headers: &mut Headers,
    json: Option<&serde_json::Value>,
    form: Option<&Params>,
) -> Result<Bytes> {
    let form = form.filter(|f| !f.is_empty());
    let body = match (form, json) {
        (Some(form), _) => {
            headers.push("content-type", "application/x-www-form-urlencoded");
            Bytes::from(form.encode())
        }
        (None, Some(json)) => {
            let encoded = serde_json::to_vec(json).map_err(|e| Error::Encode(e.to_string()))?;
            headers.push("content-type", "application/json");
            Bytes::from(encoded)
        }
        (None, None) => Bytes::new(),
    };
    headers.push("content-length", body.len().to_string());
    Ok(body)
}
