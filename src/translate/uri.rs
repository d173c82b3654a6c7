//! Minimal parsing of Camel endpoint URIs
//!
//! An endpoint URI has the shape `scheme:path?key=value&key=value`. The path
//! may be prefixed by `//`. Query values are form-encoded, so `+` decodes to a
//! space (cron expressions are usually written as `0/2+*+*+*+?`).

use std::collections::BTreeMap;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UriError {
    #[error("invalid URL escape {escape:?} in query of {uri:?}")]
    MalformedQuery { uri: String, escape: String },
}

/// A Camel endpoint URI split into its parts
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointUri {
    pub scheme: String,
    pub path: String,
    pub params: BTreeMap<String, String>,
}

impl EndpointUri {
    /// Parse an endpoint URI. Fails only on malformed percent escapes.
    pub fn parse(uri: &str) -> Result<Self, UriError> {
        let (scheme, rest) = match uri.split_once(':') {
            Some((scheme, rest)) => (scheme, rest),
            None => (uri, ""),
        };

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };

        check_escapes(uri, query)?;

        // The first occurrence wins, as with a plain query lookup.
        let mut params = BTreeMap::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }

        Ok(Self {
            scheme: scheme.to_string(),
            path: path.trim_start_matches("//").to_string(),
            params,
        })
    }

    /// Query parameter value, empty values are treated as absent
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Scheme of an endpoint URI, without parsing the query
pub fn component(uri: &str) -> &str {
    uri.split_once(':').map(|(scheme, _)| scheme).unwrap_or(uri)
}

fn check_escapes(uri: &str, query: &str) -> Result<(), UriError> {
    let bytes = query.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b != b'%' {
            continue;
        }
        let valid = bytes.len() > i + 2
            && bytes[i + 1].is_ascii_hexdigit()
            && bytes[i + 2].is_ascii_hexdigit();
        if !valid {
            let end = (i + 3).min(query.len());
            return Err(UriError::MalformedQuery {
                uri: uri.to_string(),
                escape: String::from_utf8_lossy(&bytes[i..end]).into_owned(),
            });
        }
    }
    Ok(())
}
