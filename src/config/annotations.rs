//! Trait configuration through annotations and command line options
//!
//! Annotations use the key grammar
//! `trait.camel.apache.org/<trait>.<property>` where the property may be a
//! dotted or bracketed path (`auto-metadata.kafka.lagThreshold`,
//! `triggers[0].type`). Command line options use the same grammar without the
//! prefix, as `<trait>.<property>=<value>`.

use std::fmt;

use super::ConfigError;

/// Prefix of annotations carrying trait configuration
pub const TRAIT_ANNOTATION_PREFIX: &str = "trait.camel.apache.org/";

/// One step of a property path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(k) => f.write_str(k),
            PathSegment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// Render a path back to its textual form
pub fn path_to_string(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for (i, seg) in path.iter().enumerate() {
        if i > 0 && matches!(seg, PathSegment::Key(_)) {
            out.push('.');
        }
        out.push_str(&seg.to_string());
    }
    out
}

/// Split `a.b[0].c` into `[Key(a), Key(b), Index(0), Key(c)]`.
///
/// Returns a human readable reason on failure.
pub fn split_property_path(path: &str) -> Result<Vec<PathSegment>, String> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let (name, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if name.is_empty() {
            return Err("empty property name".to_string());
        }
        segments.push(PathSegment::Key(name.to_string()));

        while !rest.is_empty() {
            let inner = rest
                .strip_prefix('[')
                .ok_or_else(|| format!("unexpected {:?} after index", rest))?;
            let end = inner
                .find(']')
                .ok_or_else(|| "unclosed bracket".to_string())?;
            let index = inner[..end]
                .trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid index {:?}", &inner[..end]))?;
            segments.push(PathSegment::Index(index));
            rest = &inner[end + 1..];
        }
    }
    Ok(segments)
}

/// Split an annotation key into `(trait id, property path)`.
///
/// Returns `Ok(None)` for annotations without the trait prefix and an error
/// when the prefix is present but no `.` separates the trait id from the
/// property.
pub fn parse_annotation_key(key: &str) -> Result<Option<(String, String)>, ConfigError> {
    let Some(config_key) = key.strip_prefix(TRAIT_ANNOTATION_PREFIX) else {
        return Ok(None);
    };
    match config_key.split_once('.') {
        Some((id, prop)) if !id.is_empty() && !prop.is_empty() => {
            Ok(Some((id.to_string(), prop.to_string())))
        }
        _ => Err(ConfigError::MalformedAnnotation(key.to_string())),
    }
}

/// Split a `<trait>.<property>=<value>` option
pub fn parse_trait_option(option: &str) -> Result<(String, String, String), ConfigError> {
    let malformed = || ConfigError::MalformedOption(option.to_string());
    let (key, value) = option.split_once('=').ok_or_else(malformed)?;
    let (id, prop) = key.split_once('.').ok_or_else(malformed)?;
    if id.is_empty() || prop.is_empty() {
        return Err(malformed());
    }
    Ok((id.to_string(), prop.to_string(), value.to_string()))
}
