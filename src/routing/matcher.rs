//! Route pattern parsing and conflict detection.
//!
//! # Responsibilities
//! - Parse axum-style path patterns (`/pks/lookup`, `/docs/{*filepath}`)
//! - Reject segments the HTTP router would refuse at registration time
//! - Decide whether two patterns claim the same requests
//!
//! # Design Decisions
//! - Parameter names do not distinguish patterns: `/a/{x}` and `/a/{y}` collide
//! - A catch-all owns its whole subtree, parent path included: `/pks/{*rest}`
//!   collides with `/pks/lookup`, `/pks/` and `/pks`
//! - Matching is segment-wise and case-sensitive, no regex

use std::fmt;

use crate::routing::RouteError;

/// One path segment of a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text.
    Static(String),
    /// `{name}`: exactly one segment.
    Param(String),
    /// `{*name}`: the remainder of the path.
    CatchAll(String),
}

/// A parsed route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    raw: String,
    segments: Vec<Segment>,
}

impl RoutePattern {
    /// Parse a pattern. The root pattern `/` has no segments.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        let invalid = |reason: &str| RouteError::InvalidPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        let rest = raw.strip_prefix('/').ok_or_else(|| invalid("must start with '/'"))?;
        let mut segments = Vec::new();
        if !rest.is_empty() {
            let parts: Vec<&str> = rest.split('/').collect();
            for (i, part) in parts.iter().enumerate() {
                let segment = parse_segment(part).map_err(|reason| invalid(reason))?;
                if matches!(segment, Segment::CatchAll(_)) && i + 1 != parts.len() {
                    return Err(invalid("catch-all must be the last segment"));
                }
                segments.push(segment);
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The pattern text as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// True if both patterns would claim at least one common request path.
    pub fn conflicts_with(&self, other: &RoutePattern) -> bool {
        let (a, b) = (&self.segments, &other.segments);
        for i in 0.. {
            match (a.get(i), b.get(i)) {
                (None, None) => return true,
                (Some(Segment::CatchAll(_)), _) | (_, Some(Segment::CatchAll(_))) => return true,
                (None, Some(_)) | (Some(_), None) => return false,
                (Some(x), Some(y)) if !same_shape(x, y) => return false,
                _ => {}
            }
        }
        false
    }

    /// Extra router paths for a trailing catch-all.
    ///
    /// The HTTP router's catch-all never matches an empty remainder, so the
    /// parent path is routed separately, with and without the final slash.
    pub fn subtree_aliases(&self) -> Vec<String> {
        if !matches!(self.segments.last(), Some(Segment::CatchAll(_))) {
            return Vec::new();
        }
        match self.raw.rsplit_once('/') {
            Some((parent, _)) if !parent.is_empty() => vec![parent.to_string(), format!("{parent}/")],
            _ => vec!["/".to_string()],
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn same_shape(a: &Segment, b: &Segment) -> bool {
    match (a, b) {
        (Segment::Static(x), Segment::Static(y)) => x == y,
        (Segment::Param(_), Segment::Param(_)) => true,
        (Segment::CatchAll(_), Segment::CatchAll(_)) => true,
        _ => false,
    }
}

fn parse_segment(part: &str) -> Result<Segment, &'static str> {
    if part.is_empty() {
        return Err("empty path segment");
    }
    if let Some(inner) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
        let (segment, name) = match inner.strip_prefix('*') {
            Some(name) => (Segment::CatchAll(name.to_string()), name),
            None => (Segment::Param(inner.to_string()), inner),
        };
        if name.is_empty() || name.contains(['{', '}', '*']) {
            return Err("malformed parameter");
        }
        return Ok(segment);
    }
    if part.contains(['{', '}']) {
        return Err("braces are only allowed around a whole segment");
    }
    if part.starts_with(':') || part.starts_with('*') {
        return Err("segment must not start with ':' or '*'");
    }
    Ok(Segment::Static(part.to_string()))
}
