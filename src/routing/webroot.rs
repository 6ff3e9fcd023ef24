//! Static webroot routes.
//!
//! The webroot directory is scanned once at startup. The HTTP router needs
//! explicit paths, so each top-level entry gets its own route:
//!
//! ```text
//! /                      → file server at the root
//! /<file>                → file server, path rewritten to /<file>
//! /<dir>/{*filepath}     → file server, path rewritten to /<dir>/<rest>
//!                          (also mounted at /<dir>/ and /<dir>)
//! ```
//!
//! Names are registered percent-encoded, the form clients put on the wire;
//! the file server decodes the rewritten path once.
//!
//! A missing webroot disables static serving with a warning. A generated
//! route that collides with an existing one fails the whole registration.

use std::io::ErrorKind;
use std::path::Path;

use axum::body::Body;
use axum::http::{uri::PathAndQuery, Request, Uri};
use axum::routing::get_service;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tower::ServiceExt;
use tower_http::services::ServeDir;

use crate::routing::matcher::RoutePattern;
use crate::routing::router::{RouteError, RouteTable};

/// Owner name recorded for webroot routes.
pub const WEBROOT_OWNER: &str = "webroot";

/// Bytes a client escapes inside one path segment.
const SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// What a webroot scan registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebrootRoutes {
    pub files: usize,
    pub directories: usize,
}

impl WebrootRoutes {
    /// Total routes, including the root route.
    pub fn total(&self) -> usize {
        self.files + self.directories + 1
    }
}

/// Register static routes for `webroot` into `routes`.
///
/// Returns `Ok(None)` when the directory does not exist.
pub fn register_webroot(
    routes: &mut RouteTable,
    webroot: &Path,
) -> Result<Option<WebrootRoutes>, RouteError> {
    let read_dir = match std::fs::read_dir(webroot) {
        Ok(read_dir) => read_dir,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(webroot = %webroot.display(), "Webroot not found, static content disabled");
            return Ok(None);
        }
        Err(source) => {
            return Err(RouteError::Webroot {
                path: webroot.to_path_buf(),
                source,
            })
        }
    };

    let webroot_error = |source| RouteError::Webroot {
        path: webroot.to_path_buf(),
        source,
    };

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(webroot_error)?;
        let is_dir = entry.file_type().map_err(webroot_error)?.is_dir();
        match entry.file_name().into_string() {
            Ok(name) => entries.push((name, is_dir)),
            Err(name) => {
                tracing::warn!(name = ?name, "Skipping webroot entry with non UTF-8 name");
            }
        }
    }
    entries.sort();

    let files = ServeDir::new(webroot);
    routes.register(WEBROOT_OWNER, "/", get_service(files.clone()))?;

    let mut registered = WebrootRoutes {
        files: 0,
        directories: 0,
    };
    for (name, is_dir) in entries {
        let prefix = format!("/{}", utf8_percent_encode(&name, SEGMENT_ENCODE_SET));
        let pattern = if is_dir {
            format!("{prefix}/{{*filepath}}")
        } else {
            prefix.clone()
        };
        if RoutePattern::parse(&pattern).is_err() {
            tracing::warn!(name = %name, "Skipping webroot entry that cannot be routed");
            continue;
        }

        let service = files.clone().map_request(move |req: Request<Body>| {
            if is_dir {
                rewrite_subtree(req, &prefix)
            } else {
                rewrite_path(req, &prefix)
            }
        });
        routes.register(WEBROOT_OWNER, &pattern, get_service(service))?;

        if is_dir {
            registered.directories += 1;
        } else {
            registered.files += 1;
        }
    }

    tracing::info!(
        webroot = %webroot.display(),
        files = registered.files,
        directories = registered.directories,
        "Webroot registered"
    );
    Ok(Some(registered))
}

/// Point the request at `/<dir>` plus whatever followed the directory segment.
/// A bare `/<dir>` stays as is and the file server redirects it to `/<dir>/`.
fn rewrite_subtree(req: Request<Body>, prefix: &str) -> Request<Body> {
    let rest = req
        .uri()
        .path()
        .strip_prefix(prefix)
        .unwrap_or_default()
        .to_string();
    rewrite_path(req, &format!("{prefix}{rest}"))
}

fn rewrite_path(mut req: Request<Body>, path: &str) -> Request<Body> {
    let path_and_query = match req.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = req.uri().clone().into_parts();
    match path_and_query.parse::<PathAndQuery>() {
        Ok(pq) => parts.path_and_query = Some(pq),
        Err(_) => return req,
    }
    if let Ok(uri) = Uri::from_parts(parts) {
        *req.uri_mut() = uri;
    }
    req
}
