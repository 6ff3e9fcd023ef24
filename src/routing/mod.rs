//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Compilation (at startup, in order):
//!     key-lookup handler routes (hkp)
//!     → webroot.rs (one route per top-level webroot entry)
//!     → router.rs (conflict check on every registration)
//!     → matcher.rs (pattern parsing, overlap test)
//!     → Freeze as immutable axum Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Collisions are configuration errors, never a panic
//! - Deterministic: same directory listing always yields the same table

pub mod matcher;
pub mod router;
pub mod webroot;

pub use matcher::RoutePattern;
pub use router::{RouteEntry, RouteError, RouteTable};
pub use webroot::{register_webroot, WebrootRoutes, WEBROOT_OWNER};
