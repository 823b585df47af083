//! icalfilter - shrink remote iCalendar feeds
//!
//! Calendar feeds published by many services grow forever: every past
//! meeting stays in the file. This crate fetches such feeds, drops events
//! that ended before a cutoff (keeping anything that still recurs), strips
//! diagnostic `X-` artifacts, and serves the result.
//!
//! The interesting part is [`fetch::FetchCache`], which sits between many
//! concurrent requesters and the origin servers: it caches successful
//! responses for a TTL, collapses concurrent requests for the same URL into
//! one upstream call, and bounds upstream calls globally.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use icalfilter::{Calendar, FetchCache, FetchConfig, FetchContext};
//! use icalfilter::calendar::cutoff_for_months;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = FetchCache::http(&FetchConfig::default())?;
//!     let ctx = FetchContext::new().timeout(Duration::from_secs(5));
//!
//!     let payload = fetcher.fetch(&ctx, "https://example.com/team.ics").await?;
//!     let mut calendar = Calendar::parse(&String::from_utf8_lossy(&payload.body))?;
//!     calendar.filter_before(cutoff_for_months(chrono::Utc::now(), 3));
//!
//!     print!("{calendar}");
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod error;
pub mod fetch;
#[cfg(feature = "server")]
pub mod server;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use calendar::{Calendar, FilterStats};
pub use error::{CalendarError, CancelReason, FetchError, IcalFilterError, Result, UpstreamError};
pub use fetch::{FetchCache, FetchConfig, FetchContext, HttpTransport, Payload, Transport};
pub use version::PKG_VERSION;
