/// Data layer: core types, loading, filtering, and spreadsheet I/O.
///
/// Architecture:
/// ```text
///   CSV export / values API
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  fetch → Table → validate → Dataset  (optional TTL cache)
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  cascade options left→right, exact-match rows
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐      ┌──────────┐
///   │  export   │      │  upload   │  xlsx → validate → append
///   └──────────┘      └──────────┘
/// ```

pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod upload;

#[cfg(test)]
pub mod testing;
