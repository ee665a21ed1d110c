//! Utility functions for the rating service

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Offset of the first entry on a 1-based page
pub fn page_offset(page: usize, page_size: usize) -> usize {
    page.saturating_sub(1) * page_size
}
