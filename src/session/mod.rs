//! Session orchestration
//!
//! This module runs one competitive session at a time against a remote
//! platform: the platform capability and its bounded executor, the async
//! driver contract, the state machine implementing it, and result
//! normalization.

pub mod driver;
pub mod machine;
pub mod mock;
pub mod platform;
pub mod results;

// Re-export commonly used types
pub use driver::{ResultStream, SessionDriver};
pub use machine::SessionStateMachine;
pub use mock::MockSessionPlatform;
pub use platform::{PlatformExecutor, SessionPlatform};
pub use results::{normalize_results, MatchRoster, ReportedScore};
