//! Shared constants for end-to-end tests

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user handle
pub const TEST_USER: &str = "testuser";

/// Regular test user password
pub const TEST_PASS: &str = "testpass123";

/// A second user, used to check that genre logs never mix
pub const OTHER_USER: &str = "otheruser";

pub const OTHER_PASS: &str = "otherpass123";

// ============================================================================
// Test Catalog
// ============================================================================

pub const ROCK: &str = "rock";
pub const JAZZ: &str = "jazz";
pub const POP: &str = "pop";

/// Number of rock songs in the test catalog
pub const ROCK_SONGS_COUNT: usize = 6;

/// Number of jazz songs in the test catalog
pub const JAZZ_SONGS_COUNT: usize = 2;

// ============================================================================
// Timeouts
// ============================================================================

pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
