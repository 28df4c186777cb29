/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Maximum number of ids accepted by one bulk moderation request
pub const MAX_BULK_IDS: usize = 500;

// =============================================================================
// ROLE CONSTANTS
// =============================================================================

/// Registered uploader
pub const ROLE_USER: &str = "user";

/// Moderator holding the admin password
pub const ROLE_ADMIN: &str = "admin";
