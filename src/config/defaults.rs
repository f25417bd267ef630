/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./group-crawler.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

// Scheduler defaults
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_LAUNCH_DELAY_MS: u64 = 10;
pub const DEFAULT_MAX_DEPTH: i32 = 3;
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 32;
pub const DEFAULT_TOO_MANY_REQUESTS_COOLDOWN_SECS: u64 = 60;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

// Crawler defaults
pub const DEFAULT_MAX_JOINED_CHATS: i64 = 200;
pub const DEFAULT_JOIN_DELAY_SECS: u64 = 30;
pub const DEFAULT_HISTORY_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HISTORY_PAGE_SIZE: i32 = 100;
pub const DEFAULT_MEMBER_PAGE_SIZE: i32 = 200;
pub const DEFAULT_MEMBER_PAGE_DELAY_MS: u64 = 20;
pub const DEFAULT_MEMBER_RETRY_DELAY_SECS: u64 = 30;
pub const DEFAULT_ACCOUNT_FETCH_DELAY_MS: u64 = 10;
pub const DEFAULT_OLDEST_MESSAGE_DATE: &str = "2020-01-01T00:00:00Z";
pub const DEFAULT_MAX_TEXT_LENGTH: usize = 8192;
pub const DEFAULT_LEAVE_BATCH_SIZE: u64 = 5;

// Graph defaults
pub const DEFAULT_GRAPH_MIN_MEMBER_COUNT: i32 = 100;
pub const DEFAULT_GRAPH_MIN_CONNECTIONS: i64 = 10;
pub const DEFAULT_GRAPH_MIN_MESSAGES: i64 = 100;
pub const DEFAULT_GRAPH_CHUNK_SIZE: usize = 500;
