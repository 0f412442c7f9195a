/// Application name
pub const APP_NAME: &str = "dgenerate";

/// Token symbol minted by the reward program
pub const TOKEN_SYMBOL: &str = "DGEN";

/// Token decimals on the ledger (amounts are reported in base units)
pub const TOKEN_DECIMALS: u32 = 9;

/// Minimum similarity score (inclusive) for a guess to count as correct
pub const CORRECT_THRESHOLD: f64 = 70.0;

/// Display value of the reward for a correct guess. The minted amount is
/// decided by the reward program at mint time.
pub const REWARD_HINT_TOKENS: u64 = 100;

/// Score returned when both normalized strings are equal
pub const EXACT_MATCH_SCORE: f64 = 100.0;

/// Score returned when one normalized string contains the other
pub const CONTAINMENT_SCORE: f64 = 80.0;

/// Default and maximum page sizes for the challenge feed and leaderboard
pub const DEFAULT_FEED_LIMIT: u32 = 10;
pub const MAX_FEED_LIMIT: u32 = 100;

/// Maximum accepted wallet id length
pub const MAX_WALLET_ID_LEN: usize = 128;

/// Maximum accepted guess length in bytes (scoring is O(n*m))
pub const MAX_GUESS_LEN: usize = 1024;

/// Maximum accepted reference prompt length in bytes
pub const MAX_PROMPT_LEN: usize = 2048;

/// Maximum media upload size in bytes (50 MiB)
pub const MAX_MEDIA_SIZE: usize = 50 * 1024 * 1024;

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default upper bound for one reward dispatch, in seconds
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 30;
