/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Site defaults
pub const DEFAULT_BASE_URL: &str = "https://www.seirsanduk.us";
pub const DEFAULT_MAX_CHANNELS: usize = 100;
pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;
pub const DEFAULT_CHANNEL_PATH_SUFFIX: &str = "-online";

// Run budget defaults
pub const DEFAULT_MAX_RUNTIME_SECS: u64 = 600;

// Resolver defaults
pub const DEFAULT_MAX_RETRIES_PER_CHANNEL: u32 = 2;
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_RETRY_COOLDOWN_MS: u64 = 2000;
pub const DEFAULT_RETRY_JITTER_PERCENT: u8 = 25;
pub const DEFAULT_MANIFEST_MARKER: &str = "index.m3u8";

// Validator defaults
pub const DEFAULT_HTTP_PROBE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FFPROBE_TIMEOUT_SECS: u64 = 12;
pub const DEFAULT_FFPROBE_COMMAND: &str = "ffprobe";

// HTTP identity used by the browser, the validator and the playlist
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_REFERER: &str = "https://glebul.com";

// Output defaults
pub const DEFAULT_OUTPUT_PATH: &str = "tv.m3u";

// Browser defaults
pub const DEFAULT_HEADLESS: bool = true;
pub const DEFAULT_SANDBOX: bool = false;
pub const DEFAULT_BLOCKED_RESOURCE_TYPES: &[&str] = &["image", "stylesheet", "font", "media", "other"];
