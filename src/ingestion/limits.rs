//! Size ceiling applied to every dataset source.

use std::env;

pub const SIZE_LIMIT_ENV: &str = "MCP_CSV_SIZE_LIMIT_MB";
pub const DEFAULT_SIZE_LIMIT_MB: u64 = 50;
pub const MIN_SIZE_LIMIT_MB: u64 = 1;
pub const MAX_SIZE_LIMIT_MB: u64 = 1024;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Interprets a raw override value. Anything unparseable falls back to the default.
pub fn clamp_limit_mb(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_SIZE_LIMIT_MB)
        .clamp(MIN_SIZE_LIMIT_MB, MAX_SIZE_LIMIT_MB)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeLimit {
    /// Read `MCP_CSV_SIZE_LIMIT_MB` on every load.
    #[default]
    FromEnv,
    /// A configured value in megabytes, still clamped to the valid range.
    Fixed(u64),
}

impl SizeLimit {
    pub fn resolve_mb(&self) -> u64 {
        match self {
            SizeLimit::FromEnv => clamp_limit_mb(env::var(SIZE_LIMIT_ENV).ok().as_deref()),
            SizeLimit::Fixed(mb) => (*mb).clamp(MIN_SIZE_LIMIT_MB, MAX_SIZE_LIMIT_MB),
        }
    }

    pub fn resolve_bytes(&self) -> u64 {
        self.resolve_mb() * BYTES_PER_MB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit_defaults() {
        assert_eq!(clamp_limit_mb(None), 50);
        assert_eq!(clamp_limit_mb(Some("")), 50);
        assert_eq!(clamp_limit_mb(Some("abc")), 50);
        assert_eq!(clamp_limit_mb(Some("-3")), 50);
    }

    #[test]
    fn test_clamp_limit_range() {
        assert_eq!(clamp_limit_mb(Some("0")), 1);
        assert_eq!(clamp_limit_mb(Some("1")), 1);
        assert_eq!(clamp_limit_mb(Some(" 200 ")), 200);
        assert_eq!(clamp_limit_mb(Some("1024")), 1024);
        assert_eq!(clamp_limit_mb(Some("5000")), 1024);
    }

    #[test]
    fn test_fixed_limit_is_clamped() {
        assert_eq!(SizeLimit::Fixed(0).resolve_mb(), 1);
        assert_eq!(SizeLimit::Fixed(2).resolve_bytes(), 2 * 1024 * 1024);
        assert_eq!(SizeLimit::Fixed(99_999).resolve_mb(), 1024);
    }
}
