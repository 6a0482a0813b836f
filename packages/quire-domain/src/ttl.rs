use time::{Duration, OffsetDateTime};

pub fn session_ttl(cfg: &quire_config::Session) -> Duration {
	Duration::hours(cfg.ttl_hours.max(0))
}

/// A record is expired once strictly more than `ttl` has passed since its last access.
pub fn is_expired(last_accessed_at: OffsetDateTime, ttl: Duration, now: OffsetDateTime) -> bool {
	now - last_accessed_at > ttl
}
