//! Cache and frame-loop configuration.
//!
//! The only runtime override is the liveness window, read from
//! [`CACHE_DURATION_ENV`] as a duration string such as `90s`, `1m30s` or
//! `250ms`.  A value that does not parse leaves the default in place.

use std::time::Duration;

use thiserror::Error;

/// Environment variable overriding [`CacheConfig::cache_duration`].
pub const CACHE_DURATION_ENV: &str = "PAINTCACHE_DURATION";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long an untouched entry stays alive.
    pub cache_duration: Duration,
    /// No sweep ever runs closer than this to the previous one.
    pub min_sweep_interval: Duration,
    /// Slack subtracted from the walk threshold so a liveness walk lands
    /// before entries reach their deadline.
    pub walk_slack: Duration,
    /// Frame ticks per second.
    pub tick_rate: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_duration: Duration::from_secs(60),
            min_sweep_interval: Duration::from_secs(10),
            walk_slack: Duration::from_secs(1),
            tick_rate: 60,
        }
    }
}

impl CacheConfig {
    /// Defaults, with the cache duration taken from the environment when it
    /// is set and parses.
    pub fn from_env() -> Self {
        Self::default().with_env_override(std::env::var(CACHE_DURATION_ENV).ok().as_deref())
    }

    /// Applies an override string as read from the environment.
    pub fn with_env_override(self, value: Option<&str>) -> Self {
        let Some(raw) = value else { return self };
        match parse_duration(raw) {
            Ok(d) => self.with_cache_duration(d),
            Err(err) => {
                tracing::debug!(value = raw, %err, "ignoring cache duration override");
                self
            }
        }
    }

    #[must_use]
    pub fn with_cache_duration(mut self, d: Duration) -> Self {
        self.cache_duration = d;
        self
    }

    #[must_use]
    pub fn with_min_sweep_interval(mut self, d: Duration) -> Self {
        self.min_sweep_interval = d;
        self
    }

    #[must_use]
    pub fn with_walk_slack(mut self, d: Duration) -> Self {
        self.walk_slack = d;
        self
    }

    #[must_use]
    pub fn with_tick_rate(mut self, hz: u32) -> Self {
        self.tick_rate = hz.max(1);
        self
    }

    /// Idle frames still sweep once this much time has passed.
    pub fn clean_interval(&self) -> Duration {
        self.cache_duration / 2
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

/// Why a duration string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("empty duration")]
    Empty,
    #[error("negative duration `{0}`")]
    Negative(String),
    #[error("invalid number in duration `{0}`")]
    InvalidNumber(String),
    #[error("missing unit in duration `{0}`")]
    MissingUnit(String),
    #[error("unknown unit `{unit}` in duration `{input}`")]
    UnknownUnit { unit: String, input: String },
    #[error("duration `{0}` is out of range")]
    Overflow(String),
}

/// Parses a sequence of decimal numbers, each with an optional fraction and
/// a unit suffix: `300ms`, `1.5h`, `2h45m`.  Units are `ns`, `us` (or `µs`),
/// `ms`, `s`, `m` and `h`.  A bare `0` is accepted.
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ConfigError::Empty);
    }
    let s = match s.as_bytes()[0] {
        b'-' => return Err(ConfigError::Negative(input.to_owned())),
        b'+' => &s[1..],
        _ => s,
    };
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(ConfigError::InvalidNumber(input.to_owned()));
    }

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let num_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(num_len);
        if number.is_empty() || number == "." || number.matches('.').count() > 1 {
            return Err(ConfigError::InvalidNumber(input.to_owned()));
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        if unit.is_empty() {
            return Err(ConfigError::MissingUnit(input.to_owned()));
        }
        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            _ => {
                return Err(ConfigError::UnknownUnit {
                    unit: unit.to_owned(),
                    input: input.to_owned(),
                })
            }
        };

        let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
        let overflow = || ConfigError::Overflow(input.to_owned());
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| ConfigError::InvalidNumber(input.to_owned()))?
        };
        let mut nanos = whole.checked_mul(scale).ok_or_else(overflow)?;
        // Fractional digits beyond nanosecond precision are dropped.
        let mut place = scale;
        for digit in frac.bytes() {
            place /= 10;
            if place == 0 {
                break;
            }
            nanos += u128::from(digit - b'0') * place;
        }

        total = total.checked_add(nanos).ok_or_else(overflow)?;
        rest = tail;
    }

    let nanos = u64::try_from(total).map_err(|_| ConfigError::Overflow(input.to_owned()))?;
    Ok(Duration::from_nanos(nanos))
}
