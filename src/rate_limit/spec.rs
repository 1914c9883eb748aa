//! 레이트 리밋 한도 표기 파싱
//!
//! `"<count>/<period>"` 형식이며 period 는 고정 윈도우 크기(초)로 바뀝니다.
//!
//! | period | 별칭 | 윈도우 |
//! |--------|------|--------|
//! | `second` | `seconds`, `sec`, `s` | 1 |
//! | `minute` | `minutes`, `min`, `m` | 60 |
//! | `hour` | `hours`, `h` | 3600 |
//! | `day` | `days`, `d` | 86400 |

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimitSpecError {
    #[error("limit spec must look like '<count>/<period>': {0:?}")]
    Format(String),

    #[error("limit count must be a positive integer: {0:?}")]
    Count(String),

    #[error("unknown limit period: {0:?}")]
    Period(String),
}

/// 파싱된 한도
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSpec {
    pub count: u64,
    pub window_secs: u64,
}

impl LimitSpec {
    pub fn new(count: u64, window_secs: u64) -> Self {
        Self { count, window_secs }
    }

    pub fn parse(spec: &str) -> Result<Self, LimitSpecError> {
        spec.parse()
    }
}

fn period_seconds(period: &str) -> Option<u64> {
    match period.to_lowercase().as_str() {
        "second" | "seconds" | "sec" | "s" => Some(1),
        "minute" | "minutes" | "min" | "m" => Some(60),
        "hour" | "hours" | "h" => Some(3_600),
        "day" | "days" | "d" => Some(86_400),
        _ => None,
    }
}

impl FromStr for LimitSpec {
    type Err = LimitSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (count, period) = spec
            .split_once('/')
            .ok_or_else(|| LimitSpecError::Format(spec.to_string()))?;

        let count = count
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|c| *c > 0)
            .ok_or_else(|| LimitSpecError::Count(count.trim().to_string()))?;

        let period = period.trim();
        let window_secs = period_seconds(period).ok_or_else(|| LimitSpecError::Period(period.to_string()))?;

        Ok(Self { count, window_secs })
    }
}

impl fmt::Display for LimitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}s", self.count, self.window_secs)
    }
}
