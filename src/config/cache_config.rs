//! 캐시 / 레이트 리밋 / 세션 설정
//!
//! 모든 값은 환경 변수에서 읽으며, 값이 없거나 파싱에 실패하면 기본값을 사용합니다.
//!
//! ```bash
//! REDIS_URL=redis://localhost:6379
//! CACHE_BACKEND_TIMEOUT_MS=2000
//! CACHE_DEFAULT_TTL_SECONDS=300
//! CACHE_RETRY_AFTER_SECONDS=30
//! CACHE_HEALTH_CHECK_INTERVAL_SECONDS=30
//! RATE_LIMIT_DEFAULT=100/minute
//! RATE_LIMIT_KEY_PREFIX=rate_limit
//! SESSION_COOKIE_NAME=session
//! SESSION_LIFETIME_SECONDS=86400
//! SESSION_KEY_PREFIX=session
//! CHALLENGE_TTL_SECONDS=300
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::config::data_config::Environment;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

/// 공유 캐시 백엔드 설정
pub struct CacheConfig;

impl CacheConfig {
    /// `REDIS_URL`이 비어 있거나 없으면 `None` (인메모리 백엔드 사용)
    pub fn redis_url_opt() -> Option<String> {
        env::var("REDIS_URL").ok().filter(|url| !url.trim().is_empty())
    }

    pub fn redis_url() -> String {
        Self::redis_url_opt().unwrap_or_else(|| "redis://localhost:6379".to_string())
    }

    /// 백엔드 명령 하나의 최대 대기 시간
    pub fn backend_timeout() -> Duration {
        Duration::from_millis(env_or("CACHE_BACKEND_TIMEOUT_MS", 2000))
    }

    pub fn default_ttl_seconds() -> u64 {
        env_or("CACHE_DEFAULT_TTL_SECONDS", 300)
    }

    /// 실패 후 백엔드를 다시 시도하기까지의 시간
    pub fn retry_after_seconds() -> u64 {
        env_or("CACHE_RETRY_AFTER_SECONDS", 30)
    }

    pub fn health_check_interval() -> Duration {
        Duration::from_secs(env_or("CACHE_HEALTH_CHECK_INTERVAL_SECONDS", 30).max(1))
    }
}

pub struct RateLimitConfig;

impl RateLimitConfig {
    /// 라우트에 별도 지정이 없을 때의 한도 (`"<count>/<period>"`)
    pub fn default_limit() -> String {
        env::var("RATE_LIMIT_DEFAULT").unwrap_or_else(|_| "100/minute".to_string())
    }

    pub fn key_prefix() -> String {
        env::var("RATE_LIMIT_KEY_PREFIX").unwrap_or_else(|_| "rate_limit".to_string())
    }
}

pub struct SessionConfig;

impl SessionConfig {
    pub fn cookie_name() -> String {
        env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "session".to_string())
    }

    pub fn lifetime_seconds() -> u64 {
        env_or("SESSION_LIFETIME_SECONDS", 86_400)
    }

    pub fn key_prefix() -> String {
        env::var("SESSION_KEY_PREFIX").unwrap_or_else(|_| "session".to_string())
    }
}

pub struct ChallengeConfig;

impl ChallengeConfig {
    pub fn ttl_seconds() -> u64 {
        env_or("CHALLENGE_TTL_SECONDS", 300)
    }

    /// 챌린지 하나에 허용되는 검증 시도 횟수
    pub fn max_attempts() -> u32 {
        env_or("CHALLENGE_MAX_ATTEMPTS", 5)
    }

    /// 챌린지 코드 해시의 bcrypt cost
    ///
    /// `CHALLENGE_HASH_COST`가 4~15 범위면 그 값을, 아니면 환경별 기본값을 사용합니다.
    pub fn hash_cost() -> u32 {
        match env::var("CHALLENGE_HASH_COST").ok().and_then(|v| v.parse::<u32>().ok()) {
            Some(cost) if (4..=15).contains(&cost) => cost,
            _ => Self::hash_cost_for_env(&Environment::current()),
        }
    }

    pub fn hash_cost_for_env(env: &Environment) -> u32 {
        match env {
            Environment::Development | Environment::Test => 4,
            Environment::Staging => 8,
            Environment::Production => 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_falls_back_on_missing_or_invalid() {
        assert_eq!(env_or("RESILIENCE_TEST_UNSET_KEY", 42u64), 42);

        unsafe { env::set_var("RESILIENCE_TEST_INVALID_KEY", "not-a-number") };
        assert_eq!(env_or("RESILIENCE_TEST_INVALID_KEY", 7u64), 7);
    }

    #[test]
    fn test_hash_cost_for_each_environment() {
        assert_eq!(ChallengeConfig::hash_cost_for_env(&Environment::Development), 4);
        assert_eq!(ChallengeConfig::hash_cost_for_env(&Environment::Test), 4);
        assert_eq!(ChallengeConfig::hash_cost_for_env(&Environment::Staging), 8);
        assert_eq!(ChallengeConfig::hash_cost_for_env(&Environment::Production), 10);
    }

    #[test]
    fn test_defaults() {
        if env::var("CACHE_BACKEND_TIMEOUT_MS").is_err() {
            assert_eq!(CacheConfig::backend_timeout(), Duration::from_millis(2000));
        }
        if env::var("RATE_LIMIT_DEFAULT").is_err() {
            assert_eq!(RateLimitConfig::default_limit(), "100/minute");
        }
        if env::var("SESSION_COOKIE_NAME").is_err() {
            assert_eq!(SessionConfig::cookie_name(), "session");
        }
    }
}
