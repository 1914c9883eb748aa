//! # 이중 백엔드 레이트 리미터
//!
//! 두 전략 중 사용 가능한 쪽으로 허용/거부를 결정합니다.
//!
//! - **분산 고정 윈도우**: 공유 백엔드의 `rate_limit:{endpoint}:{client}` 카운터를
//!   원자적으로 증가시키고, 키를 만든 첫 증가에서만 만료를 겁니다.
//!   여러 서버 프로세스가 같은 카운터를 공유합니다.
//! - **프로세스 내 슬라이딩 로그**: 키마다 요청 시각 목록을 유지하고
//!   `now - window` 이전 시각을 버린 뒤 남은 개수로 판단합니다.
//!
//! 공유 백엔드가 없거나 호출이 실패하면 그 요청은 로컬 전략으로 판단합니다.
//! 판단 없이 통과시키는 경우는 한도 표기를 파싱할 수 없을 때뿐입니다 (fail-open, 경고 로그).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::caching::availability::AvailabilityTracker;
use crate::caching::backend::KeyValueBackend;
use crate::config::{CacheConfig, RateLimitConfig};
use crate::rate_limit::spec::LimitSpec;
use crate::utils::clock::Clock;

/// 허용 / 거부 결정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Admit { remaining: u64 },
    Reject { retry_after_secs: u64 },
}

/// 결정을 내린 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateStrategy {
    Distributed,
    Local,
    /// 한도 표기 오류로 판단하지 않고 통과
    FailOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCheck {
    pub decision: RateDecision,
    pub strategy: RateStrategy,
    /// 적용된 한도. fail-open 이면 `None`
    pub limit: Option<LimitSpec>,
}

impl RateCheck {
    pub fn is_admitted(&self) -> bool {
        matches!(self.decision, RateDecision::Admit { .. })
    }
}

/// 프로세스 내 슬라이딩 로그 저장소
///
/// 키별 요청 시각 목록을 하나의 뮤텍스로 보호하므로 동시 요청의 증가가 유실되지 않습니다.
#[derive(Debug, Default)]
pub struct LocalRateStore {
    windows: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl LocalRateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<DateTime<Utc>>>> {
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn check(&self, key: &str, limit: &LimitSpec, now: DateTime<Utc>) -> RateDecision {
        let window = Duration::seconds(limit.window_secs as i64);
        let cutoff = now - window;

        let mut windows = self.lock();
        let stamps = windows.entry(key.to_string()).or_default();
        while stamps.front().is_some_and(|at| *at <= cutoff) {
            stamps.pop_front();
        }

        if stamps.len() as u64 >= limit.count {
            let retry_after = stamps
                .front()
                .map(|oldest| (*oldest + window - now).num_milliseconds())
                .unwrap_or(0);
            return RateDecision::Reject {
                retry_after_secs: ((retry_after + 999) / 1000).max(1) as u64,
            };
        }

        stamps.push_back(now);
        RateDecision::Admit {
            remaining: limit.count - stamps.len() as u64,
        }
    }

    /// `idle` 동안 요청이 없던 키를 제거하고 제거한 개수를 반환합니다.
    pub fn prune(&self, now: DateTime<Utc>, idle: Duration) -> usize {
        let cutoff = now - idle;
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, stamps| stamps.back().is_some_and(|at| *at > cutoff));
        before - windows.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiterSettings {
    pub key_prefix: String,
    pub retry_after: Duration,
}

impl RateLimiterSettings {
    pub fn from_env() -> Self {
        Self {
            key_prefix: RateLimitConfig::key_prefix(),
            retry_after: Duration::seconds(CacheConfig::retry_after_seconds() as i64),
        }
    }
}

impl Default for RateLimiterSettings {
    fn default() -> Self {
        Self {
            key_prefix: "rate_limit".to_string(),
            retry_after: Duration::seconds(30),
        }
    }
}

pub struct RateLimiter {
    backend: Option<Arc<dyn KeyValueBackend>>,
    tracker: AvailabilityTracker,
    local: Arc<LocalRateStore>,
    clock: Arc<dyn Clock>,
    key_prefix: String,
}

impl RateLimiter {
    /// `backend` 가 `None` 이면 항상 로컬 전략을 사용합니다.
    pub fn new(
        backend: Option<Arc<dyn KeyValueBackend>>,
        local: Arc<LocalRateStore>,
        clock: Arc<dyn Clock>,
        settings: RateLimiterSettings,
    ) -> Self {
        Self {
            backend,
            tracker: AvailabilityTracker::new("rate_limit", settings.retry_after, clock.clone()),
            local,
            clock,
            key_prefix: settings.key_prefix,
        }
    }

    pub fn local_store(&self) -> &Arc<LocalRateStore> {
        &self.local
    }

    pub fn distributed_available(&self) -> bool {
        self.backend.is_some() && self.tracker.is_available()
    }

    fn key(&self, client_id: &str, endpoint: &str) -> String {
        format!("{}:{}:{}", self.key_prefix, endpoint, client_id)
    }

    /// 한도 표기 문자열로 판단합니다. 파싱할 수 없으면 통과시킵니다.
    pub async fn check(&self, limit_spec: &str, client_id: &str, endpoint: &str) -> RateCheck {
        match LimitSpec::parse(limit_spec) {
            Ok(limit) => self.check_limit(&limit, client_id, endpoint).await,
            Err(e) => {
                log::warn!("⚠️ 레이트 리밋 설정 오류로 요청 통과 - 엔드포인트: {}, 에러: {}", endpoint, e);
                RateCheck {
                    decision: RateDecision::Admit { remaining: u64::MAX },
                    strategy: RateStrategy::FailOpen,
                    limit: None,
                }
            }
        }
    }

    pub async fn check_limit(&self, limit: &LimitSpec, client_id: &str, endpoint: &str) -> RateCheck {
        let key = self.key(client_id, endpoint);

        if let Some(backend) = &self.backend {
            if self.tracker.should_attempt() {
                match backend.incr_window(&key, limit.window_secs).await {
                    Ok(window) => {
                        self.tracker.record_success();
                        let decision = if window.count > limit.count {
                            RateDecision::Reject {
                                retry_after_secs: window.ttl_secs.max(1),
                            }
                        } else {
                            RateDecision::Admit {
                                remaining: limit.count - window.count,
                            }
                        };
                        return RateCheck {
                            decision,
                            strategy: RateStrategy::Distributed,
                            limit: Some(*limit),
                        };
                    }
                    Err(e) => {
                        self.tracker.record_failure(&e);
                    }
                }
            }
        }

        RateCheck {
            decision: self.local.check(&key, limit, self.clock.now()),
            strategy: RateStrategy::Local,
            limit: Some(*limit),
        }
    }
}
