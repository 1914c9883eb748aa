//! # 백엔드 상태 모니터
//!
//! 주기적으로 공유 캐시와 세션 주 백엔드에 PING 을 보내 가용성 플래그를 갱신합니다.
//! 캐시 클라이언트는 마지막 작업 결과만 믿기 때문에, 트래픽이 없는 동안에도
//! 복구를 알아차리려면 이 재확인이 필요합니다.
//!
//! 같은 주기로 로컬 레이트 리밋 저장소에서 오래 쓰지 않은 키를 정리합니다.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

use crate::caching::client::CacheClient;
use crate::rate_limit::limiter::RateLimiter;
use crate::sessions::store::FailoverSessionStore;
use crate::utils::clock::Clock;

/// 한 번의 점검 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub cache_available: bool,
    pub session_primary_alive: bool,
    pub pruned_rate_keys: usize,
}

pub struct HealthMonitor {
    cache: Arc<CacheClient>,
    sessions: Arc<FailoverSessionStore>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    /// 이 시간 동안 요청이 없던 로컬 레이트 리밋 키를 버립니다
    rate_key_idle: chrono::Duration,
}

impl HealthMonitor {
    pub fn new(
        cache: Arc<CacheClient>,
        sessions: Arc<FailoverSessionStore>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            sessions,
            limiter,
            clock,
            rate_key_idle: chrono::Duration::hours(1),
        }
    }

    pub async fn probe_once(&self) -> ProbeReport {
        let cache_available = self.cache.health_check().await;
        let session_primary_alive = self.sessions.reprobe().await;
        let pruned_rate_keys = self.limiter.local_store().prune(self.clock.now(), self.rate_key_idle);

        log::debug!(
            "상태 점검 - 캐시: {}, 세션 주 백엔드: {}, 정리된 레이트 키: {}",
            cache_available,
            session_primary_alive,
            pruned_rate_keys
        );

        ProbeReport {
            cache_available,
            session_primary_alive,
            pruned_rate_keys,
        }
    }

    /// 종료 신호가 올 때까지 `period` 마다 점검합니다.
    pub async fn run(self, period: Duration, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!("🩺 백엔드 상태 모니터 시작 (주기: {}초)", period.as_secs());

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        log::info!("백엔드 상태 모니터 종료");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
            }
        }
    }
}
