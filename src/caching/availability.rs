//! 공유 백엔드 가용성 추적기
//!
//! 서킷 브레이커와 유사하게 동작합니다.
//!
//! - **Closed (가용)**: 모든 명령을 백엔드로 보냅니다.
//! - **Open (불가)**: 마지막 실패 후 `retry_after` 동안은 백엔드를 건드리지 않고 즉시 대체 경로로 갑니다.
//! - **Half-open**: `retry_after`가 지나면 실제 명령 하나를 시도하고, 그 결과로 상태를 다시 정합니다.
//!
//! `is_available()`은 마지막으로 관측한 상태만 읽으므로 O(1)이며 네트워크 왕복이 없습니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use chrono::Duration;

use crate::utils::clock::Clock;

pub struct AvailabilityTracker {
    /// 로그에 표시할 백엔드 이름
    label: String,
    available: AtomicBool,
    /// 마지막 실패 시각 (epoch millis)
    last_failure_ms: AtomicI64,
    retry_after: Duration,
    clock: Arc<dyn Clock>,
}

impl AvailabilityTracker {
    pub fn new(label: impl Into<String>, retry_after: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            label: label.into(),
            available: AtomicBool::new(true),
            last_failure_ms: AtomicI64::new(0),
            retry_after,
            clock,
        }
    }

    /// 마지막으로 관측한 가용 상태
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// 이번 호출을 백엔드로 보내도 되는지 판단합니다.
    pub fn should_attempt(&self) -> bool {
        if self.is_available() {
            return true;
        }
        let last_failure = self.last_failure_ms.load(Ordering::Acquire);
        let now = self.clock.now().timestamp_millis();
        now - last_failure >= self.retry_after.num_milliseconds()
    }

    pub fn record_success(&self) {
        if !self.available.swap(true, Ordering::AcqRel) {
            log::info!("✅ {} 백엔드 복구됨", self.label);
        }
    }

    pub fn record_failure(&self, reason: &dyn std::fmt::Display) {
        self.last_failure_ms
            .store(self.clock.now().timestamp_millis(), Ordering::Release);
        if self.available.swap(false, Ordering::AcqRel) {
            log::warn!("⚠️ {} 백엔드 사용 불가로 전환: {}", self.label, reason);
        } else {
            log::debug!("{} 백엔드 여전히 사용 불가: {}", self.label, reason);
        }
    }
}
