//! 시간 소스 추상화
//!
//! 캐시 만료, 레이트 리밋 윈도우, 세션 만료 등 시간에 의존하는 모든 컴포넌트는
//! `Clock`을 주입받아 사용합니다. 운영 환경에서는 [`SystemClock`]을,
//! 테스트에서는 [`ManualClock`]으로 시간을 임의로 진행시킵니다.
//!
//! ```rust,ignore
//! let clock = Arc::new(ManualClock::new());
//! clock.advance(Duration::seconds(61));
//! ```

use std::sync::{Arc, Mutex};
use chrono::{DateTime, Duration, Utc};

/// 현재 시각을 제공하는 trait
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// 시스템 시계
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 수동으로 진행시키는 시계
///
/// 생성 시점의 실제 시각에서 시작하며, `advance`를 호출할 때만 움직입니다.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// 시계를 주어진 만큼 진행시킵니다.
    pub fn advance(&self, delta: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// 기본 시계 핸들
pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_only_moves_on_advance() {
        let clock = ManualClock::new();
        let start = clock.now();

        assert_eq!(clock.now(), start);

        clock.advance(Duration::seconds(61));
        assert_eq!(clock.now() - start, Duration::seconds(61));
    }
}
