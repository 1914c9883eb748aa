//! 레이트 리밋 모듈
//!
//! 한도 표기 파싱([`spec`])과 분산/로컬 이중 전략 리미터([`limiter`])를 제공합니다.

pub mod limiter;
pub mod spec;

pub use limiter::{LocalRateStore, RateCheck, RateDecision, RateLimiter, RateLimiterSettings, RateStrategy};
pub use spec::{LimitSpec, LimitSpecError};
