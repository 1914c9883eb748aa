//! 소셜/채팅 웹 플랫폼용 복원력 계층
//!
//! 공유 캐시(Redis)가 느리거나 죽어도 요청 처리가 멈추지 않도록 캐시, 레이트 리밋,
//! 세션 저장을 감싸는 계층입니다.
//!
//! # Features
//!
//! - **CacheClient**: 가용성 추적, 실패 시 캐시 미스로 처리
//! - **CacheInvalidator**: 엔터티 관계 테이블 기반 패턴 무효화
//! - **Memoized**: 신원과 인자로 키를 만드는 핸들러 응답 메모이제이션
//! - **RateLimiter**: 분산 고정 윈도우 + 프로세스 내 슬라이딩 로그 대체
//! - **FailoverSessionStore**: 공유 캐시 → 문서 저장소 세션 대체
//! - **SessionBackup**: 챌린지 상태 이중 기록
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   HTTP Routes   │ ← RateLimit → Session → Auth 미들웨어
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Handlers     │ ← 요청/응답 처리, 메모이제이션
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │    Services     │ ← 챌린지, 토큰, 상태 모니터
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Caching/Session │ ← 가용성 추적, 대체 경로
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Redis + MongoDB │ ← 저장소 (없으면 인메모리)
//! └─────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use resilience_backend::core::{AppState, StateSettings};
//! use resilience_backend::caching::MemoryBackend;
//! use resilience_backend::db::MemoryDocumentStore;
//! use resilience_backend::utils::SystemClock;
//!
//! let clock = Arc::new(SystemClock);
//! let state = AppState::new(
//!     Arc::new(MemoryBackend::new(clock.clone())),
//!     Arc::new(MemoryDocumentStore::new(clock.clone())),
//!     clock,
//!     StateSettings::from_env(),
//! );
//! ```

pub mod core;
pub mod config;
pub mod db;
pub mod caching;
pub mod domain;
pub mod rate_limit;
pub mod repositories;
pub mod services;
pub mod sessions;
pub mod utils;
pub mod routes;
pub mod handlers;
pub mod middlewares;
