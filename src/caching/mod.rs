//! 캐싱 계층 모듈
//!
//! 공유 키-값 백엔드(Redis) 위에 장애를 견디는 캐시 기능을 제공합니다.
//! 백엔드가 사라져도 호출자는 에러 대신 "캐시 미스" 로 동작합니다.
//!
//! # 구성
//!
//! - [`backend`]: 키-값 백엔드 추상화와 에러 타입
//! - [`redis`] / [`memory`]: 운영용 Redis 구현, 테스트/개발용 인메모리 구현
//! - [`availability`]: 백엔드 가용성 플래그와 재시도 간격
//! - [`client`]: JSON 직렬화 캐시 클라이언트
//! - [`invalidator`]: 엔티티 관계 기반 무효화
//! - [`memoize`]: 핸들러 결과 메모이제이션
//!
//! # 사용 예제
//!
//! ```rust,ignore
//! let cache = CacheClient::new(backend, clock, CacheSettings::from_env());
//!
//! cache.set("user:profile:7", &profile, 300).await;
//! let cached: Option<Profile> = cache.get("user:profile:7").await;
//! cache.delete_pattern("friends:user:7*").await;
//! ```
//!
//! # 환경 설정
//!
//! ```bash
//! REDIS_URL=redis://localhost:6379  # 없으면 인메모리 백엔드
//! ```

pub mod availability;
pub mod backend;
pub mod client;
pub mod invalidator;
pub mod memoize;
pub mod memory;
pub mod redis;

pub use availability::AvailabilityTracker;
pub use backend::{BackendError, BackendResult, KeyValueBackend};
pub use client::{CacheClient, CacheMiss, CacheSettings, CacheStatsSnapshot};
pub use invalidator::{CacheInvalidator, InvalidationContext, RelationshipRule, RelationshipTable};
pub use memoize::{CallArgs, HandlerOutput, KeyFn, KeyInput, Memoized, ResponseShape};
pub use memory::MemoryBackend;
pub use redis::RedisBackend;
