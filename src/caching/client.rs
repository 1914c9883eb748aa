//! # 캐시 클라이언트
//!
//! 공유 키-값 백엔드 위에서 타입 안전한 get / set / delete / 패턴 삭제를 제공합니다.
//!
//! ## 실패 의미론
//!
//! 모든 메서드는 전함수(total)입니다. 백엔드 장애, 타임아웃, 역직렬화 실패는
//! 호출자에게 에러로 올라가지 않고 "캐시 미스" 또는 "no-op" 로 바뀝니다.
//! 캐시가 내려가도 호출자는 원본 데이터 소스로 내려가 올바른 결과를 돌려줄 수 있습니다.
//!
//! | 메서드 | 사용 불가 시 반환값 |
//! |--------|---------------------|
//! | `get` | `None` |
//! | `set` / `delete` / `exists` / `clear` | `false` |
//! | `delete_pattern` | 그때까지 삭제한 개수 |
//!
//! 미스의 원인은 [`CacheMiss`]로 구분되며, 원인별로 통계가 따로 집계됩니다.
//!
//! ## 사용 예제
//!
//! ```rust,ignore
//! let cache = CacheClient::new(backend, clock, CacheSettings::from_env());
//!
//! cache.set("user:42", &json!({"name": "a"}), 60).await;
//! let cached: Option<Value> = cache.get("user:42").await;
//! let removed = cache.delete_pattern("friends:user:7*").await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::caching::availability::AvailabilityTracker;
use crate::caching::backend::KeyValueBackend;
use crate::config::CacheConfig;
use crate::utils::clock::Clock;

/// 캐시 미스 원인
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMiss {
    /// 백엔드 사용 불가 (장애, 타임아웃, 가용성 추적기에 의해 건너뜀)
    Unavailable,
    /// 키 없음
    NotFound,
    /// 저장된 값을 요청한 타입으로 역직렬화할 수 없음
    Corrupt,
}

/// 캐시 클라이언트 설정
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// 실패 후 다시 시도하기까지 기다리는 시간
    pub retry_after: Duration,
    /// 패턴 삭제 시 SCAN 한 번에 요청할 키 개수
    pub scan_batch: usize,
}

impl CacheSettings {
    pub fn from_env() -> Self {
        Self {
            retry_after: Duration::seconds(CacheConfig::retry_after_seconds() as i64),
            scan_batch: 500,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            retry_after: Duration::seconds(30),
            scan_batch: 500,
        }
    }
}

#[derive(Debug, Default)]
struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    skipped_unavailable: AtomicU64,
    backend_errors: AtomicU64,
    deserialize_failures: AtomicU64,
    serialize_failures: AtomicU64,
}

/// 캐시 통계 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub skipped_unavailable: u64,
    pub backend_errors: u64,
    pub deserialize_failures: u64,
    pub serialize_failures: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// 가용성 추적 기능을 가진 캐시 클라이언트
pub struct CacheClient {
    backend: Arc<dyn KeyValueBackend>,
    tracker: AvailabilityTracker,
    stats: CacheStats,
    scan_batch: usize,
}

impl CacheClient {
    pub fn new(backend: Arc<dyn KeyValueBackend>, clock: Arc<dyn Clock>, settings: CacheSettings) -> Self {
        let label = format!("cache({})", backend.name());
        Self {
            backend,
            tracker: AvailabilityTracker::new(label, settings.retry_after, clock),
            stats: CacheStats::default(),
            scan_batch: settings.scan_batch.max(1),
        }
    }

    /// 마지막 연산 결과로 갱신된 가용성 플래그 (네트워크 왕복 없음)
    pub fn is_available(&self) -> bool {
        self.tracker.is_available()
    }

    /// PING 으로 백엔드를 다시 확인하고 가용성 플래그를 갱신합니다.
    pub async fn health_check(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => {
                self.tracker.record_success();
                true
            }
            Err(e) => {
                self.tracker.record_failure(&e);
                false
            }
        }
    }

    /// 키를 조회하고 미스 원인을 구분해서 돌려줍니다.
    pub async fn lookup<T: DeserializeOwned>(&self, key: &str) -> Result<T, CacheMiss> {
        if !self.tracker.should_attempt() {
            bump(&self.stats.skipped_unavailable);
            return Err(CacheMiss::Unavailable);
        }

        let raw = match self.backend.get(key).await {
            Ok(raw) => {
                self.tracker.record_success();
                raw
            }
            Err(e) => {
                bump(&self.stats.backend_errors);
                self.tracker.record_failure(&e);
                return Err(CacheMiss::Unavailable);
            }
        };

        let Some(raw) = raw else {
            bump(&self.stats.misses);
            log::debug!("캐시 미스: {}", key);
            return Err(CacheMiss::NotFound);
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                bump(&self.stats.hits);
                log::debug!("캐시 히트: {}", key);
                Ok(value)
            }
            Err(e) => {
                bump(&self.stats.deserialize_failures);
                log::warn!("캐시 값 역직렬화 실패 - 키: {}, 에러: {}", key, e);
                Err(CacheMiss::Corrupt)
            }
        }
    }

    /// 키를 조회합니다. 어떤 이유의 미스든 `None` 입니다.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key).await.ok()
    }

    /// 값을 TTL 과 함께 저장합니다.
    ///
    /// 직렬화에 실패하면 백엔드를 건드리지 않고 `false`를 반환합니다.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) -> bool {
        if !self.tracker.should_attempt() {
            bump(&self.stats.skipped_unavailable);
            return false;
        }

        let json = match to_cache_json(value) {
            Ok(json) => json,
            Err(e) => {
                bump(&self.stats.serialize_failures);
                log::warn!("캐시 값 직렬화 실패 - 키: {}, 에러: {}", key, e);
                return false;
            }
        };

        match self.backend.set_ex(key, &json, ttl_secs).await {
            Ok(()) => {
                self.tracker.record_success();
                true
            }
            Err(e) => {
                bump(&self.stats.backend_errors);
                self.tracker.record_failure(&e);
                false
            }
        }
    }

    /// 키를 삭제합니다. 실제로 삭제된 키가 있으면 `true` 입니다.
    pub async fn delete(&self, key: &str) -> bool {
        if !self.tracker.should_attempt() {
            bump(&self.stats.skipped_unavailable);
            return false;
        }

        match self.backend.del(&[key.to_string()]).await {
            Ok(removed) => {
                self.tracker.record_success();
                removed > 0
            }
            Err(e) => {
                bump(&self.stats.backend_errors);
                self.tracker.record_failure(&e);
                false
            }
        }
    }

    pub async fn exists(&self, key: &str) -> bool {
        if !self.tracker.should_attempt() {
            bump(&self.stats.skipped_unavailable);
            return false;
        }

        match self.backend.exists(key).await {
            Ok(found) => {
                self.tracker.record_success();
                found
            }
            Err(e) => {
                bump(&self.stats.backend_errors);
                self.tracker.record_failure(&e);
                false
            }
        }
    }

    /// 패턴과 일치하는 키를 커서 기반 SCAN 으로 찾아 배치 단위로 삭제합니다.
    ///
    /// 전체 키 목록을 한 번에 가져오지 않으므로 메모리 사용량이 배치 크기로 제한됩니다.
    /// 도중에 백엔드가 실패하면 그때까지 삭제한 개수를 반환합니다.
    pub async fn delete_pattern(&self, pattern: &str) -> u64 {
        if !self.tracker.should_attempt() {
            bump(&self.stats.skipped_unavailable);
            return 0;
        }

        let mut cursor = 0u64;
        let mut deleted = 0u64;

        loop {
            let page = match self.backend.scan(cursor, pattern, self.scan_batch).await {
                Ok(page) => page,
                Err(e) => {
                    bump(&self.stats.backend_errors);
                    self.tracker.record_failure(&e);
                    log::warn!("패턴 삭제 중단 - 패턴: {}, 삭제된 키: {}개", pattern, deleted);
                    return deleted;
                }
            };

            if !page.keys.is_empty() {
                match self.backend.del(&page.keys).await {
                    Ok(removed) => deleted += removed,
                    Err(e) => {
                        bump(&self.stats.backend_errors);
                        self.tracker.record_failure(&e);
                        log::warn!("패턴 삭제 중단 - 패턴: {}, 삭제된 키: {}개", pattern, deleted);
                        return deleted;
                    }
                }
            }

            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        self.tracker.record_success();
        log::debug!("패턴 삭제 완료 - 패턴: {}, 삭제된 키: {}개", pattern, deleted);
        deleted
    }

    /// 현재 데이터베이스의 모든 키를 삭제합니다 (FLUSHDB).
    pub async fn clear(&self) -> bool {
        match self.backend.flush().await {
            Ok(()) => {
                self.tracker.record_success();
                log::warn!("캐시 전체 삭제 수행됨");
                true
            }
            Err(e) => {
                bump(&self.stats.backend_errors);
                self.tracker.record_failure(&e);
                false
            }
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let read = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStatsSnapshot {
            hits: read(&self.stats.hits),
            misses: read(&self.stats.misses),
            skipped_unavailable: read(&self.stats.skipped_unavailable),
            backend_errors: read(&self.stats.backend_errors),
            deserialize_failures: read(&self.stats.deserialize_failures),
            serialize_failures: read(&self.stats.serialize_failures),
        }
    }
}

/// 캐시 저장용 JSON 직렬화
///
/// 타임스탬프(`chrono`)와 식별자(`uuid`, ObjectId)는 serde 구현에 의해 문자열로 기록됩니다.
/// 직렬화 자체가 불가능한 값(문자열이 아닌 맵 키 등)만 에러가 됩니다.
fn to_cache_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}
