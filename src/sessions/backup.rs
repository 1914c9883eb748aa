//! # 챌린지 상태 백업
//!
//! 다단계 흐름(챌린지 발급 → 응답 검증)의 짧은 수명 상태를
//! 공유 캐시와 내구성 저장소에 **둘 다** 기록합니다.
//! 두 단계 사이에 캐시가 재시작되어도 상태가 유지됩니다.
//!
//! - 저장: 캐시(`challenge:{session_id}`)와 문서 저장소(`session_backups`)에 각각 시도하며, 한쪽 실패는 무시합니다.
//!   캐시에는 `{data, updated_at}` 봉투로 기록합니다.
//! - 조회: 두 저장소를 모두 읽어 더 최근 것을 돌려줍니다. 저장소에 기록이 없으면 삭제(또는 만료)된 것으로 보고
//!   캐시 사본을 무시합니다. 캐시 사본만 쓰는 경우는 저장소 조회가 실패했을 때뿐입니다.
//!   캐시가 장애 중에 갱신/삭제를 놓쳐도 오래된 사본이 되살아나지 않습니다.
//! - 삭제: 양쪽 모두에서 지웁니다.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::caching::client::CacheClient;
use crate::db::document_store::{DocumentStore, StoredDocument};
use crate::utils::clock::Clock;

const BACKUP_COLLECTION: &str = "session_backups";
const CACHE_PREFIX: &str = "challenge";

/// 캐시에 저장되는 형태
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedBackup {
    data: Value,
    updated_at: DateTime<Utc>,
}

/// 조회된 백업
#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeBackup {
    pub session_id: String,
    pub payload: Value,
    pub updated_at: DateTime<Utc>,
    /// 캐시에서 읽은 경우 알 수 없음
    pub expires_at: Option<DateTime<Utc>>,
    pub from_durable_store: bool,
}

pub struct SessionBackup {
    cache: Arc<CacheClient>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

/// 문서 저장소의 시각 정밀도(밀리초)에 맞춰 비교합니다.
fn is_newer(cached: &CachedBackup, document: &StoredDocument) -> bool {
    cached.updated_at.timestamp_millis() > document.updated_at.timestamp_millis()
}

impl SessionBackup {
    pub fn new(cache: Arc<CacheClient>, store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { cache, store, clock }
    }

    fn cache_key(session_id: &str) -> String {
        format!("{}:{}", CACHE_PREFIX, session_id)
    }

    /// 두 저장소에 기록합니다. 어느 한쪽이라도 성공하면 `true` 입니다.
    pub async fn save(&self, session_id: &str, payload: &Value, ttl_secs: u64) -> bool {
        let now = self.clock.now();
        let envelope = CachedBackup {
            data: payload.clone(),
            updated_at: now,
        };
        let cached = self.cache.set(&Self::cache_key(session_id), &envelope, ttl_secs).await;

        let expires_at = now + Duration::seconds(ttl_secs as i64);
        let persisted = match self.store.upsert(BACKUP_COLLECTION, session_id, payload, Some(expires_at)).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("챌린지 백업 영구 저장 실패 - 세션: {}, 에러: {}", session_id, e);
                false
            }
        };

        if !cached && !persisted {
            log::error!("챌린지 백업 실패 (캐시, 저장소 모두) - 세션: {}", session_id);
        }
        cached || persisted
    }

    pub async fn save_as<T: Serialize>(&self, session_id: &str, payload: &T, ttl_secs: u64) -> bool {
        match serde_json::to_value(payload) {
            Ok(value) => self.save(session_id, &value, ttl_secs).await,
            Err(e) => {
                log::warn!("챌린지 백업 직렬화 실패 - 세션: {}, 에러: {}", session_id, e);
                false
            }
        }
    }

    /// 두 저장소 중 더 최근 백업을 조회합니다.
    pub async fn load_backup(&self, session_id: &str) -> Option<ChallengeBackup> {
        let key = Self::cache_key(session_id);
        let cached = self.cache.get::<CachedBackup>(&key).await;

        let now = self.clock.now();
        let document = match self.store.find_active(BACKUP_COLLECTION, session_id, now).await {
            Ok(document) => document,
            Err(e) => {
                log::warn!("챌린지 백업 저장소 조회 실패, 캐시 사본 사용 - 세션: {}, 에러: {}", session_id, e);
                return cached.map(|c| ChallengeBackup {
                    session_id: session_id.to_string(),
                    payload: c.data,
                    updated_at: c.updated_at,
                    expires_at: None,
                    from_durable_store: false,
                });
            }
        };

        let Some(document) = document.filter(|d| d.expires_at.is_some_and(|at| at > now)) else {
            if cached.is_some() {
                log::warn!("저장소에 없는 챌린지 백업의 캐시 사본 폐기 - 세션: {}", session_id);
                self.cache.delete(&key).await;
            }
            return None;
        };
        let expires_at = document.expires_at;

        match cached {
            Some(c) if is_newer(&c, &document) => Some(ChallengeBackup {
                session_id: session_id.to_string(),
                payload: c.data,
                updated_at: c.updated_at,
                expires_at,
                from_durable_store: false,
            }),
            Some(c) if c.data == document.data => Some(ChallengeBackup {
                session_id: session_id.to_string(),
                payload: document.data,
                updated_at: document.updated_at,
                expires_at,
                from_durable_store: false,
            }),
            stale => {
                let remaining = expires_at.map(|at| (at - now).num_seconds()).unwrap_or(0);
                if remaining > 0 {
                    let envelope = CachedBackup {
                        data: document.data.clone(),
                        updated_at: document.updated_at,
                    };
                    self.cache.set(&key, &envelope, remaining as u64).await;
                }
                if stale.is_some() {
                    log::warn!("오래된 챌린지 백업 캐시 사본을 저장소 기록으로 교체 - 세션: {}", session_id);
                } else {
                    log::info!("챌린지 상태를 내구성 저장소에서 복구 - 세션: {}", session_id);
                }

                Some(ChallengeBackup {
                    session_id: session_id.to_string(),
                    payload: document.data,
                    updated_at: document.updated_at,
                    expires_at,
                    from_durable_store: true,
                })
            }
        }
    }

    pub async fn load(&self, session_id: &str) -> Option<Value> {
        self.load_backup(session_id).await.map(|b| b.payload)
    }

    pub async fn load_as<T: DeserializeOwned>(&self, session_id: &str) -> Option<T> {
        let payload = self.load(session_id).await?;
        match serde_json::from_value(payload) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("챌린지 백업 형식 오류 - 세션: {}, 에러: {}", session_id, e);
                None
            }
        }
    }

    /// 양쪽에서 삭제합니다. 어느 한쪽에서라도 지워졌으면 `true` 입니다.
    pub async fn delete(&self, session_id: &str) -> bool {
        let from_cache = self.cache.delete(&Self::cache_key(session_id)).await;
        let from_store = match self.store.remove(BACKUP_COLLECTION, session_id).await {
            Ok(removed) => removed,
            Err(e) => {
                log::warn!("챌린지 백업 삭제 실패 - 세션: {}, 에러: {}", session_id, e);
                false
            }
        };
        from_cache || from_store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::caching::backend::KeyValueBackend;
    use crate::caching::client::CacheSettings;
    use crate::caching::memory::MemoryBackend;
    use crate::db::document_store::MemoryDocumentStore;
    use crate::utils::clock::ManualClock;

    struct Fixture {
        clock: Arc<ManualClock>,
        kv: Arc<MemoryBackend>,
        docs: Arc<MemoryDocumentStore>,
        backup: SessionBackup,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let kv = Arc::new(MemoryBackend::new(clock.clone()));
        let docs = Arc::new(MemoryDocumentStore::new(clock.clone()));
        let cache = Arc::new(CacheClient::new(kv.clone(), clock.clone(), CacheSettings::default()));
        let backup = SessionBackup::new(cache, docs.clone(), clock.clone());
        Fixture { clock, kv, docs, backup }
    }

    #[actix_web::test]
    async fn test_save_writes_both_backends() {
        let f = fixture();
        assert!(f.backup.save("s1", &json!({"step": 1}), 300).await);

        assert!(f.kv.get("challenge:s1").await.unwrap().is_some());
        assert!(f.docs.raw("session_backups", "s1").is_some());
    }

    #[actix_web::test]
    async fn test_load_survives_cache_restart() {
        let f = fixture();
        f.backup.save("s1", &json!({"step": 1}), 300).await;
        f.kv.flush().await.unwrap();

        let restored = f.backup.load_backup("s1").await.unwrap();
        assert_eq!(restored.payload, json!({"step": 1}));
        assert!(restored.from_durable_store);

        assert!(f.kv.get("challenge:s1").await.unwrap().is_some());
        let again = f.backup.load_backup("s1").await.unwrap();
        assert!(!again.from_durable_store);
    }

    #[actix_web::test]
    async fn test_expired_durable_record_is_absent() {
        let f = fixture();
        f.backup.save("s1", &json!({"step": 1}), 300).await;
        f.kv.flush().await.unwrap();

        f.clock.advance(Duration::seconds(301));
        assert_eq!(f.backup.load("s1").await, None);
    }

    #[actix_web::test]
    async fn test_save_succeeds_with_one_backend_down() {
        let f = fixture();
        f.docs.set_failing(true);

        assert!(f.backup.save("s1", &json!(1), 300).await);
        assert_eq!(f.backup.load("s1").await, Some(json!(1)));
    }

    #[actix_web::test]
    async fn test_delete_removes_from_both() {
        let f = fixture();
        f.backup.save("s1", &json!(1), 300).await;

        assert!(f.backup.delete("s1").await);
        assert_eq!(f.backup.load("s1").await, None);
        assert!(f.docs.raw("session_backups", "s1").is_none());
    }

    /// 공유 캐시를 잠깐 실패시켜 가용성 플래그를 내립니다. 이후 재시도 시간 동안 캐시 쓰기는 생략됩니다.
    async fn cache_blip(f: &Fixture, session_id: &str) {
        f.kv.set_failing(true);
        f.backup.load(session_id).await;
        f.kv.set_failing(false);
    }

    #[actix_web::test]
    async fn test_delete_missed_by_cache_is_not_revived() {
        let f = fixture();
        f.backup.save("s1", &json!({"step": 1}), 300).await;

        cache_blip(&f, "s1").await;
        assert!(f.backup.delete("s1").await);
        assert!(f.kv.get("challenge:s1").await.unwrap().is_some());

        f.clock.advance(Duration::seconds(31));
        assert_eq!(f.backup.load("s1").await, None);
        assert!(f.kv.get("challenge:s1").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_newer_durable_record_wins_over_stale_cache_copy() {
        let f = fixture();
        f.backup.save("s1", &json!({"attempts": 1}), 300).await;

        cache_blip(&f, "s1").await;
        f.clock.advance(Duration::seconds(1));
        assert!(f.backup.save("s1", &json!({"attempts": 2}), 300).await);

        f.clock.advance(Duration::seconds(31));
        let loaded = f.backup.load_backup("s1").await.unwrap();
        assert_eq!(loaded.payload, json!({"attempts": 2}));
        assert!(loaded.from_durable_store);

        // 캐시 사본도 교체되어 다음 조회는 캐시와 저장소가 일치합니다.
        let again = f.backup.load_backup("s1").await.unwrap();
        assert_eq!(again.payload, json!({"attempts": 2}));
        assert!(!again.from_durable_store);
    }

    #[actix_web::test]
    async fn test_newer_cache_copy_wins_when_durable_write_failed() {
        let f = fixture();
        f.backup.save("s1", &json!({"attempts": 1}), 300).await;

        f.docs.set_failing(true);
        f.clock.advance(Duration::seconds(1));
        assert!(f.backup.save("s1", &json!({"attempts": 2}), 300).await);
        f.docs.set_failing(false);

        assert_eq!(f.backup.load("s1").await, Some(json!({"attempts": 2})));
    }
}
