//! # 내구성 문서 저장소
//!
//! 세션 대체 저장소와 챌린지 백업이 사용하는 문서 컬렉션 추상화입니다.
//! 문서는 ID 로 식별되며 `{data, updated_at, expires_at}` 필드를 가집니다.
//!
//! ## 만료 처리
//!
//! 만료는 조회 시점에 `expires_at > now` 를 **명시적으로** 비교해서 걸러냅니다.
//! MongoDB 의 TTL 인덱스는 주기적으로만 문서를 지우므로 정리용으로만 사용합니다.
//!
//! | 구현 | 용도 |
//! |------|------|
//! | [`MongoDocumentStore`] | 운영 |
//! | [`MemoryDocumentStore`] | 테스트, MongoDB 없는 로컬 개발 |

use std::collections::HashMap;
use std::future::IntoFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::IndexOptions;
use mongodb::{Collection, IndexModel};
use serde_json::Value;

use crate::caching::backend::{BackendError, BackendResult};
use crate::utils::clock::Clock;

/// 저장된 문서
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredDocument {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    /// 문서를 생성하거나 덮어씁니다.
    async fn upsert(&self, collection: &str, id: &str, data: &Value, expires_at: Option<DateTime<Utc>>) -> BackendResult<()>;

    /// 만료되지 않은 문서만 반환합니다.
    async fn find_active(&self, collection: &str, id: &str, now: DateTime<Utc>) -> BackendResult<Option<StoredDocument>>;

    /// 문서를 삭제하고 실제로 삭제되었는지 반환합니다.
    async fn remove(&self, collection: &str, id: &str) -> BackendResult<bool>;

    async fn ping(&self) -> BackendResult<()>;
}

fn to_bson_datetime(at: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(at.timestamp_millis())
}

fn from_bson_datetime(at: &bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or_default()
}

/// MongoDB 문서 저장소
pub struct MongoDocumentStore {
    database: mongodb::Database,
    clock: Arc<dyn Clock>,
    timeout: StdDuration,
}

impl MongoDocumentStore {
    pub fn new(database: mongodb::Database, clock: Arc<dyn Clock>, timeout: StdDuration) -> Self {
        Self { database, clock, timeout }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.database.collection::<Document>(name)
    }

    async fn with_timeout<T, F>(&self, fut: F) -> BackendResult<T>
    where
        F: IntoFuture<Output = Result<T, mongodb::error::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(BackendError::from),
            Err(_) => Err(BackendError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// `expires_at` TTL 인덱스를 생성합니다. 만료된 문서의 정리용입니다.
    pub async fn ensure_ttl_index(&self, collection: &str) -> BackendResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "expires_at": 1 })
            .options(
                IndexOptions::builder()
                    .expire_after(StdDuration::from_secs(0))
                    .name("expires_at_ttl".to_string())
                    .build(),
            )
            .build();

        self.with_timeout(self.collection(collection).create_index(index)).await?;
        log::info!("TTL 인덱스 확인 완료: {}", collection);
        Ok(())
    }

    fn parse_document(id: &str, document: Document) -> BackendResult<StoredDocument> {
        let data = match document.get("data") {
            Some(raw) => bson::from_bson::<Value>(raw.clone())
                .map_err(|e| BackendError::Malformed(format!("document {} data: {}", id, e)))?,
            None => Value::Null,
        };

        let updated_at = document
            .get_datetime("updated_at")
            .map(from_bson_datetime)
            .map_err(|e| BackendError::Malformed(format!("document {} updated_at: {}", id, e)))?;

        Ok(StoredDocument {
            id: id.to_string(),
            data,
            updated_at,
            expires_at: document.get_datetime("expires_at").ok().map(from_bson_datetime),
        })
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    fn name(&self) -> &str {
        "mongodb"
    }

    async fn upsert(&self, collection: &str, id: &str, data: &Value, expires_at: Option<DateTime<Utc>>) -> BackendResult<()> {
        let data = bson::to_bson(data).map_err(|e| BackendError::Malformed(e.to_string()))?;
        let expires_at = expires_at.map(to_bson_datetime).map(Bson::DateTime).unwrap_or(Bson::Null);
        let update = doc! {
            "$set": {
                "data": data,
                "updated_at": to_bson_datetime(self.clock.now()),
                "expires_at": expires_at,
            }
        };

        self.with_timeout(
            self.collection(collection)
                .update_one(doc! { "_id": id }, update)
                .upsert(true),
        )
        .await?;
        Ok(())
    }

    async fn find_active(&self, collection: &str, id: &str, now: DateTime<Utc>) -> BackendResult<Option<StoredDocument>> {
        let filter = doc! {
            "_id": id,
            "$or": [
                { "expires_at": Bson::Null },
                { "expires_at": { "$gt": to_bson_datetime(now) } },
            ],
        };

        let found = self.with_timeout(self.collection(collection).find_one(filter)).await?;
        match found {
            Some(document) => {
                let stored = Self::parse_document(id, document)?;
                Ok(Some(stored).filter(|d| d.is_active(now)))
            }
            None => Ok(None),
        }
    }

    async fn remove(&self, collection: &str, id: &str) -> BackendResult<bool> {
        let result = self
            .with_timeout(self.collection(collection).delete_one(doc! { "_id": id }))
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn ping(&self) -> BackendResult<()> {
        self.with_timeout(self.database.run_command(doc! { "ping": 1 })).await?;
        Ok(())
    }
}

/// 인메모리 문서 저장소
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<(String, String), StoredDocument>>,
    clock: Arc<dyn Clock>,
    failing: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            clock,
            failing: AtomicBool::new(false),
        }
    }

    /// 장애를 주입하거나 해제합니다.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 만료 여부와 관계없이 저장된 문서 (테스트 검증용)
    pub fn raw(&self, collection: &str, id: &str) -> Option<StoredDocument> {
        self.lock().get(&(collection.to_string(), id.to_string())).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), StoredDocument>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> BackendResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("memory document store failure injected".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, collection: &str, id: &str, data: &Value, expires_at: Option<DateTime<Utc>>) -> BackendResult<()> {
        self.check()?;
        let document = StoredDocument {
            id: id.to_string(),
            data: data.clone(),
            updated_at: self.clock.now(),
            expires_at,
        };
        self.lock().insert((collection.to_string(), id.to_string()), document);
        Ok(())
    }

    async fn find_active(&self, collection: &str, id: &str, now: DateTime<Utc>) -> BackendResult<Option<StoredDocument>> {
        self.check()?;
        let documents = self.lock();
        Ok(documents
            .get(&(collection.to_string(), id.to_string()))
            .filter(|d| d.is_active(now))
            .cloned())
    }

    async fn remove(&self, collection: &str, id: &str) -> BackendResult<bool> {
        self.check()?;
        Ok(self.lock().remove(&(collection.to_string(), id.to_string())).is_some())
    }

    async fn ping(&self) -> BackendResult<()> {
        self.check()
    }
}
