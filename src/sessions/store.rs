//! # 장애 조치 세션 저장소
//!
//! 공유 백엔드(Redis)를 1차 저장소로, 문서 저장소를 대체 저장소로 사용합니다.
//!
//! ## 백엔드 선택
//!
//! 연산마다 다음 순서로 백엔드를 고릅니다.
//!
//! 1. 1차 저장소가 살아 있다고 표시되어 있으면 PING 으로 실제 상태를 확인합니다.
//!    세션 정확성은 캐시보다 중요하므로 마지막 상태만 믿지 않습니다.
//! 2. PING 이나 실제 연산이 실패하면 생존 플래그를 내리고 대체 저장소를 사용합니다.
//! 3. 한 번 죽은 것으로 표시되면, [`FailoverSessionStore::reprobe`]가 성공할 때까지
//!    1차 저장소를 확인하지 않고 바로 대체 저장소를 사용합니다.
//!
//! ## 알려진 한계
//!
//! 선택이 세션 단위가 아니라 연산 단위이므로, 한 세션이 두 백엔드에 나뉘어 저장될 수 있고
//! 둘 사이를 동기화하지 않습니다. 1차 저장소가 죽기 직전에 쓴 값은 이후 대체 저장소에서
//! 읽는 요청에는 보이지 않을 수 있습니다 (best-effort).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use actix_web::cookie::time::Duration as CookieDuration;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use chrono::Duration;

use crate::caching::backend::{BackendError, BackendResult, KeyValueBackend};
use crate::config::SessionConfig;
use crate::db::document_store::DocumentStore;
use crate::sessions::session::{Session, SessionRecord};
use crate::utils::clock::Clock;

/// 세션 레코드 저장소
#[async_trait]
pub trait SessionBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, session_id: &str) -> BackendResult<Option<SessionRecord>>;

    async fn store(&self, record: &SessionRecord) -> BackendResult<()>;

    async fn destroy(&self, session_id: &str) -> BackendResult<()>;

    async fn ping(&self) -> BackendResult<()>;
}

/// 키-값 백엔드 위의 세션 저장소 (`{prefix}:{session_id}`, TTL = 남은 수명)
pub struct KeyValueSessionBackend {
    backend: Arc<dyn KeyValueBackend>,
    key_prefix: String,
    clock: Arc<dyn Clock>,
}

impl KeyValueSessionBackend {
    pub fn new(backend: Arc<dyn KeyValueBackend>, key_prefix: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            key_prefix: key_prefix.into(),
            clock,
        }
    }

    fn key(&self, session_id: &str) -> String {
        format!("{}:{}", self.key_prefix, session_id)
    }
}

#[async_trait]
impl SessionBackend for KeyValueSessionBackend {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn load(&self, session_id: &str) -> BackendResult<Option<SessionRecord>> {
        let Some(raw) = self.backend.get(&self.key(session_id)).await? else {
            return Ok(None);
        };
        let record: SessionRecord =
            serde_json::from_str(&raw).map_err(|e| BackendError::Malformed(format!("session {}: {}", session_id, e)))?;
        Ok(Some(record).filter(|r| !r.is_expired(self.clock.now())))
    }

    async fn store(&self, record: &SessionRecord) -> BackendResult<()> {
        let ttl = (record.expires_at - self.clock.now()).num_seconds().max(1) as u64;
        let raw = serde_json::to_string(record).map_err(|e| BackendError::Malformed(e.to_string()))?;
        self.backend.set_ex(&self.key(&record.session_id), &raw, ttl).await
    }

    async fn destroy(&self, session_id: &str) -> BackendResult<()> {
        self.backend.del(&[self.key(session_id)]).await.map(|_| ())
    }

    async fn ping(&self) -> BackendResult<()> {
        self.backend.ping().await
    }
}

/// 문서 저장소 위의 세션 저장소
pub struct DocumentSessionBackend {
    store: Arc<dyn DocumentStore>,
    collection: String,
    clock: Arc<dyn Clock>,
}

impl DocumentSessionBackend {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            collection: collection.into(),
            clock,
        }
    }
}

#[async_trait]
impl SessionBackend for DocumentSessionBackend {
    fn name(&self) -> &str {
        self.store.name()
    }

    async fn load(&self, session_id: &str) -> BackendResult<Option<SessionRecord>> {
        let now = self.clock.now();
        let Some(document) = self.store.find_active(&self.collection, session_id, now).await? else {
            return Ok(None);
        };
        let data = match document.data {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(BackendError::Malformed(format!(
                    "session {} payload is not an object: {}",
                    session_id, other
                )));
            }
        };

        Ok(Some(SessionRecord {
            session_id: session_id.to_string(),
            data,
            expires_at: document.expires_at.unwrap_or(now),
        })
        .filter(|r| !r.is_expired(now)))
    }

    async fn store(&self, record: &SessionRecord) -> BackendResult<()> {
        let data = serde_json::Value::Object(record.data.clone());
        self.store
            .upsert(&self.collection, &record.session_id, &data, Some(record.expires_at))
            .await
    }

    async fn destroy(&self, session_id: &str) -> BackendResult<()> {
        self.store.remove(&self.collection, session_id).await.map(|_| ())
    }

    async fn ping(&self) -> BackendResult<()> {
        self.store.ping().await
    }
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub cookie_name: String,
    pub lifetime: Duration,
    pub key_prefix: String,
    pub secure_cookie: bool,
}

impl SessionSettings {
    pub fn from_env() -> Self {
        Self {
            cookie_name: SessionConfig::cookie_name(),
            lifetime: Duration::seconds(SessionConfig::lifetime_seconds() as i64),
            key_prefix: SessionConfig::key_prefix(),
            secure_cookie: !crate::config::Environment::current().exposes_debug_secrets(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            lifetime: Duration::seconds(86_400),
            key_prefix: "session".to_string(),
            secure_cookie: false,
        }
    }
}

/// 어느 백엔드로 연산을 보냈는지
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRoute {
    Primary,
    Fallback,
}

pub struct FailoverSessionStore {
    primary: Arc<dyn SessionBackend>,
    fallback: Arc<dyn SessionBackend>,
    primary_alive: AtomicBool,
    settings: SessionSettings,
    clock: Arc<dyn Clock>,
}

impl FailoverSessionStore {
    pub fn new(
        primary: Arc<dyn SessionBackend>,
        fallback: Arc<dyn SessionBackend>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            primary,
            fallback,
            primary_alive: AtomicBool::new(true),
            settings,
            clock,
        }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn is_primary_alive(&self) -> bool {
        self.primary_alive.load(Ordering::Acquire)
    }

    fn mark_primary_dead(&self, reason: &BackendError) {
        if self.primary_alive.swap(false, Ordering::AcqRel) {
            log::error!(
                "❌ 세션 1차 저장소({}) 사용 불가, {}로 전환: {}",
                self.primary.name(),
                self.fallback.name(),
                reason
            );
        }
    }

    /// 1차 저장소를 다시 확인합니다. 성공하면 이후 연산은 1차 저장소로 돌아갑니다.
    pub async fn reprobe(&self) -> bool {
        match self.primary.ping().await {
            Ok(()) => {
                if !self.primary_alive.swap(true, Ordering::AcqRel) {
                    log::info!("✅ 세션 1차 저장소({}) 복구됨", self.primary.name());
                }
                true
            }
            Err(e) => {
                self.mark_primary_dead(&e);
                false
            }
        }
    }

    /// 이번 연산에 사용할 백엔드를 고릅니다.
    async fn route(&self) -> SessionRoute {
        if !self.is_primary_alive() {
            return SessionRoute::Fallback;
        }
        match self.primary.ping().await {
            Ok(()) => SessionRoute::Primary,
            Err(e) => {
                self.mark_primary_dead(&e);
                SessionRoute::Fallback
            }
        }
    }

    /// 세션 ID 로 레코드를 읽습니다. 어느 백엔드에서 읽었는지도 함께 반환합니다.
    pub async fn load(&self, session_id: &str) -> (Option<SessionRecord>, SessionRoute) {
        if self.route().await == SessionRoute::Primary {
            match self.primary.load(session_id).await {
                Ok(record) => return (record, SessionRoute::Primary),
                Err(BackendError::Malformed(reason)) => {
                    log::warn!("손상된 세션 레코드 무시 - 세션: {}, 원인: {}", session_id, reason);
                    return (None, SessionRoute::Primary);
                }
                Err(e) => self.mark_primary_dead(&e),
            }
        }

        match self.fallback.load(session_id).await {
            Ok(record) => (record, SessionRoute::Fallback),
            Err(e) => {
                log::error!("세션 대체 저장소 읽기 실패 - 세션: {}, 에러: {}", session_id, e);
                (None, SessionRoute::Fallback)
            }
        }
    }

    /// 레코드를 저장합니다. 두 백엔드 모두 실패하면 마지막 에러를 반환합니다.
    pub async fn store(&self, record: &SessionRecord) -> Result<SessionRoute, BackendError> {
        if self.route().await == SessionRoute::Primary {
            match self.primary.store(record).await {
                Ok(()) => return Ok(SessionRoute::Primary),
                // 직렬화 실패는 대체 저장소에서도 같으므로 전환하지 않습니다.
                Err(e @ BackendError::Malformed(_)) => return Err(e),
                Err(e) => self.mark_primary_dead(&e),
            }
        }
        self.fallback.store(record).await.map(|_| SessionRoute::Fallback)
    }

    async fn destroy(&self, session_id: &str) {
        if self.route().await == SessionRoute::Primary {
            if let Err(e) = self.primary.destroy(session_id).await {
                self.mark_primary_dead(&e);
            }
        }
        if let Err(e) = self.fallback.destroy(session_id).await {
            log::warn!("세션 대체 저장소 삭제 실패 - 세션: {}, 에러: {}", session_id, e);
        }
    }

    /// 요청 쿠키로 세션을 엽니다. 쿠키가 없거나 알 수 없는 ID 면 새 세션입니다.
    pub async fn open(&self, req: &HttpRequest) -> Session {
        let Some(cookie) = req.cookie(&self.settings.cookie_name) else {
            return Session::fresh();
        };

        match self.load(cookie.value()).await {
            (Some(record), route) => {
                log::debug!("세션 로드 - {:?}", route);
                Session::from_record(record)
            }
            (None, _) => Session::fresh(),
        }
    }

    /// 변경된 세션을 저장하고 응답에 쿠키를 기록합니다.
    ///
    /// 수정되지 않은 세션과 비어 있는 새 세션은 저장하지 않습니다.
    pub async fn save<B>(&self, session: &Session, response: &mut HttpResponse<B>) -> bool {
        if session.is_destroyed() {
            if !session.is_new() {
                self.destroy(&session.id()).await;
            }
            let mut removal = Cookie::build(self.settings.cookie_name.clone(), "")
                .path("/")
                .http_only(true)
                .finish();
            removal.make_removal();
            if let Err(e) = response.add_cookie(&removal) {
                log::warn!("세션 쿠키 제거 실패: {}", e);
            }
            return true;
        }

        if !session.is_modified() || (session.is_new() && session.is_empty()) {
            return true;
        }

        let record = session.to_record(self.clock.now() + self.settings.lifetime);
        match self.store(&record).await {
            Ok(route) => {
                log::debug!("세션 저장 - {:?}", route);
            }
            Err(e) => {
                log::error!("세션 저장 실패 (모든 백엔드) - 세션: {}, 에러: {}", record.session_id, e);
                return false;
            }
        }

        if session.is_new() {
            let cookie = Cookie::build(self.settings.cookie_name.clone(), record.session_id.clone())
                .path("/")
                .http_only(true)
                .secure(self.settings.secure_cookie)
                .same_site(SameSite::Lax)
                .max_age(CookieDuration::seconds(self.settings.lifetime.num_seconds()))
                .finish();
            if let Err(e) = response.add_cookie(&cookie) {
                log::warn!("세션 쿠키 설정 실패: {}", e);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;
    use serde_json::json;

    use crate::caching::memory::MemoryBackend;
    use crate::db::document_store::MemoryDocumentStore;
    use crate::utils::clock::ManualClock;

    struct Fixture {
        kv: Arc<MemoryBackend>,
        docs: Arc<MemoryDocumentStore>,
        store: FailoverSessionStore,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let kv = Arc::new(MemoryBackend::new(clock.clone()));
        let docs = Arc::new(MemoryDocumentStore::new(clock.clone()));
        let store = FailoverSessionStore::new(
            Arc::new(KeyValueSessionBackend::new(kv.clone(), "session", clock.clone())),
            Arc::new(DocumentSessionBackend::new(docs.clone(), "sessions", clock.clone())),
            clock,
            SessionSettings::default(),
        );
        Fixture { kv, docs, store }
    }

    fn record(id: &str) -> SessionRecord {
        let mut data = serde_json::Map::new();
        data.insert("user".to_string(), json!("42"));
        SessionRecord {
            session_id: id.to_string(),
            data,
            expires_at: chrono::Utc::now() + Duration::hours(1),
        }
    }

    #[actix_web::test]
    async fn test_primary_used_while_alive() {
        let f = fixture();
        assert_eq!(f.store.store(&record("s1")).await.unwrap(), SessionRoute::Primary);

        assert!(f.kv.get("session:s1").await.unwrap().is_some());
        assert!(f.docs.raw("sessions", "s1").is_none());
    }

    #[actix_web::test]
    async fn test_failover_flips_flag_and_uses_fallback() {
        let f = fixture();
        f.kv.set_failing(true);

        assert_eq!(f.store.store(&record("s1")).await.unwrap(), SessionRoute::Fallback);
        assert!(!f.store.is_primary_alive());
        assert!(f.docs.raw("sessions", "s1").is_some());

        let (loaded, route) = f.store.load("s1").await;
        assert_eq!(route, SessionRoute::Fallback);
        assert_eq!(loaded.map(|r| r.data["user"].clone()), Some(json!("42")));
    }

    #[actix_web::test]
    async fn test_dead_primary_is_skipped_until_reprobe() {
        let f = fixture();
        f.kv.set_failing(true);
        f.store.store(&record("s1")).await.unwrap();
        f.kv.set_failing(false);

        assert_eq!(f.store.store(&record("s2")).await.unwrap(), SessionRoute::Fallback);
        assert!(f.kv.is_empty());

        assert!(f.store.reprobe().await);
        assert_eq!(f.store.store(&record("s3")).await.unwrap(), SessionRoute::Primary);
    }

    #[actix_web::test]
    async fn test_open_and_save_sets_cookie_for_new_session() {
        let f = fixture();
        let req = TestRequest::default().to_http_request();

        let session = f.store.open(&req).await;
        assert!(session.is_new());
        session.insert("challenge_id", "c1").unwrap();

        let mut response = HttpResponse::Ok().finish();
        assert!(f.store.save(&session, &mut response).await);

        let cookie = response.cookies().find(|c| c.name() == "session").unwrap();
        assert_eq!(cookie.value(), session.id());

        let req = TestRequest::default()
            .cookie(Cookie::new("session", session.id()))
            .to_http_request();
        let reopened = f.store.open(&req).await;
        assert!(!reopened.is_new());
        assert_eq!(reopened.get::<String>("challenge_id").as_deref(), Some("c1"));
    }

    #[actix_web::test]
    async fn test_unknown_session_id_gets_fresh_session() {
        let f = fixture();
        let req = TestRequest::default()
            .cookie(Cookie::new("session", "forged"))
            .to_http_request();

        let session = f.store.open(&req).await;
        assert!(session.is_new());
        assert_ne!(session.id(), "forged");
    }

    #[actix_web::test]
    async fn test_both_backends_down_reports_failure() {
        let f = fixture();
        f.kv.set_failing(true);
        f.docs.set_failing(true);

        let session = Session::fresh();
        session.insert("n", 1).unwrap();
        let mut response = HttpResponse::Ok().finish();

        assert!(!f.store.save(&session, &mut response).await);
    }
}
