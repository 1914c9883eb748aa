//! 요청 세션
//!
//! [`Session`]은 요청 하나 동안 핸들러들이 공유하는 핸들입니다.
//! 세션 미들웨어가 요청 확장(extensions)에 넣어 두고, 핸들러는 추출자로 꺼내 씁니다.

use std::future::{Ready, ready};
use std::sync::{Arc, Mutex, MutexGuard};

use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 백엔드에 저장되는 세션 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub data: Map<String, Value>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug)]
struct SessionState {
    id: String,
    data: Map<String, Value>,
    is_new: bool,
    modified: bool,
    destroyed: bool,
}

/// 요청 세션 핸들
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl Session {
    pub(crate) fn fresh() -> Self {
        Self::from_state(SessionState {
            id: uuid::Uuid::new_v4().simple().to_string(),
            data: Map::new(),
            is_new: true,
            modified: false,
            destroyed: false,
        })
    }

    pub(crate) fn from_record(record: SessionRecord) -> Self {
        Self::from_state(SessionState {
            id: record.session_id,
            data: record.data,
            is_new: false,
            modified: false,
            destroyed: false,
        })
    }

    fn from_state(state: SessionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> String {
        self.lock().id.clone()
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let state = self.lock();
        state.data.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        let mut state = self.lock();
        state.data.insert(key.into(), value);
        state.modified = true;
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut state = self.lock();
        let removed = state.data.remove(key);
        if removed.is_some() {
            state.modified = true;
        }
        removed
    }

    /// 세션을 파기합니다. 저장 시 백엔드 레코드와 쿠키가 삭제됩니다.
    pub fn purge(&self) {
        let mut state = self.lock();
        state.data.clear();
        state.destroyed = true;
        state.modified = true;
    }

    pub fn is_new(&self) -> bool {
        self.lock().is_new
    }

    pub fn is_modified(&self) -> bool {
        self.lock().modified
    }

    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    pub fn to_record(&self, expires_at: DateTime<Utc>) -> SessionRecord {
        let state = self.lock();
        SessionRecord {
            session_id: state.id.clone(),
            data: state.data.clone(),
            expires_at,
        }
    }
}

impl FromRequest for Session {
    type Error = Error;
    type Future = Ready<actix_web::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<Session>() {
            Some(session) => ready(Ok(session.clone())),
            None => {
                log::error!("세션 미들웨어 없이 Session 요청됨: {}", req.path());
                ready(Err(actix_web::error::ErrorInternalServerError(
                    "session stage is not configured for this route",
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_fresh_session_tracks_modification() {
        let session = Session::fresh();
        assert!(session.is_new());
        assert!(!session.is_modified());

        session.insert("challenge_id", "c1").unwrap();
        assert!(session.is_modified());
        assert_eq!(session.get::<String>("challenge_id").as_deref(), Some("c1"));
    }

    #[test]
    fn test_clones_share_state() {
        let session = Session::fresh();
        let handle = session.clone();
        handle.insert("n", 1).unwrap();

        assert_eq!(session.get::<i32>("n"), Some(1));
    }

    #[test]
    fn test_record_round_trip_is_not_modified() {
        let session = Session::fresh();
        session.insert("n", 1).unwrap();
        let record = session.to_record(Utc::now() + Duration::hours(1));

        let loaded = Session::from_record(record);
        assert!(!loaded.is_new());
        assert!(!loaded.is_modified());
        assert_eq!(loaded.id(), session.id());
    }

    #[test]
    fn test_purge_marks_destroyed() {
        let session = Session::fresh();
        session.insert("n", 1).unwrap();
        session.purge();

        assert!(session.is_destroyed());
        assert!(session.is_empty());
    }
}
