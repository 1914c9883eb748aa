//! 인메모리 키-값 백엔드
//!
//! Redis 와 같은 의미론(TTL 만료, 커서 기반 SCAN, 원자적 윈도우 카운터)을
//! 단일 프로세스 안에서 재현합니다. 테스트와 Redis 없는 로컬 개발에서 사용합니다.
//!
//! `set_failing(true)` 로 장애를 주입하면 모든 명령이 [`BackendError::Unavailable`]을 반환합니다.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::caching::backend::{BackendError, BackendResult, KeyValueBackend, ScanPage, WindowCount};
use crate::utils::clock::Clock;
use crate::utils::glob::glob_match;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
    /// 생성 순번. SCAN 커서는 이 값을 기준으로 진행하므로
    /// 순회 중 삭제가 일어나도 남은 키를 건너뛰지 않습니다.
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    next_seq: u64,
}

/// 인메모리 백엔드
pub struct MemoryBackend {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
    failing: AtomicBool,
}

impl MemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
            failing: AtomicBool::new(false),
        }
    }

    /// 장애를 주입하거나 해제합니다.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// 만료되지 않은 키 개수
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock()
            .entries
            .values()
            .filter(|e| is_live(e, now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self) -> BackendResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("memory backend failure injected".to_string()))
        } else {
            Ok(())
        }
    }

    fn purge_expired(inner: &mut Inner, now: DateTime<Utc>) {
        inner.entries.retain(|_, e| is_live(e, now));
    }

    fn insert(inner: &mut Inner, key: &str, value: String, expires_at: Option<DateTime<Utc>>) {
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.value = value;
                entry.expires_at = expires_at;
            }
            None => {
                inner.next_seq += 1;
                let seq = inner.next_seq;
                inner.entries.insert(key.to_string(), Entry { value, expires_at, seq });
            }
        }
    }
}

fn is_live(entry: &Entry, now: DateTime<Utc>) -> bool {
    entry.expires_at.is_none_or(|at| at > now)
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.check()?;
        let now = self.clock.now();
        let mut inner = self.lock();
        Self::purge_expired(&mut inner, now);
        Ok(inner.entries.get(key).map(|e| e.value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> BackendResult<()> {
        self.check()?;
        let expires_at = self.clock.now() + Duration::seconds(ttl_secs.max(1) as i64);
        let mut inner = self.lock();
        Self::insert(&mut inner, key, value.to_string(), Some(expires_at));
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> BackendResult<u64> {
        self.check()?;
        let now = self.clock.now();
        let mut inner = self.lock();
        Self::purge_expired(&mut inner, now);
        let removed = keys
            .iter()
            .filter(|key| inner.entries.remove(key.as_str()).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> BackendResult<ScanPage> {
        self.check()?;
        let now = self.clock.now();
        let mut inner = self.lock();
        Self::purge_expired(&mut inner, now);

        let mut candidates: Vec<(u64, &String)> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.seq > cursor)
            .map(|(k, e)| (e.seq, k))
            .collect();
        candidates.sort_by_key(|(seq, _)| *seq);

        let page: Vec<(u64, &String)> = candidates.iter().take(count.max(1)).cloned().collect();
        let exhausted = candidates.len() <= page.len();
        let next_cursor = match page.last() {
            Some((seq, _)) if !exhausted => *seq,
            _ => 0,
        };

        let keys = page
            .into_iter()
            .filter(|(_, key)| glob_match(pattern, key))
            .map(|(_, key)| key.clone())
            .collect();

        Ok(ScanPage { cursor: next_cursor, keys })
    }

    async fn exists(&self, key: &str) -> BackendResult<bool> {
        self.check()?;
        let now = self.clock.now();
        let inner = self.lock();
        Ok(inner.entries.get(key).is_some_and(|e| is_live(e, now)))
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> BackendResult<WindowCount> {
        self.check()?;
        let now = self.clock.now();
        let mut inner = self.lock();
        Self::purge_expired(&mut inner, now);

        let (count, expires_at) = match inner.entries.get(key) {
            Some(entry) => {
                let current: u64 = entry
                    .value
                    .parse()
                    .map_err(|_| BackendError::Malformed(format!("counter at {} is not an integer", key)))?;
                (current + 1, entry.expires_at)
            }
            None => (1, Some(now + Duration::seconds(window_secs.max(1) as i64))),
        };

        Self::insert(&mut inner, key, count.to_string(), expires_at);

        let ttl_secs = expires_at
            .map(|at| (at - now).num_seconds().max(0) as u64)
            .unwrap_or(window_secs);

        Ok(WindowCount { count, ttl_secs })
    }

    async fn ping(&self) -> BackendResult<()> {
        self.check()
    }

    async fn flush(&self) -> BackendResult<()> {
        self.check()?;
        self.lock().entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;

    fn backend() -> (Arc<ManualClock>, MemoryBackend) {
        let clock = Arc::new(ManualClock::new());
        let backend = MemoryBackend::new(clock.clone());
        (clock, backend)
    }

    #[actix_web::test]
    async fn test_set_ex_expires_after_ttl() {
        let (clock, backend) = backend();
        backend.set_ex("user:42", "{}", 60).await.unwrap();

        clock.advance(Duration::seconds(59));
        assert!(backend.get("user:42").await.unwrap().is_some());

        clock.advance(Duration::seconds(2));
        assert!(backend.get("user:42").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn test_scan_survives_deletion_between_pages() {
        let (_, backend) = backend();
        for i in 0..10 {
            backend.set_ex(&format!("post:{}", i), "x", 60).await.unwrap();
        }

        let mut cursor = 0;
        let mut deleted = 0;
        loop {
            let page = backend.scan(cursor, "post:*", 3).await.unwrap();
            deleted += backend.del(&page.keys).await.unwrap();
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }

        assert_eq!(deleted, 10);
        assert!(backend.is_empty());
    }

    #[actix_web::test]
    async fn test_incr_window_sets_expiry_only_on_creation() {
        let (clock, backend) = backend();

        let first = backend.incr_window("rl:a", 60).await.unwrap();
        assert_eq!(first, WindowCount { count: 1, ttl_secs: 60 });

        clock.advance(Duration::seconds(30));
        let second = backend.incr_window("rl:a", 60).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.ttl_secs, 30);

        clock.advance(Duration::seconds(31));
        let fresh = backend.incr_window("rl:a", 60).await.unwrap();
        assert_eq!(fresh.count, 1);
    }

    #[actix_web::test]
    async fn test_failure_injection() {
        let (_, backend) = backend();
        backend.set_failing(true);

        assert!(backend.ping().await.is_err());
        assert!(backend.get("k").await.is_err());

        backend.set_failing(false);
        assert!(backend.ping().await.is_ok());
    }
}
