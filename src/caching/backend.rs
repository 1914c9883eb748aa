//! 공유 키-값 백엔드 추상화
//!
//! 캐시 클라이언트, 레이트 리미터, 세션 저장소가 공통으로 사용하는
//! 네트워크 키-값 저장소의 최소 명령 집합입니다.
//! 운영 환경에서는 [`RedisBackend`](super::redis::RedisBackend),
//! 테스트와 로컬 개발에서는 [`MemoryBackend`](super::memory::MemoryBackend)가 구현합니다.
//!
//! 모든 메서드는 실패를 [`BackendError`]로 돌려주며, 타임아웃도 실패로 취급합니다.
//! 실패를 "캐시 미스"나 "대체 경로"로 바꾸는 것은 호출하는 컴포넌트의 책임입니다.

use async_trait::async_trait;
use thiserror::Error;

/// 공유 백엔드 / 내구성 저장소 호출 실패
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("backend call timed out after {0}ms")]
    Timeout(u64),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("malformed stored value: {0}")]
    Malformed(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// 한 번의 `SCAN` 호출 결과
#[derive(Debug, Clone, Default)]
pub struct ScanPage {
    /// 다음 호출에 넘길 커서. `0`이면 순회가 끝났습니다.
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// 고정 윈도우 카운터 증가 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// 증가 후 카운터 값
    pub count: u64,
    /// 키의 남은 수명 (초)
    pub ttl_secs: u64,
}

/// 공유 키-값 백엔드 명령 집합
///
/// GET / SETEX / DEL / SCAN / EXISTS / PING / FLUSHDB 와
/// 레이트 리밋용 원자적 INCR+EXPIRE 를 제공합니다.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    /// 백엔드 이름 (로그용)
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> BackendResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> BackendResult<()>;

    /// 키들을 삭제하고 실제로 삭제된 개수를 반환합니다.
    async fn del(&self, keys: &[String]) -> BackendResult<u64>;

    /// 커서 기반으로 패턴과 일치하는 키를 한 페이지 가져옵니다.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> BackendResult<ScanPage>;

    async fn exists(&self, key: &str) -> BackendResult<bool>;

    /// 카운터를 원자적으로 증가시키고, 키를 새로 만든 경우에만 만료를 설정합니다.
    ///
    /// 읽기-후-쓰기가 아니므로 동시에 들어온 요청이 같은 값을 읽는 일이 없습니다.
    async fn incr_window(&self, key: &str, window_secs: u64) -> BackendResult<WindowCount>;

    async fn ping(&self) -> BackendResult<()>;

    async fn flush(&self) -> BackendResult<()>;
}
