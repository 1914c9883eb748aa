//! 세션 모듈
//!
//! - [`session`]: 요청 세션 핸들과 저장 레코드
//! - [`store`]: 공유 백엔드 → 문서 저장소 장애 조치 세션 저장소
//! - [`backup`]: 챌린지 상태 이중 기록

pub mod backup;
pub mod session;
pub mod store;

pub use backup::{ChallengeBackup, SessionBackup};
pub use session::{Session, SessionRecord};
pub use store::{
    DocumentSessionBackend, FailoverSessionStore, KeyValueSessionBackend, SessionBackend, SessionRoute,
    SessionSettings,
};
