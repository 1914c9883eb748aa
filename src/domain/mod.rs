//! # Domain Layer Module
//!
//! 요청 처리에 쓰이는 도메인 타입을 정의합니다.
//!
//! ```text
//! domain/
//! ├── auth/       - 인증 사용자, 인증 모드, 확인된 신원
//! ├── token       - JWT 클레임
//! ├── profile     - 사용자 프로필 (메모이제이션 / 무효화 대상)
//! └── challenge   - 다단계 인증 챌린지 (세션 백업 대상)
//! ```

pub mod auth;
pub mod challenge;
pub mod profile;
pub mod token;
