//! 비즈니스 로직을 담당하는 서비스 계층 모듈
//!
//! 서비스는 [`AppState`](crate::core::state::AppState) 가 생성해서 보관하며,
//! 핸들러와 미들웨어는 `web::Data<AppState>` 로 접근합니다.
//!
//! # Modules
//!
//! - [`auth`] - JWT 토큰 검증/발급
//! - [`challenges`] - 세션 백업 위의 2단계 인증 챌린지
//! - [`monitoring`] - 백엔드 가용성 주기 점검

pub mod auth;
pub mod challenges;
pub mod monitoring;
