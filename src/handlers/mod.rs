//! # HTTP Request Handlers Module
//!
//! HTTP 요청을 처리하는 핸들러 함수들입니다.
//! 상태는 모두 `web::Data<AppState>` 로 주입받고, 실패는 [`AppError`](crate::core::AppError) 로 반환합니다.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//!   Middlewares - 레이트 리밋 → 세션 → 인증
//! ├─────────────────────────────────────────────┤
//!   Handlers (이 모듈) - HTTP 엔드포인트 처리         ← Web Layer
//! ├─────────────────────────────────────────────┤
//!   Services / Caching - 메모이제이션, 무효화, 챌린지  ← Service Layer
//! ├─────────────────────────────────────────────┤
//!   Repositories / DocumentStore                 ← Repository Layer
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## 모듈 구성
//!
//! - **`profile`**: 내 프로필 조회(메모이제이션) / 수정(무효화)
//! - **`challenges`**: 인증 챌린지 발급 / 검증 / 취소
//! - **`cache_admin`**: 관리자 캐시 재확인, 패턴 무효화, 전체 비우기
//! - **`health`**: 백엔드 상태를 포함한 헬스체크

pub mod cache_admin;
pub mod challenges;
pub mod health;
pub mod profile;
