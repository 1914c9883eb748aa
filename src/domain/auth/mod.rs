//! 인증 도메인 모델
//!
//! JWT 에서 추출한 사용자, 인증 모드와 역할 요구사항,
//! 그리고 메모이제이션이 요구하는 확인된 신원([`ResolvedIdentity`])을 정의합니다.

pub mod authenticated_user;
pub mod authentication_request;

pub use authenticated_user::{AuthenticatedUser, ResolvedIdentity};
pub use authentication_request::{AuthMode, RequiredRole};
