//! 인증 서비스 모듈
//!
//! 인증 미들웨어가 사용하는 JWT 검증/발급을 제공합니다.
//!
//! # Security
//!
//! - HMAC-SHA256 토큰 서명
//! - 토큰 만료 시간 검증
//!
//! # Examples
//!
//! ```rust,ignore
//! use crate::services::auth::TokenService;
//!
//! let tokens = TokenService::from_env();
//! let token = tokens.extract_bearer_token(header_value)?;
//! let user = tokens.authenticate(token)?;
//! ```

pub mod token_service;

pub use token_service::*;
