//! 공통 유틸리티 함수 모듈
//!
//! 애플리케이션 전체에서 사용되는 공통 유틸리티 함수들을 제공합니다.
//!
//! # Modules
//!
//! - [`clock`] - 주입 가능한 시간 소스 (운영/테스트)
//! - [`glob`] - Redis 스타일 glob 패턴 매칭
//! - [`display_terminal`] - 터미널 출력 포맷팅 함수들
//!
//! # Examples
//!
//! ```rust,ignore
//! use crate::utils::glob::glob_match;
//! use crate::utils::display_terminal::print_boxed_title;
//!
//! assert!(glob_match("friends:user:7*", "friends:user:7:list"));
//! print_boxed_title("System Initialized");
//! ```

pub mod clock;
pub mod glob;
pub mod display_terminal;

pub use clock::{Clock, ManualClock, SystemClock};
