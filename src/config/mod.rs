//! 애플리케이션 설정 모듈
//!
//! 환경 변수 기반 설정 접근자를 제공합니다.
//! 각 설정은 유닛 구조체의 연관 함수로 노출되며, 값이 없으면 기본값을 사용합니다.

pub mod auth_config;
pub mod cache_config;
pub mod data_config;

pub use auth_config::*;
pub use cache_config::*;
pub use data_config::*;
