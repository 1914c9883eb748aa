//! # Core Module
//!
//! 애플리케이션 전역에서 쓰는 에러 타입과 상태 구성을 제공합니다.
//!
//! ## 모듈 구성
//!
//! ### [`errors`] - 통합 에러 처리
//! - **AppError**: HTTP 경계의 에러 타입 (`ResponseError` 구현)
//! - **ErrorContext**: 외부 에러에 컨텍스트를 붙여 변환
//!
//! ### [`state`] - 컴포넌트 구성
//! - **AppState**: 캐시, 레이트 리미터, 세션, 서비스를 한 번 생성해 공유
//! - **StateSettings**: 환경 변수 또는 테스트 값으로 만든 설정 묶음
//!
//! ## 사용 패턴
//!
//! ```rust,ignore
//! let state = web::Data::new(AppState::new(shared, documents, clock, StateSettings::from_env()));
//!
//! HttpServer::new(move || App::new().app_data(state.clone()).configure(configure_all_routes))
//! ```

pub mod errors;
pub mod state;

pub use errors::*;
pub use state::{AppState, StateSettings};
