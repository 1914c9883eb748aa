//! 미들웨어 모듈
//!
//! ActixWeb 애플리케이션의 요청 처리 파이프라인에서 사용되는 미들웨어들을 제공합니다.
//! Spring Boot의 Filter와 Interceptor와 유사한 역할을 수행하며,
//! 횡단 관심사(Cross-cutting concerns)를 처리합니다.
//!
//! # 제공 미들웨어
//!
//! ### 1. 레이트 리밋 (RateLimit)
//! - 접속 주소 + 경로 단위 요청 한도
//! - 공유 카운터, 장애 시 프로세스 내 슬라이딩 윈도우
//! - 한도 초과 시 429 + `Retry-After`
//!
//! ### 2. 세션 (SessionMiddleware)
//! - 쿠키로 세션을 열고 핸들러 후 저장
//! - 공유 백엔드 장애 시 문서 저장소로 전환
//!
//! ### 3. 인증 미들웨어 (AuthMiddleware)
//! - JWT 토큰 기반 인증 검증
//! - Bearer 토큰 추출 및 검증
//! - 사용자 정보와 확인된 신원을 request extension에 저장
//! - 선택적/강제 인증 모드 지원
//!
//! # 합성 순서
//!
//! actix 에서는 나중에 `wrap` 한 미들웨어가 바깥에서 실행됩니다.
//! 레이트 리밋 → 세션 → 인증 → 핸들러 순서가 되도록 역순으로 감쌉니다.
//!
//! # 사용 방법
//!
//! ## 글로벌 미들웨어 등록
//! ```rust,ignore
//! use actix_web::{App, HttpServer};
//! use crate::middlewares::auth_middleware::AuthMiddleware;
//!
//! HttpServer::new(|| {
//!     App::new()
//!         .app_data(state.clone())
//!         .wrap(AuthMiddleware::optional()) // 모든 라우트에 선택적 인증
//!         .service(/* 라우트들 */)
//! })
//! ```
//!
//! ## 특정 스코프에만 적용
//! ```rust,ignore
//! use actix_web::{web, App};
//!
//! App::new()
//!     .service(
//!         web::scope("/api/protected")
//!             .wrap(AuthMiddleware::required()) // 보호된 라우트에만 강제 인증
//!             .wrap(SessionMiddleware)
//!             .wrap(RateLimit::new("30/minute"))
//!             .route("/profile", web::get().to(get_profile))
//!     )
//!     .service(
//!         web::scope("/api/public")
//!             .route("/status", web::get().to(health_check))
//!     )
//! ```

pub mod auth_middleware;
mod auth_inner;
pub mod rate_limit;
pub mod session;

// 미들웨어 재export
pub use auth_middleware::AuthMiddleware;
pub use rate_limit::RateLimit;
pub use session::SessionMiddleware;
