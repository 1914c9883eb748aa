//! # Application Error Handling System
//!
//! HTTP 경계에서 사용하는 통합 에러 타입입니다.
//!
//! ## 에러 분류
//!
//! 복원력 계층의 에러는 네 가지로 나뉩니다.
//!
//! | 분류 | 예시 | 처리 |
//! |------|------|------|
//! | 백엔드 사용 불가 | Redis/MongoDB 연결 끊김, 타임아웃 | 컴포넌트 내부에서 대체 경로로 복구 |
//! | 직렬화 실패 | JSON으로 표현 불가능한 값 | 캐싱만 건너뛰고 원래 결과 반환 |
//! | 설정 오류 | 잘못된 limit 스펙, 템플릿 필드 누락 | 로그 후 fail-open / 건너뜀 |
//! | 요청 한도 초과 | 레이트 리밋 거부 | [`AppError::TooManyRequests`] 로 호출자에게 전달 |
//!
//! 앞의 세 가지는 컴포넌트 경계를 넘지 않으며, 마지막 하나만 의도적으로 노출됩니다.
//! 따라서 이 열거형에는 캐시 관련 변형이 없습니다.
//!
//! ## 사용 패턴
//!
//! ```rust,ignore
//! use crate::core::errors::AppError;
//!
//! #[get("/profile")]
//! async fn get_profile(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
//!     let profile = state.profiles.find(&user_id).await?
//!         .ok_or_else(|| AppError::NotFound("프로필이 없습니다".to_string()))?;
//!     Ok(HttpResponse::Ok().json(profile))
//! }
//! ```

use actix_web::http::header;
use thiserror::Error;

/// 애플리케이션 전역 에러 타입
///
/// 자동으로 HTTP 응답으로 변환되어 클라이언트에게 전달됩니다.
#[derive(Error, Debug)]
pub enum AppError {
    /// 데이터베이스 관련 에러 (500 Internal Server Error)
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// 입력값 검증 에러 (400 Bad Request)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 리소스 찾을 수 없음 에러 (404 Not Found)
    #[error("Not found: {0}")]
    NotFound(String),

    /// 충돌/중복 에러 (409 Conflict)
    #[error("Conflict error: {0}")]
    ConflictError(String),

    /// 인증 실패 에러 (401 Unauthorized)
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// 권한 부족 에러 (403 Forbidden)
    #[error("Authorization error: {0}")]
    AuthorizationError(String),

    /// 요청 한도 초과 (429 Too Many Requests)
    #[error("Too many requests: retry after {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },

    /// 내부 서버 에러 (500 Internal Server Error)
    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;

        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ConflictError(_) => StatusCode::CONFLICT,
            AppError::AuthenticationError(_) => StatusCode::UNAUTHORIZED,
            AppError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// HTTP 에러 응답을 생성합니다.
    ///
    /// 429 응답에는 `Retry-After` 헤더가 함께 포함됩니다.
    fn error_response(&self) -> actix_web::HttpResponse {
        let mut builder = actix_web::HttpResponse::build(self.status_code());

        if let AppError::TooManyRequests { retry_after_secs } = self {
            builder.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
            return builder.json(serde_json::json!({
                "error": "too_many_requests",
                "message": self.to_string(),
                "retry_after": retry_after_secs,
            }));
        }

        builder.json(serde_json::json!({
            "error": self.to_string()
        }))
    }
}

/// 편의성을 위한 Result 타입 별칭
pub type AppResult<T> = Result<T, AppError>;

/// 외부 라이브러리 에러를 AppError로 변환하는 확장 trait
pub trait ErrorContext<T> {
    /// 컨텍스트 정보와 함께 에러를 변환합니다.
    fn context(self, msg: &str) -> AppResult<T>;

    /// 클로저를 사용하여 지연 평가된 컨텍스트를 제공합니다.
    fn with_context<F>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, msg: &str) -> AppResult<T> {
        self.map_err(|e| AppError::InternalError(format!("{}: {}", msg, e)))
    }

    fn with_context<F>(self, f: F) -> AppResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::InternalError(format!("{}: {}", f(), e)))
    }
}
