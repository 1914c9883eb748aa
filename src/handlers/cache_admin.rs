//! # Cache Admin HTTP Handlers
//!
//! 관리자 전용 캐시 운영 엔드포인트입니다.
//!
//! | 메서드 | 경로 | 설명 |
//! |--------|------|------|
//! | `POST` | `/api/v1/cache/health` | 공유 캐시 재확인 (PING) |
//! | `DELETE` | `/api/v1/cache/patterns?pattern=...` | 패턴 무효화 |
//! | `DELETE` | `/api/v1/cache` | 전체 비우기 |

use actix_web::{HttpResponse, delete, post, web};
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::AppError;
use crate::core::state::AppState;
use crate::domain::auth::AuthenticatedUser;

#[derive(Debug, Deserialize)]
pub struct PatternQuery {
    pub pattern: String,
}

#[post("/health")]
pub async fn probe_cache(state: web::Data<AppState>) -> HttpResponse {
    let available = state.cache.health_check().await;
    HttpResponse::Ok().json(json!({
        "available": available,
        "stats": state.cache.stats(),
    }))
}

/// ```bash
/// curl -X DELETE "http://localhost:8080/api/v1/cache/patterns?pattern=friends:user:7*" \
///   -H "Authorization: Bearer ..."
/// ```
#[delete("/patterns")]
pub async fn invalidate_pattern(
    state: web::Data<AppState>,
    admin: AuthenticatedUser,
    query: web::Query<PatternQuery>,
) -> Result<HttpResponse, AppError> {
    let pattern = query.into_inner().pattern;
    if pattern.trim().is_empty() || pattern.trim() == "*" {
        return Err(AppError::ValidationError(
            "pattern 이 비어 있거나 전체 삭제입니다. 전체 삭제는 DELETE /api/v1/cache 를 사용하세요".to_string(),
        ));
    }

    let deleted = state.invalidator.invalidate_pattern(&pattern).await;
    log::info!("🧹 관리자 패턴 무효화 - 관리자: {}, 패턴: {}, 삭제: {}", admin.user_id, pattern, deleted);

    Ok(HttpResponse::Ok().json(json!({
        "pattern": pattern,
        "deleted": deleted,
    })))
}

#[delete("")]
pub async fn flush_cache(state: web::Data<AppState>, admin: AuthenticatedUser) -> HttpResponse {
    let flushed = state.cache.clear().await;
    log::warn!("🧹 관리자 캐시 전체 비우기 - 관리자: {}, 성공: {}", admin.user_id, flushed);
    HttpResponse::Ok().json(json!({ "flushed": flushed }))
}
