//! 헬스체크 엔드포인트
//!
//! 백엔드 일부가 사용 불가여도 서비스는 동작하므로 항상 200 을 반환하고,
//! `status` 로 `healthy` / `degraded` 를 구분합니다.

use actix_web::{HttpResponse, get, web};
use serde_json::json;

use crate::core::state::AppState;

/// ```bash
/// curl http://localhost:8080/health
/// ```
///
/// ```json
/// {
///   "status": "degraded",
///   "service": "resilience_backend",
///   "version": "0.1.0",
///   "timestamp": "2025-01-01T00:00:00Z",
///   "cache": { "available": false, "stats": { "hits": 10, "misses": 3, ... } },
///   "sessions": { "primary_alive": false },
///   "rate_limit": { "distributed": false, "local_keys": 4 }
/// }
/// ```
#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let cache_available = state.cache.is_available();
    let primary_alive = state.sessions.is_primary_alive();
    let status = if cache_available && primary_alive { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(json!({
        "status": status,
        "service": "resilience_backend",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": state.clock.now().to_rfc3339(),
        "cache": {
            "available": cache_available,
            "stats": state.cache.stats(),
        },
        "sessions": {
            "primary_alive": primary_alive,
        },
        "rate_limit": {
            "distributed": state.rate_limiter.distributed_available(),
            "local_keys": state.rate_limiter.local_store().tracked_keys(),
        },
    }))
}
