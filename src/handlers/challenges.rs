//! # Challenge HTTP Handlers
//!
//! | 메서드 | 경로 | 설명 | 상태 코드 |
//! |--------|------|------|-----------|
//! | `POST` | `/api/v1/challenges` | 챌린지 발급 | 201 Created |
//! | `POST` | `/api/v1/challenges/verify` | 코드 검증 | 200 OK |
//! | `DELETE` | `/api/v1/challenges` | 챌린지 취소 | 204 No Content |
//!
//! 발급된 챌린지 ID 는 세션에도 기록되므로, 같은 세션에서는 검증/취소 요청에 ID 를 생략할 수 있습니다.
//! 캐시 재시작으로 세션이 사라진 경우에는 발급 응답의 `challenge_id` 를 함께 보냅니다.

use actix_web::{HttpResponse, delete, post, web};
use serde::Deserialize;
use validator::Validate;

use crate::core::errors::{AppError, ErrorContext};
use crate::core::state::AppState;
use crate::domain::auth::AuthenticatedUser;
use crate::domain::challenge::{
    IssueChallengeRequest, IssueChallengeResponse, VerifyChallengeRequest, VerifyChallengeResponse,
};
use crate::services::challenges::VerifyOutcome;
use crate::sessions::session::Session;

const SESSION_CHALLENGE_KEY: &str = "challenge_id";

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    pub challenge_id: Option<String>,
}

fn resolve_challenge_id(explicit: Option<String>, session: &Session) -> Result<String, AppError> {
    explicit
        .filter(|id| !id.is_empty())
        .or_else(|| session.get::<String>(SESSION_CHALLENGE_KEY))
        .ok_or_else(|| AppError::NotFound("진행 중인 챌린지가 없습니다".to_string()))
}

/// 챌린지 발급
///
/// ```bash
/// curl -X POST http://localhost:8080/api/v1/challenges \
///   -H "Authorization: Bearer ..." -H "Content-Type: application/json" \
///   -d '{"purpose":"two_factor"}'
/// ```
#[post("")]
pub async fn issue_challenge(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    session: Session,
    payload: web::Json<IssueChallengeRequest>,
) -> Result<HttpResponse, AppError> {
    payload.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;

    let issued = state.challenges.issue(&user.user_id, payload.purpose).await?;
    session
        .insert(SESSION_CHALLENGE_KEY, &issued.state.challenge_id)
        .context("세션에 챌린지 기록 실패")?;

    let response = IssueChallengeResponse {
        challenge_id: issued.state.challenge_id.clone(),
        purpose: issued.state.purpose,
        expires_at: issued.state.expires_at,
        attempts_allowed: issued.state.max_attempts,
        debug_code: state.environment.exposes_debug_secrets().then_some(issued.code),
    };
    Ok(HttpResponse::Created().json(response))
}

/// 코드 검증
#[post("/verify")]
pub async fn verify_challenge(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    session: Session,
    payload: web::Json<VerifyChallengeRequest>,
) -> Result<HttpResponse, AppError> {
    payload.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;
    let VerifyChallengeRequest { challenge_id, code } = payload.into_inner();
    let challenge_id = resolve_challenge_id(challenge_id, &session)?;

    let outcome = state.challenges.verify(&user.user_id, &challenge_id, &code).await?;
    let (verified, remaining_attempts) = match outcome {
        VerifyOutcome::Verified => (true, 0),
        VerifyOutcome::Rejected { remaining_attempts } => (false, remaining_attempts),
        VerifyOutcome::Exhausted => (false, 0),
    };
    if !matches!(outcome, VerifyOutcome::Rejected { .. }) {
        session.remove(SESSION_CHALLENGE_KEY);
    }

    Ok(HttpResponse::Ok().json(VerifyChallengeResponse {
        challenge_id,
        verified,
        remaining_attempts,
    }))
}

/// 챌린지 취소
#[delete("")]
pub async fn cancel_challenge(
    state: web::Data<AppState>,
    user: AuthenticatedUser,
    session: Session,
    query: web::Query<CancelQuery>,
) -> Result<HttpResponse, AppError> {
    let challenge_id = resolve_challenge_id(query.into_inner().challenge_id, &session)?;

    if !state.challenges.cancel(&user.user_id, &challenge_id).await {
        return Err(AppError::NotFound("챌린지가 없거나 만료되었습니다".to_string()));
    }
    session.remove(SESSION_CHALLENGE_KEY);
    Ok(HttpResponse::NoContent().finish())
}
