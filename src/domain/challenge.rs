//! 다단계 인증 챌린지
//!
//! 챌린지를 발급한 요청과 응답을 검증하는 요청 사이에 캐시가 재시작되어도
//! 상태가 유지되도록 [`SessionBackup`](crate::sessions::backup::SessionBackup)에 이중 기록됩니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengePurpose {
    EmailVerification,
    TwoFactor,
    SensitiveAction,
}

/// 백업에 저장되는 챌린지 상태
///
/// 코드는 bcrypt 해시로만 보관합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeState {
    pub challenge_id: String,
    pub user_id: String,
    pub purpose: ChallengePurpose,
    pub code_hash: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl ChallengeState {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn remaining_attempts(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IssueChallengeRequest {
    pub purpose: ChallengePurpose,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyChallengeRequest {
    /// 생략하면 세션에 기록된 챌린지를 사용합니다
    #[serde(default)]
    pub challenge_id: Option<String>,

    #[validate(length(equal = 6, message = "인증 코드는 6자리입니다"))]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueChallengeResponse {
    pub challenge_id: String,
    pub purpose: ChallengePurpose,
    pub expires_at: DateTime<Utc>,
    pub attempts_allowed: u32,
    /// 개발/테스트 환경에서만 포함되는 평문 코드
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyChallengeResponse {
    pub challenge_id: String,
    pub verified: bool,
    pub remaining_attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_state_expiry_and_attempts() {
        let now = Utc::now();
        let state = ChallengeState {
            challenge_id: "c1".to_string(),
            user_id: "42".to_string(),
            purpose: ChallengePurpose::TwoFactor,
            code_hash: String::new(),
            attempts: 4,
            max_attempts: 5,
            created_at: now,
            expires_at: now + Duration::seconds(300),
        };

        assert!(!state.is_expired(now));
        assert!(state.is_expired(now + Duration::seconds(300)));
        assert_eq!(state.remaining_attempts(), 1);
    }

    #[test]
    fn test_verify_request_requires_six_characters() {
        assert!(VerifyChallengeRequest { challenge_id: None, code: "12345".to_string() }.validate().is_err());
        assert!(VerifyChallengeRequest { challenge_id: None, code: "123456".to_string() }.validate().is_ok());
    }
}
