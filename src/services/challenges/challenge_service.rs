//! # 인증 챌린지 서비스
//!
//! 6자리 코드를 발급하고 검증하는 2단계 흐름을 관리합니다.
//!
//! 1. **발급**: 코드를 만들어 bcrypt 해시만 [`ChallengeState`] 로 보관하고, [`SessionBackup`] 에 이중 기록합니다.
//! 2. **검증**: 백업에서 상태를 읽어 코드를 비교합니다. 성공하면 백업을 지우고,
//!    실패하면 시도 횟수를 올려 다시 기록하며, 한도에 도달하면 챌린지를 취소합니다.
//!
//! 백업 키는 챌린지 ID 입니다. 클라이언트가 발급 응답으로 받은 ID 를 검증 요청에 다시 보내므로
//! 두 단계 사이에 캐시(와 그 위의 세션)가 사라져도 흐름을 이어갈 수 있습니다.
//! 코드 전달(메일, SMS)은 이 서비스의 범위 밖입니다.

use std::sync::Arc;

use chrono::Duration;

use crate::config::ChallengeConfig;
use crate::core::errors::AppError;
use crate::domain::challenge::{ChallengePurpose, ChallengeState};
use crate::sessions::backup::SessionBackup;
use crate::utils::clock::Clock;

#[derive(Debug, Clone)]
pub struct ChallengeSettings {
    pub ttl_secs: u64,
    pub max_attempts: u32,
    pub hash_cost: u32,
}

impl ChallengeSettings {
    pub fn from_env() -> Self {
        Self {
            ttl_secs: ChallengeConfig::ttl_seconds(),
            max_attempts: ChallengeConfig::max_attempts(),
            hash_cost: ChallengeConfig::hash_cost(),
        }
    }
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_attempts: 5,
            hash_cost: 4,
        }
    }
}

/// 발급된 챌린지와 평문 코드
#[derive(Debug, Clone)]
pub struct IssuedChallenge {
    pub state: ChallengeState,
    pub code: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    Rejected { remaining_attempts: u32 },
    /// 시도 한도에 도달해 챌린지가 취소됨
    Exhausted,
}

pub struct ChallengeService {
    backup: Arc<SessionBackup>,
    clock: Arc<dyn Clock>,
    settings: ChallengeSettings,
}

impl ChallengeService {
    pub fn new(backup: Arc<SessionBackup>, clock: Arc<dyn Clock>, settings: ChallengeSettings) -> Self {
        Self { backup, clock, settings }
    }

    pub fn settings(&self) -> &ChallengeSettings {
        &self.settings
    }

    fn generate_code() -> String {
        format!("{:06}", uuid::Uuid::new_v4().as_u128() % 1_000_000)
    }

    /// 새 챌린지를 발급합니다.
    ///
    /// # Errors
    ///
    /// * `AppError::InternalError` - 해시 실패, 또는 캐시와 문서 저장소 모두에 기록하지 못함
    pub async fn issue(&self, user_id: &str, purpose: ChallengePurpose) -> Result<IssuedChallenge, AppError> {
        let code = Self::generate_code();
        let code_hash = bcrypt::hash(&code, self.settings.hash_cost)
            .map_err(|e| AppError::InternalError(format!("챌린지 코드 해시 실패: {}", e)))?;

        let now = self.clock.now();
        let state = ChallengeState {
            challenge_id: uuid::Uuid::new_v4().simple().to_string(),
            user_id: user_id.to_string(),
            purpose,
            code_hash,
            attempts: 0,
            max_attempts: self.settings.max_attempts,
            created_at: now,
            expires_at: now + Duration::seconds(self.settings.ttl_secs as i64),
        };

        if !self.backup.save_as(&state.challenge_id, &state, self.settings.ttl_secs).await {
            return Err(AppError::InternalError("챌린지 상태를 저장할 수 없습니다".to_string()));
        }

        log::info!("🔐 챌린지 발급 - 사용자: {}, 챌린지: {}, 목적: {:?}", user_id, state.challenge_id, purpose);
        Ok(IssuedChallenge { state, code })
    }

    /// 사용자 본인의, 만료되지 않은 챌린지만 반환합니다.
    pub async fn find(&self, user_id: &str, challenge_id: &str) -> Option<ChallengeState> {
        let state = self.backup.load_as::<ChallengeState>(challenge_id).await?;
        if state.user_id != user_id {
            log::warn!("다른 사용자의 챌린지 접근 시도 - 사용자: {}, 챌린지: {}", user_id, challenge_id);
            return None;
        }
        if state.is_expired(self.clock.now()) {
            return None;
        }
        Some(state)
    }

    /// 코드를 검증합니다.
    ///
    /// # Errors
    ///
    /// * `AppError::NotFound` - 챌린지가 없거나 만료됨
    pub async fn verify(&self, user_id: &str, challenge_id: &str, code: &str) -> Result<VerifyOutcome, AppError> {
        let mut state = self
            .find(user_id, challenge_id)
            .await
            .ok_or_else(|| AppError::NotFound("챌린지가 없거나 만료되었습니다".to_string()))?;

        let matched = bcrypt::verify(code, &state.code_hash)
            .map_err(|e| AppError::InternalError(format!("챌린지 코드 검증 실패: {}", e)))?;

        if matched {
            self.backup.delete(challenge_id).await;
            log::info!("✅ 챌린지 검증 성공 - 사용자: {}, 챌린지: {}", user_id, challenge_id);
            return Ok(VerifyOutcome::Verified);
        }

        state.attempts += 1;
        if state.remaining_attempts() == 0 {
            self.backup.delete(challenge_id).await;
            log::warn!("챌린지 시도 한도 초과로 취소 - 사용자: {}, 챌린지: {}", user_id, challenge_id);
            return Ok(VerifyOutcome::Exhausted);
        }

        let remaining_ttl = (state.expires_at - self.clock.now()).num_seconds().max(1) as u64;
        self.backup.save_as(challenge_id, &state, remaining_ttl).await;

        Ok(VerifyOutcome::Rejected {
            remaining_attempts: state.remaining_attempts(),
        })
    }

    pub async fn cancel(&self, user_id: &str, challenge_id: &str) -> bool {
        if self.find(user_id, challenge_id).await.is_none() {
            return false;
        }
        self.backup.delete(challenge_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::backend::KeyValueBackend;
    use crate::caching::client::{CacheClient, CacheSettings};
    use crate::caching::memory::MemoryBackend;
    use crate::db::document_store::MemoryDocumentStore;
    use crate::utils::clock::ManualClock;

    struct Fixture {
        clock: Arc<ManualClock>,
        kv: Arc<MemoryBackend>,
        service: ChallengeService,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new());
        let kv = Arc::new(MemoryBackend::new(clock.clone()));
        let docs = Arc::new(MemoryDocumentStore::new(clock.clone()));
        let cache = Arc::new(CacheClient::new(kv.clone(), clock.clone(), CacheSettings::default()));
        let backup = Arc::new(SessionBackup::new(cache, docs, clock.clone()));
        let settings = ChallengeSettings {
            ttl_secs: 300,
            max_attempts: 3,
            hash_cost: 4,
        };
        let service = ChallengeService::new(backup, clock.clone(), settings);
        Fixture { clock, kv, service }
    }

    fn wrong_code(code: &str) -> String {
        if code == "000000" { "111111".to_string() } else { "000000".to_string() }
    }

    #[actix_web::test]
    async fn test_issue_then_verify() {
        let f = fixture();
        let issued = f.service.issue("7", ChallengePurpose::TwoFactor).await.unwrap();
        assert_eq!(issued.code.len(), 6);
        assert_ne!(issued.state.code_hash, issued.code);

        let outcome = f.service.verify("7", &issued.state.challenge_id, &issued.code).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);

        let again = f.service.verify("7", &issued.state.challenge_id, &issued.code).await;
        assert!(matches!(again, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn test_verify_survives_cache_restart() {
        let f = fixture();
        let issued = f.service.issue("7", ChallengePurpose::EmailVerification).await.unwrap();
        f.kv.flush().await.unwrap();

        let outcome = f.service.verify("7", &issued.state.challenge_id, &issued.code).await.unwrap();
        assert_eq!(outcome, VerifyOutcome::Verified);
    }

    #[actix_web::test]
    async fn test_failed_attempts_exhaust_challenge() {
        let f = fixture();
        let issued = f.service.issue("7", ChallengePurpose::SensitiveAction).await.unwrap();
        let id = issued.state.challenge_id.clone();
        let wrong = wrong_code(&issued.code);

        assert_eq!(
            f.service.verify("7", &id, &wrong).await.unwrap(),
            VerifyOutcome::Rejected { remaining_attempts: 2 }
        );
        assert_eq!(
            f.service.verify("7", &id, &wrong).await.unwrap(),
            VerifyOutcome::Rejected { remaining_attempts: 1 }
        );
        assert_eq!(f.service.verify("7", &id, &wrong).await.unwrap(), VerifyOutcome::Exhausted);
        assert!(f.service.verify("7", &id, &issued.code).await.is_err());
    }

    #[actix_web::test]
    async fn test_other_user_cannot_use_challenge() {
        let f = fixture();
        let issued = f.service.issue("7", ChallengePurpose::TwoFactor).await.unwrap();

        assert!(f.service.verify("8", &issued.state.challenge_id, &issued.code).await.is_err());
        assert!(!f.service.cancel("8", &issued.state.challenge_id).await);
        assert!(f.service.cancel("7", &issued.state.challenge_id).await);
    }

    #[actix_web::test]
    async fn test_expired_challenge_is_not_found() {
        let f = fixture();
        let issued = f.service.issue("7", ChallengePurpose::TwoFactor).await.unwrap();

        f.clock.advance(Duration::seconds(301));
        assert!(f.service.find("7", &issued.state.challenge_id).await.is_none());
    }

    /// 공유 캐시를 잠깐 실패시켜 재시도 시간 동안 캐시 쓰기/삭제가 생략되게 합니다.
    async fn cache_blip(f: &Fixture, challenge_id: &str) {
        f.kv.set_failing(true);
        f.service.find("7", challenge_id).await;
        f.kv.set_failing(false);
    }

    #[actix_web::test]
    async fn test_verified_challenge_cannot_be_replayed_after_cache_recovers() {
        let f = fixture();
        let issued = f.service.issue("7", ChallengePurpose::TwoFactor).await.unwrap();
        let id = issued.state.challenge_id.clone();

        cache_blip(&f, &id).await;
        assert_eq!(f.service.verify("7", &id, &issued.code).await.unwrap(), VerifyOutcome::Verified);

        f.clock.advance(Duration::seconds(31));
        let replay = f.service.verify("7", &id, &issued.code).await;
        assert!(matches!(replay, Err(AppError::NotFound(_))));
    }

    #[actix_web::test]
    async fn test_attempt_counter_does_not_roll_back_after_cache_recovers() {
        let f = fixture();
        let issued = f.service.issue("7", ChallengePurpose::TwoFactor).await.unwrap();
        let id = issued.state.challenge_id.clone();
        let wrong = wrong_code(&issued.code);

        assert_eq!(
            f.service.verify("7", &id, &wrong).await.unwrap(),
            VerifyOutcome::Rejected { remaining_attempts: 2 }
        );
        cache_blip(&f, &id).await;
        assert_eq!(
            f.service.verify("7", &id, &wrong).await.unwrap(),
            VerifyOutcome::Rejected { remaining_attempts: 1 }
        );

        f.clock.advance(Duration::seconds(31));
        assert_eq!(f.service.verify("7", &id, &wrong).await.unwrap(), VerifyOutcome::Exhausted);
        assert!(f.service.verify("7", &id, &issued.code).await.is_err());
    }
}
