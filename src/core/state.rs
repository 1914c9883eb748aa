//! # 애플리케이션 상태
//!
//! 모든 컴포넌트를 한 번 생성해 `web::Data<AppState>` 로 공유합니다.
//! 백엔드(키-값, 문서 저장소)와 시계를 밖에서 주입받으므로, 테스트는 인메모리 백엔드와
//! [`ManualClock`](crate::utils::clock::ManualClock) 으로 같은 구성을 만들 수 있습니다.
//!
//! ```text
//!            ┌──────────────── KeyValueBackend (Redis | Memory) ────────────────┐
//!            │                         │                          │             │
//!       CacheClient              RateLimiter             KeyValueSessionBackend │
//!        │      │                                                 │             │
//!  Invalidator  Memoized(profile)                      FailoverSessionStore     │
//!        │                                                        │             │
//!  SessionBackup ───────────── DocumentStore (Mongo | Memory) ────┘             │
//!        │                          │                                           │
//!  ChallengeService          ProfileRepository                                  │
//! ```

use std::sync::Arc;

use chrono::Duration;

use crate::caching::backend::KeyValueBackend;
use crate::caching::client::{CacheClient, CacheSettings};
use crate::caching::invalidator::{CacheInvalidator, RelationshipTable};
use crate::caching::memoize::{KeyFn, KeyInput, Memoized, ResponseShape, args_digest};
use crate::config::{CacheConfig, Environment, JwtConfig, RateLimitConfig};
use crate::db::document_store::DocumentStore;
use crate::rate_limit::limiter::{LocalRateStore, RateLimiter, RateLimiterSettings};
use crate::repositories::profiles::ProfileRepository;
use crate::services::auth::TokenService;
use crate::services::challenges::{ChallengeService, ChallengeSettings};
use crate::services::monitoring::HealthMonitor;
use crate::sessions::backup::SessionBackup;
use crate::sessions::store::{DocumentSessionBackend, FailoverSessionStore, KeyValueSessionBackend, SessionSettings};
use crate::utils::clock::Clock;

const SESSION_COLLECTION: &str = "sessions";

/// 컴포넌트 설정 묶음
#[derive(Debug, Clone)]
pub struct StateSettings {
    pub environment: Environment,
    pub cache: CacheSettings,
    pub rate_limiter: RateLimiterSettings,
    pub session: SessionSettings,
    pub challenge: ChallengeSettings,
    /// 라우트에 한도를 따로 지정하지 않았을 때의 한도 표기
    pub default_rate_limit: String,
    pub profile_view_ttl_secs: u64,
    pub jwt_secret: String,
    pub jwt_expiration: Duration,
}

impl StateSettings {
    pub fn from_env() -> Self {
        Self {
            environment: Environment::current(),
            cache: CacheSettings::from_env(),
            rate_limiter: RateLimiterSettings::from_env(),
            session: SessionSettings::from_env(),
            challenge: ChallengeSettings::from_env(),
            default_rate_limit: RateLimitConfig::default_limit(),
            profile_view_ttl_secs: CacheConfig::default_ttl_seconds(),
            jwt_secret: JwtConfig::secret(),
            jwt_expiration: Duration::hours(JwtConfig::expiration_hours()),
        }
    }
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            environment: Environment::Test,
            cache: CacheSettings::default(),
            rate_limiter: RateLimiterSettings::default(),
            session: SessionSettings::default(),
            challenge: ChallengeSettings::default(),
            default_rate_limit: "100/minute".to_string(),
            profile_view_ttl_secs: 300,
            jwt_secret: "test-secret".to_string(),
            jwt_expiration: Duration::hours(1),
        }
    }
}

/// 프로필 뷰 키: `user:{id}:profile:{hash}`
///
/// 사용자 관계 규칙의 `user:{id}:*` 패턴에 걸리도록 사용자 ID 를 두 번째 자리에 둡니다.
pub fn profile_view_key_fn() -> KeyFn {
    std::sync::Arc::new(|input: &KeyInput<'_>| {
        let owner = input
            .identity
            .user()
            .map(|user| user.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        format!(
            "{}:{}:{}:{}",
            input.prefix,
            owner,
            input.function,
            args_digest(input.function, input.args)
        )
    })
}

pub struct AppState {
    pub environment: Environment,
    pub clock: Arc<dyn Clock>,
    pub cache: Arc<CacheClient>,
    pub invalidator: Arc<CacheInvalidator>,
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: Arc<FailoverSessionStore>,
    pub backup: Arc<SessionBackup>,
    pub challenges: Arc<ChallengeService>,
    pub tokens: Arc<TokenService>,
    pub profiles: Arc<ProfileRepository>,
    pub profile_view: Memoized,
    pub default_rate_limit: String,
}

impl AppState {
    pub fn new(
        shared: Arc<dyn KeyValueBackend>,
        documents: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        settings: StateSettings,
    ) -> Self {
        let cache = Arc::new(CacheClient::new(shared.clone(), clock.clone(), settings.cache));
        let invalidator = Arc::new(CacheInvalidator::new(cache.clone(), RelationshipTable::social_defaults()));

        let rate_limiter = Arc::new(RateLimiter::new(
            Some(shared.clone()),
            Arc::new(LocalRateStore::new()),
            clock.clone(),
            settings.rate_limiter,
        ));

        let sessions = Arc::new(FailoverSessionStore::new(
            Arc::new(KeyValueSessionBackend::new(
                shared,
                settings.session.key_prefix.clone(),
                clock.clone(),
            )),
            Arc::new(DocumentSessionBackend::new(
                documents.clone(),
                SESSION_COLLECTION,
                clock.clone(),
            )),
            clock.clone(),
            settings.session,
        ));

        let backup = Arc::new(SessionBackup::new(cache.clone(), documents.clone(), clock.clone()));
        let challenges = Arc::new(ChallengeService::new(backup.clone(), clock.clone(), settings.challenge));

        let profile_view = Memoized::builder("profile")
            .prefix("user")
            .ttl(settings.profile_view_ttl_secs)
            .key_fn(profile_view_key_fn())
            .shape(ResponseShape::Json)
            .cache(cache.clone())
            .build();

        Self {
            environment: settings.environment,
            tokens: Arc::new(TokenService::new(&settings.jwt_secret, settings.jwt_expiration)),
            profiles: Arc::new(ProfileRepository::new(documents, clock.clone())),
            clock,
            cache,
            invalidator,
            rate_limiter,
            sessions,
            backup,
            challenges,
            profile_view,
            default_rate_limit: settings.default_rate_limit,
        }
    }

    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            self.cache.clone(),
            self.sessions.clone(),
            self.rate_limiter.clone(),
            self.clock.clone(),
        )
    }
}
