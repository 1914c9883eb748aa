//! 데이터 및 서버 설정 관리 모듈
//!
//! 실행 환경과 서버 바인딩 설정을 관리합니다.

use std::env;

/// 애플리케이션 실행 환경
#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    /// 개발 환경 - 챌린지 코드를 응답에 노출
    Development,
    /// 테스트 환경 - 자동화된 테스트용 설정
    Test,
    /// 스테이징 환경 - 프로덕션 유사 환경
    Staging,
    /// 프로덕션 환경
    Production,
}

impl Environment {
    /// 현재 실행 환경을 감지합니다.
    ///
    /// `ENVIRONMENT` 환경 변수를 확인하며,
    /// 설정되지 않은 경우 `Production`을 기본값으로 사용합니다.
    pub fn current() -> Self {
        env::var("ENVIRONMENT")
            .map(|value| Self::from_str(&value))
            .unwrap_or(Environment::Production)
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" | "testing" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Production,
        }
    }

    /// 외부 전달 채널 없이 비밀 값을 응답에 실어도 되는 환경인지 여부
    pub fn exposes_debug_secrets(&self) -> bool {
        matches!(self, Environment::Development | Environment::Test)
    }
}

/// 서버 설정
pub struct ServerConfig;

impl ServerConfig {
    /// 서버 포트를 반환합니다. (기본값: 8080)
    pub fn port() -> u16 {
        env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080)
    }

    /// 서버 호스트를 반환합니다. (기본값: 0.0.0.0)
    pub fn host() -> String {
        env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string())
    }
}

/// MongoDB 설정
pub struct MongoConfig;

impl MongoConfig {
    pub fn uri() -> Option<String> {
        env::var("MONGODB_URI").ok().filter(|uri| !uri.trim().is_empty())
    }

    pub fn database_name() -> String {
        env::var("DATABASE_NAME").unwrap_or_else(|_| "resilience_dev".to_string())
    }
}
