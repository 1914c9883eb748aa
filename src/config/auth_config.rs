//! 인증 설정
//!
//! JWT 서명 키와 토큰 수명, 인증 제공자 타입을 정의합니다.

use std::env;

/// JWT 토큰 설정
pub struct JwtConfig;

impl JwtConfig {
    /// JWT 서명용 비밀 키
    ///
    /// `JWT_SECRET`이 없으면 경고를 남기고 개발용 기본값을 사용합니다.
    pub fn secret() -> String {
        env::var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("JWT_SECRET not set, using default (not secure for production!)");
            "your-secret-key".to_string()
        })
    }

    pub fn expiration_hours() -> i64 {
        env::var("JWT_EXPIRATION_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse()
            .unwrap_or(24)
    }
}

/// 인증 제공자
///
/// 이 서비스는 자체 발급 토큰만 다룹니다. 클레임 호환을 위해 타입으로 남겨 둡니다.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum AuthProvider {
    Local,
}
