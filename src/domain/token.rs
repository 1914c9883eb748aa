use serde::{Deserialize, Serialize};

use crate::config::AuthProvider;

/// JWT 클레임
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// 사용자 ID
    pub sub: String,
    pub auth_provider: AuthProvider,
    pub roles: Vec<String>,
    /// 발급 시각 (epoch seconds)
    pub iat: i64,
    /// 만료 시각 (epoch seconds)
    pub exp: i64,
}
