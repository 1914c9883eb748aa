use std::future::{Ready, ready};

use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};
use serde::{Deserialize, Serialize};

use crate::config::AuthProvider;

/// JWT 토큰에서 추출된 사용자 정보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    /// 사용자 고유 ID
    pub user_id: String,

    /// 인증 프로바이더
    pub auth_provider: AuthProvider,

    /// 사용자 역할 목록
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    /// 특정 역할을 보유하고 있는지 확인
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// 여러 역할 중 하나라도 보유하고 있는지 확인
    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|&role| self.has_role(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<actix_web::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<AuthenticatedUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(actix_web::error::ErrorUnauthorized("인증되지 않은 요청입니다"))),
        }
    }
}

/// 신원 확인 단계를 통과했다는 증거
///
/// 인증 미들웨어만 생성할 수 있으며(생성자가 크레이트 내부 전용),
/// 캐시 키가 요청자 신원에 의존하는 [`Memoized::call`](crate::caching::memoize::Memoized::call)의 필수 인자입니다.
/// 그래서 신원 확인 전에 메모이제이션을 실행하는 조합은 컴파일되지 않습니다.
///
/// 인증 미들웨어 없이 이 추출자를 쓰면 라우트 구성 오류이므로 500 을 반환합니다.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedIdentity {
    user: Option<AuthenticatedUser>,
}

impl ResolvedIdentity {
    pub(crate) fn authenticated(user: AuthenticatedUser) -> Self {
        Self { user: Some(user) }
    }

    pub(crate) fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_ref()
    }

    pub fn is_anonymous(&self) -> bool {
        self.user.is_none()
    }

    /// 캐시 키에 들어가는 신원 범위: `user_{id}` 또는 `anonymous`
    pub fn cache_scope(&self) -> String {
        match &self.user {
            Some(user) => format!("user_{}", user.user_id),
            None => "anonymous".to_string(),
        }
    }
}

impl FromRequest for ResolvedIdentity {
    type Error = Error;
    type Future = Ready<actix_web::Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        match req.extensions().get::<ResolvedIdentity>() {
            Some(identity) => ready(Ok(identity.clone())),
            None => {
                log::error!("신원 확인 단계 없이 ResolvedIdentity 요청됨: {}", req.path());
                ready(Err(actix_web::error::ErrorInternalServerError(
                    "identity stage is not configured for this route",
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn user(roles: &[&str]) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: "test_id".to_string(),
            auth_provider: AuthProvider::Local,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_authenticated_user_roles() {
        let admin = user(&["user", "admin"]);
        let moderator = user(&["user", "moderator"]);

        assert!(admin.is_admin());
        assert!(moderator.has_any_role(&["admin", "moderator"]));
        assert!(!moderator.is_admin());
    }

    #[test]
    fn test_cache_scope() {
        assert_eq!(ResolvedIdentity::authenticated(user(&[])).cache_scope(), "user_test_id");
        assert_eq!(ResolvedIdentity::anonymous().cache_scope(), "anonymous");
    }

    #[actix_web::test]
    async fn test_identity_extractor_fails_without_identity_stage() {
        let req = TestRequest::default().to_http_request();
        let result = ResolvedIdentity::extract(&req).await;

        let err = result.unwrap_err();
        assert_eq!(
            err.as_response_error().status_code(),
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn test_identity_extractor_reads_extensions() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(ResolvedIdentity::anonymous());

        let identity = ResolvedIdentity::extract(&req).await.unwrap();
        assert!(identity.is_anonymous());
    }
}
