/// 인증 모드
#[derive(Debug, Clone, PartialEq)]
pub enum AuthMode {
    /// 유효한 토큰이 없으면 401
    Required,
    /// 토큰이 없어도 익명으로 진행
    Optional,
}

/// 라우트 접근에 필요한 역할
#[derive(Debug, Clone)]
pub struct RequiredRole(pub String);

impl RequiredRole {
    pub fn is_satisfied(&self, user_roles: &[String]) -> bool {
        user_roles.contains(&self.0)
    }
}
