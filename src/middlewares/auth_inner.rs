//! AuthMiddleware 인증 로직의 핵심적인 기능
use std::rc::Rc;

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, forward_ready};
use actix_web::{Error, HttpMessage, HttpResponse, web};
use futures_util::future::LocalBoxFuture;

use crate::core::AppError;
use crate::core::state::AppState;
use crate::domain::auth::{AuthMode, AuthenticatedUser, RequiredRole, ResolvedIdentity};
use crate::services::auth::TokenService;

/// 실제 인증 로직을 수행하는 서비스
pub struct AuthMiddlewareService<S> {
    pub service: Rc<S>,
    pub mode: AuthMode,
    pub required_role: Option<RequiredRole>,
}

fn short_circuit<B>(req: ServiceRequest, response: HttpResponse) -> ServiceResponse<EitherBody<B>> {
    let (req, _) = req.into_parts();
    ServiceResponse::new(req, response).map_into_right_body()
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, actix_web::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let mode = self.mode.clone();
        let required_role = self.required_role.clone();

        Box::pin(async move {
            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                log::error!("AppState 가 등록되지 않아 인증할 수 없음: {}", req.path());
                let response = HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "server_misconfigured"
                }));
                return Ok(short_circuit(req, response));
            };

            let auth_result = extract_user_from_request(&req, &state.tokens);

            let identity = match (&mode, auth_result) {
                (AuthMode::Required, Err(err)) => {
                    log::warn!("인증 실패: {}", err);
                    let response = HttpResponse::Unauthorized().json(serde_json::json!({
                        "error": "authentication_required",
                        "message": "유효한 인증 토큰이 필요합니다"
                    }));
                    return Ok(short_circuit(req, response));
                }
                (AuthMode::Required, Ok(user)) => {
                    if let Some(ref required) = required_role {
                        if !required.is_satisfied(&user.roles) {
                            log::warn!(
                                "권한 부족: 사용자 ID {} ({:?}), 필요 권한: {:?}",
                                user.user_id,
                                user.roles,
                                required
                            );
                            let response = HttpResponse::Forbidden().json(serde_json::json!({
                                "error": "insufficient_permissions",
                                "message": "접근 권한이 부족합니다"
                            }));
                            return Ok(short_circuit(req, response));
                        }
                    }

                    log::debug!("인증 성공: 사용자 ID {}", user.user_id);
                    req.extensions_mut().insert(user.clone());
                    ResolvedIdentity::authenticated(user)
                }
                (AuthMode::Optional, Ok(user)) => {
                    let permitted = required_role.as_ref().is_none_or(|r| r.is_satisfied(&user.roles));
                    if permitted {
                        log::debug!("선택적 인증 성공: 사용자 ID {}", user.user_id);
                        req.extensions_mut().insert(user.clone());
                        ResolvedIdentity::authenticated(user)
                    } else {
                        log::debug!("선택적 인증: 권한 부족, 익명으로 진행");
                        ResolvedIdentity::anonymous()
                    }
                }
                (AuthMode::Optional, Err(_)) => {
                    log::debug!("선택적 인증: 토큰 없음, 익명으로 진행");
                    ResolvedIdentity::anonymous()
                }
            };

            // 신원 확인 단계를 통과했다는 표시. 메모이제이션은 이것 없이 실행될 수 없습니다.
            req.extensions_mut().insert(identity);

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

/// 요청의 Bearer 토큰을 검증해 사용자 정보를 만듭니다.
fn extract_user_from_request(req: &ServiceRequest, token_service: &TokenService) -> Result<AuthenticatedUser, AppError> {
    let auth_header = req
        .headers()
        .get(actix_web::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::AuthenticationError("Authorization 헤더가 없습니다".to_string()))?;

    let token = token_service.extract_bearer_token(auth_header)?;
    token_service.authenticate(token)
}
