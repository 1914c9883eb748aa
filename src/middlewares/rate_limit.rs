//! 레이트 리밋 미들웨어
//!
//! 스코프 가장 바깥에서 실행되어 신원 확인 전에 요청을 걸러냅니다.
//! 그래서 클라이언트 식별자는 토큰이 아니라 접속 주소입니다.
//!
//! - 허용: `X-RateLimit-Limit`, `X-RateLimit-Remaining` 헤더를 붙여 다음 단계로 전달
//! - 거부: 429 와 `Retry-After` 헤더로 바로 응답
//! - 한도 표기 오류: 경고 로그 후 그대로 통과
//!
//! ```rust,ignore
//! web::scope("/api/v1/challenges")
//!     .wrap(AuthMiddleware::required())
//!     .wrap(RateLimit::new("5/minute"))
//! ```

use std::future::{Ready, ready};
use std::rc::Rc;

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{Error, ResponseError, web};
use futures_util::future::LocalBoxFuture;

use crate::core::AppError;
use crate::core::state::AppState;
use crate::rate_limit::limiter::{RateCheck, RateDecision};

const LIMIT_HEADER: &str = "x-ratelimit-limit";
const REMAINING_HEADER: &str = "x-ratelimit-remaining";

pub struct RateLimit {
    /// `None` 이면 `AppState::default_rate_limit`
    limit: Option<Rc<str>>,
}

impl RateLimit {
    pub fn new(limit: &str) -> Self {
        Self {
            limit: Some(Rc::from(limit)),
        }
    }

    /// `RATE_LIMIT_DEFAULT` 한도 사용
    pub fn default_limit() -> Self {
        Self { limit: None }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            service: Rc::new(service),
            limit: self.limit.clone(),
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limit: Option<Rc<str>>,
}

/// 접속 주소 (포트 제외). 알 수 없으면 `unknown`
fn client_id(req: &ServiceRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn limit_headers(check: &RateCheck) -> Vec<(HeaderName, HeaderValue)> {
    let Some(limit) = check.limit else {
        return Vec::new();
    };
    let mut headers = vec![(HeaderName::from_static(LIMIT_HEADER), HeaderValue::from(limit.count))];
    if let RateDecision::Admit { remaining } = check.decision {
        headers.push((HeaderName::from_static(REMAINING_HEADER), HeaderValue::from(remaining)));
    }
    headers
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
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
        let limit = self.limit.clone();

        Box::pin(async move {
            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                log::error!("AppState 가 등록되지 않아 레이트 리밋을 건너뜀: {}", req.path());
                let res = service.call(req).await?;
                return Ok(res.map_into_left_body());
            };

            let spec = limit.as_deref().unwrap_or(&state.default_rate_limit);
            let client = client_id(&req);
            let endpoint = req.path().to_string();

            let check = state.rate_limiter.check(spec, &client, &endpoint).await;
            let headers = limit_headers(&check);

            if let RateDecision::Reject { retry_after_secs } = check.decision {
                log::warn!(
                    "🚫 요청 한도 초과 - 클라이언트: {}, 엔드포인트: {}, {}초 후 재시도 ({:?})",
                    client,
                    endpoint,
                    retry_after_secs,
                    check.strategy
                );
                let mut response = AppError::TooManyRequests { retry_after_secs }.error_response();
                for (name, value) in headers {
                    response.headers_mut().insert(name, value);
                }
                let (req, _) = req.into_parts();
                return Ok(ServiceResponse::new(req, response).map_into_right_body());
            }

            let mut res = service.call(req).await?;
            for (name, value) in headers {
                res.headers_mut().insert(name, value);
            }
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::http::StatusCode;
    use actix_web::http::header::RETRY_AFTER;
    use actix_web::{App, HttpResponse, test};

    use crate::caching::memory::MemoryBackend;
    use crate::core::state::StateSettings;
    use crate::db::document_store::MemoryDocumentStore;
    use crate::utils::clock::ManualClock;

    fn state() -> web::Data<AppState> {
        let clock = Arc::new(ManualClock::new());
        web::Data::new(AppState::new(
            Arc::new(MemoryBackend::new(clock.clone())),
            Arc::new(MemoryDocumentStore::new(clock.clone())),
            clock,
            StateSettings::default(),
        ))
    }

    async fn ok() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    fn from(ip: &str) -> test::TestRequest {
        test::TestRequest::get()
            .uri("/limited")
            .peer_addr(format!("{}:40000", ip).parse().unwrap())
    }

    #[actix_web::test]
    async fn test_fourth_request_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .service(web::scope("").wrap(RateLimit::new("3/minute")).route("/limited", web::get().to(ok))),
        )
        .await;

        for remaining in ["2", "1", "0"] {
            let res = test::call_service(&app, from("10.0.0.1").to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(res.headers().get(REMAINING_HEADER).unwrap(), remaining);
        }

        let rejected = test::call_service(&app, from("10.0.0.1").to_request()).await;
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(rejected.headers().get(RETRY_AFTER).unwrap(), "60");
        assert_eq!(rejected.headers().get(LIMIT_HEADER).unwrap(), "3");

        let other = test::call_service(&app, from("10.0.0.2").to_request()).await;
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_invalid_limit_fails_open() {
        let app = test::init_service(
            App::new()
                .app_data(state())
                .service(web::scope("").wrap(RateLimit::new("often")).route("/limited", web::get().to(ok))),
        )
        .await;

        for _ in 0..5 {
            let res = test::call_service(&app, from("10.0.0.1").to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
            assert!(res.headers().get(LIMIT_HEADER).is_none());
        }
    }
}
