//! 세션 미들웨어
//!
//! 요청 쿠키로 세션을 열어 요청 확장에 넣고, 핸들러가 끝나면 변경 사항을 저장합니다.
//! 어느 백엔드(공유 / 대체)에 저장할지는 [`FailoverSessionStore`](crate::sessions::store::FailoverSessionStore)가
//! 연산마다 결정합니다.

use std::future::{Ready, ready};
use std::rc::Rc;

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::{Error, HttpMessage, web};
use futures_util::future::LocalBoxFuture;

use crate::core::state::AppState;

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionMiddleware;

impl<S, B> Transform<S, ServiceRequest> for SessionMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = SessionMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct SessionMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SessionMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, actix_web::Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
                log::error!("AppState 가 등록되지 않아 세션 없이 진행: {}", req.path());
                return service.call(req).await;
            };

            let session = state.sessions.open(req.request()).await;
            req.extensions_mut().insert(session.clone());

            let mut res = service.call(req).await?;
            if !state.sessions.save(&session, res.response_mut()).await {
                log::warn!("세션을 저장하지 못한 채 응답 - 세션: {}", session.id());
            }
            Ok(res)
        })
    }
}
