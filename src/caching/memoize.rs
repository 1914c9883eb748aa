//! # 핸들러 메모이제이션
//!
//! 핸들러 결과를 캐시에 저장하고, 같은 키로 다시 호출되면 핸들러를 건너뜁니다.
//!
//! ## 호출 흐름
//!
//! 1. 캐시 클라이언트가 없거나 인자 중 직렬화할 수 없는 값이 있으면 핸들러를 바로 호출합니다.
//! 2. 키를 계산합니다. 키 함수가 주어지면 그것을, 아니면 `{prefix}:{function}:{hash}` 를 씁니다.
//!    조회가 `Unavailable` 이면(장애 중, 재시도 대기 중) 핸들러만 호출하고 저장하지 않습니다.
//!    재시도 대기 시간이 지나면 조회 자체가 복구 시도가 됩니다.
//! 3. 히트면 저장된 값을 핸들러가 돌려주는 응답 형태([`ResponseShape`])로 다시 감싸서 반환합니다.
//! 4. 미스면 핸들러를 호출하고, 결과에서 캐시 가능한 본문만 추출해 TTL 과 함께 저장합니다.
//!    `(본문, 상태)` 쌍의 상태가 4xx/5xx 이면 저장하지 않습니다.
//!
//! ## 합성 순서
//!
//! 메모이제이션은 반드시 신원 확인 단계 **안쪽**에서 실행되어야 합니다.
//! 키 함수가 요청자의 신원을 키에 섞기 때문에, 바깥에서 실행하면 모든 사용자가
//! 익명 키를 공유하게 됩니다. 이 순서는 타입으로 강제됩니다.
//! [`Memoized::call`]은 [`ResolvedIdentity`]를 인자로 요구하고,
//! `ResolvedIdentity`는 인증 미들웨어만 만들 수 있습니다.
//!
//! ```rust,ignore
//! let view = Memoized::builder("get_profile")
//!     .prefix("user:profile")
//!     .ttl(60)
//!     .key_fn(identity_key_fn())
//!     .cache(state.cache.clone())
//!     .build();
//!
//! async fn handler(identity: ResolvedIdentity, ...) -> AppResult<HandlerOutput> {
//!     let args = CallArgs::new().kwarg("page", page);
//!     view.call(&identity, &args, || async { load_profile().await }).await
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;

use actix_web::body::BoxBody;
use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, Responder};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::caching::client::{CacheClient, CacheMiss};
use crate::domain::auth::ResolvedIdentity;

/// 핸들러 결과 형태
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// 가공되지 않은 구조화 값
    Raw(Value),
    /// 본문과 HTTP 상태 쌍
    StatusPaired(Value, StatusCode),
    /// JSON 본문을 가진 프레임워크 응답
    Json(Value),
}

impl HandlerOutput {
    /// 캐시에 저장할 본문을 추출합니다. 에러 상태의 응답은 `None` 입니다.
    pub fn cacheable_payload(&self) -> Option<&Value> {
        match self {
            HandlerOutput::Raw(value) | HandlerOutput::Json(value) => Some(value),
            HandlerOutput::StatusPaired(value, status) => {
                if status.is_client_error() || status.is_server_error() {
                    None
                } else {
                    Some(value)
                }
            }
        }
    }

    pub fn body(&self) -> &Value {
        match self {
            HandlerOutput::Raw(value) | HandlerOutput::Json(value) | HandlerOutput::StatusPaired(value, _) => value,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HandlerOutput::StatusPaired(_, status) => *status,
            _ => StatusCode::OK,
        }
    }
}

impl Responder for HandlerOutput {
    type Body = BoxBody;

    fn respond_to(self, _req: &HttpRequest) -> HttpResponse<Self::Body> {
        match self {
            HandlerOutput::Raw(value) | HandlerOutput::Json(value) => HttpResponse::Ok().json(value),
            HandlerOutput::StatusPaired(value, status) => HttpResponse::build(status).json(value),
        }
    }
}

/// 핸들러가 돌려주는 응답 형태. 캐시 히트 값을 다시 감쌀 때 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    Raw,
    /// 히트 시 `200 OK` 로 감쌉니다. 에러 상태는 저장되지 않으므로 히트는 항상 성공 응답입니다.
    StatusPaired,
    #[default]
    Json,
}

impl ResponseShape {
    pub fn wrap(self, value: Value) -> HandlerOutput {
        match self {
            ResponseShape::Raw => HandlerOutput::Raw(value),
            ResponseShape::StatusPaired => HandlerOutput::StatusPaired(value, StatusCode::OK),
            ResponseShape::Json => HandlerOutput::Json(value),
        }
    }
}

/// 키 계산에 쓰이는 호출 인자
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    pub keyword: BTreeMap<String, Value>,
    /// 직렬화에 실패한 인자 이름. 비어 있지 않으면 키를 만들 수 없습니다.
    unkeyable: Vec<String>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// 위치 인자를 추가합니다.
    ///
    /// 직렬화할 수 없는 값은 키에 반영할 수 없으므로 이 호출 전체가 캐시 대상에서 빠집니다.
    pub fn arg<T: Serialize>(mut self, value: T) -> Self {
        let name = format!("#{}", self.positional.len());
        let value = self.to_key_value(&name, &value);
        self.positional.push(value);
        self
    }

    pub fn kwarg<T: Serialize>(mut self, name: impl Into<String>, value: T) -> Self {
        let name = name.into();
        let value = self.to_key_value(&name, &value);
        self.keyword.insert(name, value);
        self
    }

    /// 쿼리 문자열 파라미터를 키워드 인자로 추가합니다.
    pub fn query_params<'a>(mut self, params: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        for (name, value) in params {
            self.keyword.insert(format!("query.{}", name), Value::String(value.clone()));
        }
        self
    }

    /// 모든 인자가 키에 반영되었는지 여부
    pub fn is_keyable(&self) -> bool {
        self.unkeyable.is_empty()
    }

    fn to_key_value<T: Serialize>(&mut self, name: &str, value: &T) -> Value {
        match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("메모이제이션 인자 직렬화 실패 - 인자: {}, 에러: {}", name, e);
                self.unkeyable.push(name.to_string());
                Value::Null
            }
        }
    }
}

/// 키 함수에 전달되는 입력
pub struct KeyInput<'a> {
    pub prefix: &'a str,
    pub function: &'a str,
    pub args: &'a CallArgs,
    pub identity: &'a ResolvedIdentity,
}

/// 호출자가 제공하는 키 함수
pub type KeyFn = Arc<dyn Fn(&KeyInput<'_>) -> String + Send + Sync>;

/// 객체 키를 정렬한 안정적인 문자열 표현
fn canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                canonical_json(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical_json(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// 함수 이름과 인자의 해시 (SHA-256 앞 16자리)
pub fn args_digest(function: &str, args: &CallArgs) -> String {
    let mut material = String::new();
    material.push_str(function);
    material.push('|');
    canonical_json(&Value::Array(args.positional.clone()), &mut material);
    material.push('|');
    for (name, value) in &args.keyword {
        let _ = write!(material, "{}=", name);
        canonical_json(value, &mut material);
        material.push(';');
    }

    let digest = Sha256::digest(material.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

/// 기본 키: `{prefix}:{function}:{hash}`
pub fn default_key(input: &KeyInput<'_>) -> String {
    format!("{}:{}:{}", input.prefix, input.function, args_digest(input.function, input.args))
}

/// 요청자 신원을 섞은 키 함수: `{prefix}:user_{id}:{hash}` 또는 `{prefix}:anonymous:{hash}`
pub fn identity_key_fn() -> KeyFn {
    Arc::new(|input: &KeyInput<'_>| {
        format!(
            "{}:{}:{}",
            input.prefix,
            input.identity.cache_scope(),
            args_digest(input.function, input.args)
        )
    })
}

/// 메모이제이션 래퍼
pub struct Memoized {
    cache: Option<Arc<CacheClient>>,
    ttl_secs: u64,
    prefix: String,
    function: String,
    key_fn: Option<KeyFn>,
    shape: ResponseShape,
}

pub struct MemoizedBuilder {
    inner: Memoized,
}

impl MemoizedBuilder {
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.inner.prefix = prefix.into();
        self
    }

    pub fn ttl(mut self, ttl_secs: u64) -> Self {
        self.inner.ttl_secs = ttl_secs;
        self
    }

    pub fn key_fn(mut self, key_fn: KeyFn) -> Self {
        self.inner.key_fn = Some(key_fn);
        self
    }

    pub fn shape(mut self, shape: ResponseShape) -> Self {
        self.inner.shape = shape;
        self
    }

    pub fn cache(mut self, cache: Arc<CacheClient>) -> Self {
        self.inner.cache = Some(cache);
        self
    }

    pub fn build(self) -> Memoized {
        self.inner
    }
}

impl Memoized {
    /// `function` 은 키에 들어가는 함수 식별자입니다.
    pub fn builder(function: impl Into<String>) -> MemoizedBuilder {
        MemoizedBuilder {
            inner: Memoized {
                cache: None,
                ttl_secs: 300,
                prefix: "view".to_string(),
                function: function.into(),
                key_fn: None,
                shape: ResponseShape::default(),
            },
        }
    }

    pub fn key_for(&self, identity: &ResolvedIdentity, args: &CallArgs) -> String {
        let input = KeyInput {
            prefix: &self.prefix,
            function: &self.function,
            args,
            identity,
        };
        match &self.key_fn {
            Some(key_fn) => key_fn(&input),
            None => default_key(&input),
        }
    }

    /// 캐시를 거쳐 핸들러를 실행합니다.
    ///
    /// 핸들러 에러는 그대로 전달되며 캐시에 저장되지 않습니다.
    pub async fn call<F, Fut, E>(&self, identity: &ResolvedIdentity, args: &CallArgs, handler: F) -> Result<HandlerOutput, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<HandlerOutput, E>>,
    {
        let Some(cache) = &self.cache else {
            return handler().await;
        };
        if !args.is_keyable() {
            log::warn!("키를 만들 수 없는 인자 - 캐시 없이 실행: {} ({:?})", self.function, args.unkeyable);
            return handler().await;
        }

        let key = self.key_for(identity, args);
        match cache.lookup::<Value>(&key).await {
            Ok(cached) => return Ok(self.shape.wrap(cached)),
            Err(CacheMiss::Unavailable) => return handler().await,
            Err(CacheMiss::NotFound | CacheMiss::Corrupt) => {}
        }

        let output = handler().await?;
        match output.cacheable_payload() {
            Some(payload) => {
                if !cache.set(&key, payload, self.ttl_secs).await {
                    log::debug!("메모이제이션 결과 저장 실패: {}", key);
                }
            }
            None => log::debug!("에러 상태 응답은 캐시하지 않음: {} ({})", key, output.status()),
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::caching::client::CacheSettings;
    use crate::caching::memory::MemoryBackend;
    use crate::config::AuthProvider;
    use crate::domain::auth::AuthenticatedUser;
    use crate::utils::clock::ManualClock;

    fn cache() -> (Arc<MemoryBackend>, Arc<CacheClient>) {
        let clock = Arc::new(ManualClock::new());
        let backend = Arc::new(MemoryBackend::new(clock.clone()));
        let cache = Arc::new(CacheClient::new(backend.clone(), clock, CacheSettings::default()));
        (backend, cache)
    }

    fn user(id: &str) -> ResolvedIdentity {
        ResolvedIdentity::authenticated(AuthenticatedUser {
            user_id: id.to_string(),
            auth_provider: AuthProvider::Local,
            roles: vec!["user".to_string()],
        })
    }

    #[test]
    fn test_default_key_is_deterministic() {
        let view = Memoized::builder("list_posts").prefix("post:list").build();
        let args = CallArgs::new().arg(3).kwarg("page", 2).kwarg("filter", json!({"b": 1, "a": 2}));
        let same = CallArgs::new().arg(3).kwarg("filter", json!({"a": 2, "b": 1})).kwarg("page", 2);

        let identity = ResolvedIdentity::anonymous();
        let key = view.key_for(&identity, &args);

        assert_eq!(key, view.key_for(&identity, &same));
        assert!(key.starts_with("post:list:list_posts:"));
        assert_eq!(key.rsplit(':').next().map(str::len), Some(16));
        assert_ne!(key, view.key_for(&identity, &CallArgs::new().arg(4).kwarg("page", 2)));
    }

    #[test]
    fn test_identity_key_differs_per_principal() {
        let view = Memoized::builder("get_profile")
            .prefix("user:profile")
            .key_fn(identity_key_fn())
            .build();
        let args = CallArgs::new().kwarg("page", 1);

        let alice = view.key_for(&user("alice"), &args);
        let bob = view.key_for(&user("bob"), &args);
        let anonymous = view.key_for(&ResolvedIdentity::anonymous(), &args);

        assert_ne!(alice, bob);
        assert!(alice.starts_with("user:profile:user_alice:"));
        assert!(anonymous.starts_with("user:profile:anonymous:"));
    }

    #[actix_web::test]
    async fn test_hit_skips_handler_and_rewraps_shape() {
        let (_, cache) = cache();
        let view = Memoized::builder("get_topic").cache(cache).build();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let args = CallArgs::new().arg(1);

        for _ in 0..3 {
            let output = view
                .call(&ResolvedIdentity::anonymous(), &args, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(HandlerOutput::Json(json!({"id": 1})))
                })
                .await
                .unwrap();
            assert_eq!(output, HandlerOutput::Json(json!({"id": 1})));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[actix_web::test]
    async fn test_error_status_is_not_cached() {
        let (backend, cache) = cache();
        let view = Memoized::builder("get_topic").shape(ResponseShape::StatusPaired).cache(cache).build();

        let output = view
            .call(&ResolvedIdentity::anonymous(), &CallArgs::new(), || async {
                Ok::<_, Infallible>(HandlerOutput::StatusPaired(json!({"error": "missing"}), StatusCode::NOT_FOUND))
            })
            .await
            .unwrap();

        assert_eq!(output.status(), StatusCode::NOT_FOUND);
        assert!(backend.is_empty());
    }

    #[actix_web::test]
    async fn test_status_paired_hit_is_ok() {
        let (_, cache) = cache();
        let view = Memoized::builder("create_view").shape(ResponseShape::StatusPaired).cache(cache).build();
        let identity = ResolvedIdentity::anonymous();

        view.call(&identity, &CallArgs::new(), || async {
            Ok::<_, Infallible>(HandlerOutput::StatusPaired(json!([1, 2]), StatusCode::OK))
        })
        .await
        .unwrap();

        let hit = view
            .call(&identity, &CallArgs::new(), || async {
                Ok::<_, Infallible>(HandlerOutput::StatusPaired(json!([]), StatusCode::OK))
            })
            .await
            .unwrap();

        assert_eq!(hit, HandlerOutput::StatusPaired(json!([1, 2]), StatusCode::OK));
    }

    #[actix_web::test]
    async fn test_unavailable_cache_calls_handler_directly() {
        let (backend, cache) = cache();
        backend.set_failing(true);
        cache.health_check().await;
        let view = Memoized::builder("get_topic").cache(cache).build();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..2 {
            view.call(&ResolvedIdentity::anonymous(), &CallArgs::new(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Infallible>(HandlerOutput::Raw(json!(1)))
            })
            .await
            .unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn test_memoization_resumes_after_retry_window_without_health_check() {
        let clock = Arc::new(ManualClock::new());
        let backend = Arc::new(MemoryBackend::new(clock.clone()));
        let cache = Arc::new(CacheClient::new(backend.clone(), clock.clone(), CacheSettings::default()));
        let view = Memoized::builder("get_topic").cache(cache.clone()).build();
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let run = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Infallible>(HandlerOutput::Raw(json!(1)))
        };

        backend.set_failing(true);
        view.call(&ResolvedIdentity::anonymous(), &CallArgs::new(), run).await.unwrap();
        assert!(!cache.is_available());

        backend.set_failing(false);
        clock.advance(chrono::Duration::seconds(31));
        for _ in 0..2 {
            view.call(&ResolvedIdentity::anonymous(), &CallArgs::new(), run).await.unwrap();
        }

        assert!(cache.is_available());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.len(), 1);
    }

    #[actix_web::test]
    async fn test_unserializable_args_skip_caching() {
        let (backend, cache) = cache();
        let view = Memoized::builder("get_topic").cache(cache).build();
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        // 문자열이 아닌 맵 키는 JSON 으로 표현할 수 없습니다.
        let first = CallArgs::new().kwarg("filter", HashMap::from([(vec![1u8], 1)]));
        let second = CallArgs::new().kwarg("filter", HashMap::from([(vec![2u8], 2)]));
        assert!(!first.is_keyable());

        for (args, expected) in [(&first, 1), (&second, 2)] {
            let output = view
                .call(&ResolvedIdentity::anonymous(), args, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, Infallible>(HandlerOutput::Raw(json!(expected)))
                })
                .await
                .unwrap();
            assert_eq!(output, HandlerOutput::Raw(json!(expected)));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(backend.is_empty());
    }

    #[actix_web::test]
    async fn test_handler_error_propagates_uncached() {
        let (backend, cache) = cache();
        let view = Memoized::builder("get_topic").cache(cache).build();

        let result = view
            .call(&ResolvedIdentity::anonymous(), &CallArgs::new(), || async { Err::<HandlerOutput, _>("boom") })
            .await;

        assert_eq!(result, Err("boom"));
        assert!(backend.is_empty());
    }
}
