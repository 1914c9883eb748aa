//! 복원력 계층 메인 애플리케이션
//!
//! 공유 캐시와 문서 저장소를 연결하고(없으면 인메모리로 대체) `AppState` 를 구성한 뒤
//! Actix-web HTTP 서버와 백엔드 상태 모니터를 실행합니다.

use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{App, HttpServer, middleware, web};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info, warn};
use tokio::sync::watch;

use resilience_backend::caching::backend::KeyValueBackend;
use resilience_backend::caching::memory::MemoryBackend;
use resilience_backend::caching::redis::RedisBackend;
use resilience_backend::config::{CacheConfig, MongoConfig, ServerConfig};
use resilience_backend::core::{AppState, StateSettings};
use resilience_backend::db::{Database, DocumentStore, MemoryDocumentStore, MongoDocumentStore};
use resilience_backend::routes::configure_all_routes;
use resilience_backend::utils::clock::{Clock, system_clock};
use resilience_backend::utils::display_terminal::print_startup_summary;

/// TTL 인덱스를 두는 컬렉션 (세션 대체 저장소, 챌린지 백업)
const EXPIRING_COLLECTIONS: [&str; 2] = ["sessions", "session_backups"];

#[actix_web::main]
async fn main() -> io::Result<()> {
    // 환경 설정 및 로깅 초기화
    load_env_file();
    init_logging();

    info!("🚀 복원력 계층 서비스 시작중...");

    let clock = system_clock();
    let shared = initialize_shared_backend(clock.clone());
    let (documents, durable_label) = initialize_document_store(clock.clone()).await;

    let state = web::Data::new(AppState::new(shared, documents, clock, StateSettings::from_env()));

    // 기동 시 한 번 점검해 가용성 플래그를 실제 상태로 맞춥니다.
    let monitor = state.health_monitor();
    let report = monitor.probe_once().await;
    print_startup_summary(report.cache_available, report.session_primary_alive, durable_label);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    actix_web::rt::spawn(monitor.run(CacheConfig::health_check_interval(), shutdown_rx));

    let result = start_http_server(state).await;

    if shutdown_tx.send(true).is_err() {
        warn!("상태 모니터가 이미 종료되었습니다");
    }
    result
}

/// HTTP 서버를 구성하고 실행합니다
///
/// 레이트 리밋, 세션, 인증은 라우트 스코프별로 적용되므로 여기서는
/// CORS, 로깅, 경로 정규화만 등록합니다.
async fn start_http_server(state: web::Data<AppState>) -> io::Result<()> {
    let bind_address = format!("{}:{}", ServerConfig::host(), ServerConfig::port());

    info!("🌐 서버가 http://{} 에서 실행중입니다", bind_address);
    info!("📍 Health check: http://{}/health", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(configure_cors())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(configure_all_routes)
    })
    .bind(bind_address)?
    .run()
    .await
}

/// 환경별 설정 파일을 로드합니다
///
/// * `PROFILE=dev` - .env.dev 파일 로드 (기본값)
/// * `PROFILE=prod` - .env.prod 파일 로드
/// * 기타 - 기본 .env 파일 로드
fn load_env_file() {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "dev".to_string());

    info!("Current profile: {}", profile);

    match profile.as_str() {
        "prod" => match dotenv::from_filename(".env.prod") {
            Ok(_) => info!(".env.prod 파일 로드 됨"),
            Err(e) => error!(".env.prod 파일 로드 실패: {}", e),
        },
        "dev" => match dotenv::from_filename(".env.dev") {
            Ok(_) => info!(".env.dev 파일 로드 됨"),
            Err(e) => error!(".env.dev 파일 로드 실패: {}", e),
        },
        _ => {
            dotenv().ok();
            info!("기본 .env 파일 로드");
        }
    }
}

/// `RUST_LOG` 기반 로깅 초기화 (기본값: "info,actix_web=debug")
///
/// ```bash
/// RUST_LOG=resilience_backend::caching=debug cargo run
/// ```
fn init_logging() {
    env_logger::init_from_env(Env::default().default_filter_or("info,actix_web=debug"));
}

/// 공유 키-값 백엔드를 만듭니다
///
/// `REDIS_URL` 이 있으면 Redis, 없거나 URL 이 잘못되었으면 프로세스 내 인메모리 백엔드를 사용합니다.
/// Redis 연결은 첫 명령에서 맺어지므로 서버가 내려가 있어도 기동은 계속됩니다.
fn initialize_shared_backend(clock: Arc<dyn Clock>) -> Arc<dyn KeyValueBackend> {
    let Some(url) = CacheConfig::redis_url_opt() else {
        warn!("REDIS_URL 이 없어 인메모리 캐시 백엔드를 사용합니다 (단일 프로세스 한정)");
        return Arc::new(MemoryBackend::new(clock));
    };

    match RedisBackend::new(&url, CacheConfig::backend_timeout()) {
        Ok(backend) => {
            info!("📡 Redis 백엔드 구성: {}", url);
            Arc::new(backend)
        }
        Err(e) => {
            error!("Redis URL 을 사용할 수 없어 인메모리 캐시로 대체: {}", e);
            Arc::new(MemoryBackend::new(clock))
        }
    }
}

/// 문서 저장소를 만듭니다
///
/// MongoDB 연결에 실패하면 인메모리 저장소로 대체합니다. 이 경우 세션 대체 경로와
/// 챌린지 백업은 프로세스 재시작을 견디지 못합니다.
async fn initialize_document_store(clock: Arc<dyn Clock>) -> (Arc<dyn DocumentStore>, &'static str) {
    let Some(uri) = MongoConfig::uri() else {
        warn!("MONGODB_URI 가 없어 인메모리 문서 저장소를 사용합니다");
        return (Arc::new(MemoryDocumentStore::new(clock)), "in-memory");
    };

    info!("📡 MongoDB 연결 중...");
    let timeout = CacheConfig::backend_timeout();

    match Database::new(&uri, &MongoConfig::database_name(), timeout).await {
        Ok(database) => {
            let store = MongoDocumentStore::new(database.get_database(), clock, timeout);
            for collection in EXPIRING_COLLECTIONS {
                if let Err(e) = store.ensure_ttl_index(collection).await {
                    warn!("TTL 인덱스 생성 실패 ({}): {}", collection, e);
                }
            }
            (Arc::new(store), "MongoDB")
        }
        Err(e) => {
            error!("MongoDB 연결 실패, 인메모리 문서 저장소로 대체: {}", e);
            (Arc::new(MemoryDocumentStore::new(clock)), "in-memory")
        }
    }
}

/// CORS 설정을 구성합니다
///
/// 세션 쿠키를 주고받으므로 자격 증명을 허용합니다.
fn configure_cors() -> Cors {
    Cors::default()
        .allowed_origin("http://localhost:3000")
        .allowed_origin("http://127.0.0.1:3000")
        .allowed_origin("http://localhost:8080")
        .allowed_origin("http://127.0.0.1:8080")
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .expose_headers(vec![
            header::RETRY_AFTER,
            header::HeaderName::from_static("x-ratelimit-limit"),
            header::HeaderName::from_static("x-ratelimit-remaining"),
        ])
        .supports_credentials()
        .max_age(3600)
}
