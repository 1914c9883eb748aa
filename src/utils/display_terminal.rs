//! 터미널 출력 포맷팅 유틸리티
//!
//! 애플리케이션 기동 과정에서 각 백엔드의 연결 상태를 시각적으로 표시합니다.

/// 박스 형태의 제목을 출력합니다
pub fn print_boxed_title(title: &str) {
    // 고정 너비 50칸 사용 (박스 내부 콘텐츠)
    let content_width = 50;
    let border = "═".repeat(content_width);

    println!("╔{}╗", border);
    println!("║{:^49}║", title);  // ^49로 49칸 중앙 정렬
    println!("╚{}╝", border);
}

/// 백엔드 한 개의 상태 줄을 출력합니다
pub fn print_backend_status(name: &str, available: bool, fallback: &str) {
    if available {
        println!("   ├─ {}: ✓ 연결됨", name);
    } else {
        println!("   ├─ {}: ✗ 사용 불가 → {} 로 대체", name, fallback);
    }
}

/// 기동 요약을 출력합니다
pub fn print_startup_summary(cache_available: bool, session_primary_alive: bool, durable: &str) {
    println!();
    print_boxed_title("🛡️ RESILIENCE LAYER READY");
    print_backend_status("Shared cache (Redis)", cache_available, "cache miss 경로");
    print_backend_status("Session primary (Redis)", session_primary_alive, durable);
    println!("   └─ Durable store: {}", durable);
    println!();
}
