//! 터미널 출력 포맷팅 유틸리티
//!
//! 복제 서비스 시작 과정에서 사용되는 터미널 출력 함수들을 제공합니다.
//! 박스 형태의 제목, 진행 단계 표시, 큐 바인딩 요약 등을 시각적으로 표현합니다.

/// 박스 형태로 둘러싸인 제목을 출력합니다
///
/// 텍스트는 자동으로 중앙 정렬됩니다.
///
/// Output:
/// ```text
/// ╔══════════════════════════════════════════════════╗
/// ║              Catalog Replication                 ║
/// ╚══════════════════════════════════════════════════╝
/// ```
pub fn print_boxed_title(title: &str) {
    // 고정 너비 50칸 사용 (박스 내부 콘텐츠)
    let content_width = 50;
    let border = "═".repeat(content_width);

    println!("╔{}╗", border);
    println!("║{:^49}║", title);
    println!("╚{}╝", border);
}

/// 진행 단계 시작을 표시합니다
///
/// ```text
/// → Step 1: Connecting to MongoDB
/// ```
pub fn print_step_start(step: u8, description: &str) {
    println!("→ Step {}: {}", step, description);
}

/// 진행 단계 완료와 처리된 항목 수를 표시합니다
///
/// ```text
/// ✓ Step 3: In-flight messages recovered (2 items)
/// ```
pub fn print_step_complete(step: u8, description: &str, count: usize) {
    println!("✓ Step {}: {} ({} items)", step, description, count);
}

/// 서브 작업의 상태를 표시합니다
pub fn print_sub_task(name: &str, status: &str) {
    println!("   ├─ {}: {}", name, status);
}

/// 수신자가 바인딩된 큐를 표시합니다
///
/// ```text
///    ├─ course: course-replication (dlq: course-replication.dlq)
///    ├─ lesson: lesson-replication (dlq: off)
/// ```
pub fn print_queue_binding(kind: &str, queue: &str, dead_letter_queue: Option<&str>) {
    println!(
        "   ├─ {}: {} (dlq: {})",
        kind,
        queue,
        dead_letter_queue.unwrap_or("off")
    );
}

/// 최종 시작 요약을 출력합니다
///
/// ```text
/// ╔══════════════════════════════════════════════════╗
/// ║          🎉 REPLICATION PIPELINE STARTED         ║
/// ╚══════════════════════════════════════════════════╝
///    📥 Consumers: 3
///    ♻️ Recovered messages: 2
///    ⏱️ Receive timeout: 20s
/// ```
pub fn print_final_summary(consumers: usize, recovered: usize, receive_timeout_secs: u64) {
    println!();
    print_boxed_title("🎉 REPLICATION PIPELINE STARTED");
    println!("   📥 Consumers: {}", consumers);
    println!("   ♻️ Recovered messages: {}", recovered);
    println!("   ⏱️ Receive timeout: {}s", receive_timeout_secs);
    println!();
}
