use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use scrim::{
    BackdropMode, DialogConfig, DialogEnv, DialogManager, MemoryPage, ModalSize, OverlayDirection,
    TEARDOWN_DELAY, WindowAccessor,
};

fn build_manager() -> (DialogManager, Arc<MemoryPage>) {
    let page = Arc::new(MemoryPage::with_location("https://bench.example/home"));
    let env = DialogEnv::new(WindowAccessor::attached(page.clone()));
    (DialogManager::new(env), page)
}

fn open_fully(manager: &mut DialogManager, now: Instant) {
    manager.frame(now);
    manager.frame(now);
    manager.pump_at(now);
}

fn manager_open_close_churn(c: &mut Criterion) {
    c.bench_function("manager_open_close_churn", |b| {
        b.iter(|| {
            let (mut manager, _page) = build_manager();
            let mut now = Instant::now();
            for round in 0..8u32 {
                let config = if round % 2 == 0 {
                    DialogConfig::modal(ModalSize::Md).backdrop(BackdropMode::Dismissible)
                } else {
                    DialogConfig::overlay(OverlayDirection::Right, "475px")
                };
                let handle = manager.open(config);
                open_fully(&mut manager, now);
                handle.close(Some(serde_json::json!(round)));
                manager.pump_at(now);
                now += TEARDOWN_DELAY + Duration::from_millis(1);
                manager.pump_at(now);
            }
            black_box(manager.instance_count())
        });
    });
}

fn stacked_escape_script(c: &mut Criterion) {
    let escape = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
    c.bench_function("stacked_escape_script", |b| {
        b.iter(|| {
            let (mut manager, _page) = build_manager();
            let mut now = Instant::now();
            for _ in 0..3 {
                manager.open(DialogConfig::modal(ModalSize::Md));
                open_fully(&mut manager, now);
            }
            for _ in 0..3 {
                manager.handle_key(black_box(&escape), now);
                manager.pump_at(now);
                now += TEARDOWN_DELAY + Duration::from_millis(1);
                manager.pump_at(now);
            }
            black_box(manager.instance_count())
        });
    });
}

criterion_group!(benches, manager_open_close_churn, stacked_escape_script);
criterion_main!(benches);
