use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};

use switchex_core::{Condition, Phase, Snapshot, Stimulus, TaskType};
use switchex_render::SkiaRenderer;
use switchex_render::layout::{HEIGHT, WIDTH};

fn running_snapshot() -> Snapshot {
    Snapshot {
        phase: Phase::Running,
        condition_index: 4,
        condition_total: 9,
        condition: Some(Condition {
            complexity: 2,
            interval_secs: 20,
        }),
        task: TaskType::CountNonTargets,
        stimulus: Stimulus::new("3814327190".to_string(), vec![1, 3]),
        input: "6".to_string(),
        phase_remaining: Duration::from_secs(75),
        block_elapsed: Duration::from_secs(45),
        block_total: Duration::from_secs(120),
        switch_flash: true,
        trials_completed: 12,
        tutorial: None,
    }
}

fn bench_render_frame(c: &mut Criterion) {
    let mut renderer = SkiaRenderer::new().expect("renderer");
    let snapshot = running_snapshot();
    let mut frame = vec![0u8; (WIDTH * HEIGHT * 4) as usize];

    c.bench_function("render_running_frame", |b| {
        b.iter(|| renderer.render_frame(&snapshot, &mut frame).unwrap());
    });
}

criterion_group!(benches, bench_render_frame);
criterion_main!(benches);
