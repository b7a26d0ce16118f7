//! Performance benchmarks for the interview gateway
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::sync::Arc;
use std::time::Duration;

use interview_gateway::core::session::{
    CallRegistry, CallSession, DriverLauncher, Instruction, InstructionQueue, RecordingHandle,
};
use interview_gateway::core::transport::{DirectiveSettings, TwimlRenderer};
use interview_gateway::utils::{join_path, normalize_base_url};

struct NoopLauncher;

impl DriverLauncher for NoopLauncher {
    fn launch(&self, _session: Arc<CallSession>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async {})
    }
}

/// Benchmark the per-call instruction queue under the poll pattern
fn bench_instruction_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("instruction_queue");
    group.measurement_time(Duration::from_secs(5));

    for depth in [1usize, 8, 64] {
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_with_input(BenchmarkId::new("fill_and_drain", depth), &depth, |b, &depth| {
            let queue = InstructionQueue::new();
            b.iter(|| {
                for i in 0..depth {
                    if i % 4 == 0 {
                        queue.enqueue(Instruction::StartRecording);
                    } else {
                        queue.enqueue(Instruction::utter("다음 질문으로 넘어가겠습니다."));
                    }
                }
                while let Some(instruction) = queue.dequeue_next() {
                    black_box(instruction);
                }
            });
        });
    }

    group.bench_function("empty_poll", |b| {
        let queue = InstructionQueue::new();
        b.iter(|| black_box(queue.dequeue_next()));
    });

    group.finish();
}

/// Benchmark registry lookups and session churn
fn bench_registry(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();

    let mut group = c.benchmark_group("registry");
    group.measurement_time(Duration::from_secs(5));

    let registry = CallRegistry::new(Arc::new(NoopLauncher));
    let call_ids: Vec<String> = (0..1_000).map(|i| format!("CA{i:032}")).collect();
    for call_id in &call_ids {
        registry.get_or_create(call_id).unwrap();
    }

    group.bench_function("get_or_create_existing", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % call_ids.len();
            black_box(registry.get_or_create(&call_ids[i]).unwrap());
        });
    });

    group.bench_function("enqueue_dequeue", |b| {
        b.iter(|| {
            registry
                .enqueue(&call_ids[7], Instruction::utter("안녕하세요."))
                .unwrap();
            black_box(registry.dequeue_next(&call_ids[7]));
        });
    });

    group.bench_function("recording_round_trip", |b| {
        b.iter(|| {
            registry.begin_recording(&call_ids[9]).unwrap();
            registry.dequeue_next(&call_ids[9]);
            registry.complete_recording(
                &call_ids[9],
                RecordingHandle {
                    url: "https://api.twilio.com/2010-04-01/Recordings/RE1".to_string(),
                    duration_secs: 5,
                },
            );
            black_box(registry.recording_state(&call_ids[9]));
        });
    });

    group.bench_function("session_churn", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            let call_id = format!("CACHURN{n}");
            registry.get_or_create(&call_id).unwrap();
            black_box(registry.remove(&call_id));
        });
    });

    group.finish();
}

/// Benchmark TwiML rendering of poll replies
fn bench_twiml(c: &mut Criterion) {
    let mut group = c.benchmark_group("twiml");

    let renderer = TwimlRenderer::new(
        Some("https://voice.example.com".to_string()),
        DirectiveSettings::default(),
    );
    let short = Instruction::utter("성함이 어떻게 되시나요?");
    let long = Instruction::utter("가지고 계신 자격증이나 면허가 있으시면 말씀해주세요. ".repeat(20));

    group.bench_function("say_short", |b| {
        b.iter(|| black_box(renderer.poll_reply(Some(black_box(&short))).unwrap()));
    });
    group.bench_function("say_long", |b| {
        b.iter(|| black_box(renderer.poll_reply(Some(black_box(&long))).unwrap()));
    });
    group.bench_function("record", |b| {
        b.iter(|| black_box(renderer.poll_reply(Some(&Instruction::StartRecording)).unwrap()));
    });
    group.bench_function("pause", |b| {
        b.iter(|| black_box(renderer.poll_reply(None).unwrap()));
    });

    group.finish();
}

/// Benchmark base URL handling
fn bench_urls(c: &mut Criterion) {
    let mut group = c.benchmark_group("urls");

    group.bench_function("normalize_base_url", |b| {
        b.iter(|| black_box(normalize_base_url(black_box("https://voice.example.com/")).unwrap()));
    });
    group.bench_function("join_path", |b| {
        b.iter(|| black_box(join_path(black_box("https://voice.example.com"), "/voice")));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_instruction_queue,
    bench_registry,
    bench_twiml,
    bench_urls
);
criterion_main!(benches);
