//! Benchmarks for the CPU-bound parts of a chat turn.
//!
//! Classification and context truncation run on every turn before the LLM
//! call, so both should stay well under a millisecond.

use std::time::Duration;

use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uuid::Uuid;

use somnia_chat::{ContextWindow, TopicClassifier};
use somnia_core::types::{Message, Role, TopicLabel};

const SAMPLE_MESSAGES: [&str; 6] = [
    "I keep waking up at 3am and lying awake for hours, is that insomnia?",
    "My partner says I snore and sometimes stop breathing at night.",
    "How does jet lag affect my body clock after a long flight east?",
    "What temperature should my bedroom be for the best sleep?",
    "Is it bad to look at my phone right before bed?",
    "Tell me something interesting.",
];

fn history(len: usize) -> Vec<Message> {
    let conversation_id = Uuid::new_v4();
    (0..len)
        .map(|i| Message {
            id: Uuid::new_v4(),
            conversation_id,
            seq: i as u64 + 1,
            role: if i % 2 == 0 { Role::User } else { Role::Assistant },
            content: SAMPLE_MESSAGES[i % SAMPLE_MESSAGES.len()].repeat(4),
            created_at: Utc::now(),
            topic: (i % 2 == 0).then_some(TopicLabel::General),
            is_error: false,
        })
        .collect()
}

fn bench_classifier(c: &mut Criterion) {
    let classifier = TopicClassifier::new();

    let mut group = c.benchmark_group("classifier");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("classify_mixed", |b| {
        let mut idx = 0usize;
        b.iter(|| {
            let text = SAMPLE_MESSAGES[idx % SAMPLE_MESSAGES.len()];
            idx += 1;
            black_box(classifier.classify(black_box(text)))
        })
    });

    // Worst case: nothing matches, every rule is scanned.
    let miss = "x".repeat(2000);
    group.bench_function("classify_no_match_2000_chars", |b| {
        b.iter(|| black_box(classifier.classify(black_box(&miss))))
    });

    group.finish();
}

fn bench_context_window(c: &mut Criterion) {
    let window = ContextWindow::new(10, 12_000, "You are a sleep science assistant.");

    let mut group = c.benchmark_group("context_window");
    for len in [10usize, 200, 2000] {
        let messages = history(len);
        group.bench_function(format!("build_history_{}", len), |b| {
            b.iter(|| black_box(window.build(black_box(&messages), "Any tips for napping?")))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classifier, bench_context_window);
criterion_main!(benches);
