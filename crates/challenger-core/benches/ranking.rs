use std::collections::BTreeSet;

use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use challenger_core::model::{AssessmentDefinition, CompletionRecord, DifficultyTier};
use challenger_core::proficiency;
use challenger_core::profile::UserProfile;
use challenger_core::recommend::{RankOptions, Scorer};

const CATEGORIES: [&str; 6] = ["frontend", "backend", "data", "devops", "mobile", "security"];
const SKILLS: [&str; 8] = ["React", "JS", "Rust", "SQL", "Go", "Docker", "Kotlin", "TLS"];

fn make_catalog(n: usize) -> Vec<AssessmentDefinition> {
    let now = Utc::now();
    (0..n)
        .map(|i| AssessmentDefinition {
            id: format!("a{i:05}"),
            title: format!("Assessment {i}"),
            category: CATEGORIES[i % CATEGORIES.len()].to_string(),
            skills: (0..3)
                .map(|k| SKILLS[(i + k * 3) % SKILLS.len()].to_string())
                .collect::<BTreeSet<_>>(),
            difficulty: DifficultyTier::ALL[i % 4],
            time_limit_secs: Some(600),
            passing_score: 70,
            popularity: (i as u64 * 7919) % 5000,
            created_at: now - Duration::days((i % 90) as i64),
            question_count: 10,
        })
        .collect()
}

fn make_history(n: usize) -> Vec<CompletionRecord> {
    (0..n)
        .map(|i| CompletionRecord {
            assessment_id: format!("a{:05}", i * 3),
            score: 60 + (i % 40) as u8,
            attempt_number: 1,
            completed_at: Utc::now(),
        })
        .collect()
}

fn bench_tier(c: &mut Criterion) {
    let history = make_history(200);
    c.bench_function("proficiency_tier/200", |b| {
        b.iter(|| proficiency::tier(black_box(&history)))
    });
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");
    let scorer = Scorer::default();
    let options = RankOptions::default();

    for size in [100usize, 1_000, 10_000] {
        let catalog = make_catalog(size);
        let history = make_history(size / 10);
        let profile = UserProfile::build(&catalog, &history, &[]);

        group.bench_function(format!("catalog={size}"), |b| {
            b.iter(|| scorer.rank(black_box(&catalog), black_box(&profile), &options))
        });
    }

    group.finish();
}

fn bench_profile(c: &mut Criterion) {
    let catalog = make_catalog(1_000);
    let history = make_history(100);
    let favorites: Vec<String> = (0..20).map(|i| format!("a{:05}", i * 7)).collect();

    c.bench_function("profile_build/1000", |b| {
        b.iter(|| UserProfile::build(black_box(&catalog), black_box(&history), &favorites))
    });
}

criterion_group!(benches, bench_tier, bench_rank, bench_profile);
criterion_main!(benches);
