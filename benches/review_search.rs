use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;

use reviews_rs::models::{CreateReviewRequest, Review};
use reviews_rs::repositories::InMemoryStore;
use reviews_rs::services::ReviewService;

const WORDS: [&str; 8] = [
    "cat", "ramen", "bakery", "quiet", "crowded", "spicy", "terrace", "brunch",
];

fn sample_reviews(count: usize) -> Vec<Review> {
    (0..count)
        .map(|i| Review {
            id: i as u64 + 1,
            image_url: None,
            author: format!("user{}", i % 50),
            title: format!("{} {} spot", WORDS[i % WORDS.len()], WORDS[(i / 3) % WORDS.len()]),
            content: format!(
                "Visited on day {}. The {} was memorable and the {} even more.",
                i,
                WORDS[(i + 2) % WORDS.len()],
                WORDS[(i + 5) % WORDS.len()]
            ),
            rate: dec!(4),
            like: 0,
        })
        .collect()
}

fn bench_matches_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("review_matches_query");

    for size in [100usize, 1_000, 10_000] {
        let reviews = sample_reviews(size);
        group.bench_with_input(BenchmarkId::new("reviews", size), &reviews, |b, reviews| {
            b.iter(|| {
                reviews
                    .iter()
                    .filter(|review| review.matches_query(black_box("CAT")))
                    .count()
            })
        });
    }

    group.finish();
}

fn bench_search_service(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("review_service_search");
    group.sample_size(30);
    group.measurement_time(Duration::from_secs(5));

    for size in [100usize, 1_000] {
        let service = rt.block_on(async {
            let service = ReviewService::new(Arc::new(InMemoryStore::new()));
            for review in sample_reviews(size) {
                service
                    .add_review(CreateReviewRequest {
                        image_url: None,
                        author: review.author,
                        title: review.title,
                        content: review.content,
                        rate: review.rate,
                    })
                    .await
                    .unwrap();
            }
            service
        });

        group.bench_with_input(BenchmarkId::new("reviews", size), &service, |b, service| {
            b.iter(|| rt.block_on(service.search_reviews(black_box("terrace"))).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_matches_query, bench_search_service);
criterion_main!(benches);
