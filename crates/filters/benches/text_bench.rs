use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use reviewclean_filters::language::{LanguageFilter, LanguageFilterConfig};
use reviewclean_filters::sentiment::SentimentRules;
use reviewclean_filters::text_preprocessing::TextNormalizer;

fn sample_reviews() -> Vec<&'static str> {
    vec![
        "Good product, works as expected. Charging is fast.",
        "<br>Value for money!! See https://amzn.in/d/abc for details",
        "Cable stopped working after 2 weeks... very disappointed",
        "Great product, बहुत अच्छा है. Delivery was quick.",
        "   Multiple   spaces   and   tabs\t\there   ",
        "Price: ₹399 (50% off!) Worth it.",
    ]
}

fn bench_text_normalization(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_normalization");
    let texts = sample_reviews();

    group.throughput(Throughput::Elements(texts.len() as u64));
    group.bench_function("full", |b| {
        let normalizer = TextNormalizer::full();
        b.iter(|| {
            for text in &texts {
                black_box(normalizer.normalize(text));
            }
        });
    });

    group.bench_function("conservative", |b| {
        let normalizer = TextNormalizer::conservative();
        b.iter(|| {
            for text in &texts {
                black_box(normalizer.normalize(text));
            }
        });
    });

    group.bench_function("full_with_reuse", |b| {
        let normalizer = TextNormalizer::full();
        let mut buffer = String::new();
        b.iter(|| {
            for text in &texts {
                normalizer.normalize_into(text, &mut buffer);
                black_box(&buffer);
            }
        });
    });

    group.finish();
}

fn bench_language_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("language_filter");

    let documents: Vec<String> = (0..1000)
        .map(|i| {
            format!(
                "Review {} says the charger works well. यह बहुत अच्छा है {}",
                i,
                i * 7
            )
        })
        .collect();

    group.throughput(Throughput::Elements(documents.len() as u64));
    group.bench_function("1000_mixed_script_fields", |b| {
        let filter = LanguageFilter::new(LanguageFilterConfig::english_only()).unwrap();
        b.iter(|| {
            for doc in &documents {
                black_box(filter.filter_text(doc));
            }
        });
    });

    group.finish();
}

fn bench_sentiment(c: &mut Criterion) {
    let rules = SentimentRules::default();
    let ratings = ["4.2", "3.0", "1", "|", "", "5.0", "2.999"];

    c.bench_function("sentiment_annotate", |b| {
        b.iter(|| {
            for raw in &ratings {
                black_box(rules.annotate(Some(raw)));
            }
        });
    });
}

criterion_group!(benches, bench_text_normalization, bench_language_filter, bench_sentiment);
criterion_main!(benches);
