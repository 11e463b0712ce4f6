use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use stash_core::{
    Document, ExtractorConfig, FetchContext, LocatorConfig, SanitizeConfig, cleanup_markdown, extract_html,
    locate_main_content, sanitize_html,
};

fn article() -> String {
    std::fs::read_to_string("../../tests/fixtures/article.html").unwrap()
}

/// The fixture article repeated `n` times inside one page.
fn long_page(n: usize) -> String {
    let html = article();
    let body_start = html.find("<body>").unwrap() + "<body>".len();
    let body_end = html.find("</body>").unwrap();
    let body = &html[body_start..body_end];
    format!("<html><head><title>Long</title></head><body>{}</body></html>", body.repeat(n))
}

fn bench_sanitize(c: &mut Criterion) {
    let small = article();
    let large = long_page(40);
    let config = SanitizeConfig::default();

    let mut group = c.benchmark_group("sanitize");
    group.bench_with_input(BenchmarkId::new("small", "1x"), &small, |b, html| {
        b.iter(|| sanitize_html(black_box(html), &config))
    });
    group.bench_with_input(BenchmarkId::new("large", "40x"), &large, |b, html| {
        b.iter(|| sanitize_html(black_box(html), &config))
    });
    group.finish();
}

fn bench_locate(c: &mut Criterion) {
    let doc = Document::parse(&long_page(10)).unwrap();
    let config = LocatorConfig::default();

    c.bench_function("locate_main_content", |b| b.iter(|| locate_main_content(black_box(&doc), &config)));
}

fn bench_full_extraction(c: &mut Criterion) {
    let html = article();
    let ctx = FetchContext::from_url_str("https://travel.example.com/notes/slow.html").unwrap();
    let config = ExtractorConfig::default();

    c.bench_function("full_extraction", |b| b.iter(|| extract_html(black_box(&html), &ctx, &config)));
}

fn bench_cleanup(c: &mut Criterion) {
    let text = "# Intro\nThe experi-\nment  worked .\nwrapped line\n\n\n\n".repeat(200);

    c.bench_function("pdf_cleanup", |b| b.iter(|| cleanup_markdown(black_box(&text))));
}

criterion_group!(benches, bench_sanitize, bench_locate, bench_full_extraction, bench_cleanup);
criterion_main!(benches);
