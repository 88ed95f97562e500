use common::{CatalogItem, ItemId, ItemPatch, UpdateRequest};
use criterion::{Criterion, criterion_group, criterion_main};
use rust_decimal::Decimal;
use storage::{CatalogStore, InMemoryCatalogStore};

fn catalog(size: usize) -> InMemoryCatalogStore {
    InMemoryCatalogStore::with_items((0..size).map(|i| {
        CatalogItem::new(
            format!("{i}"),
            if i % 2 == 0 { "fiction" } else { "history" },
            format!("Book {i}"),
            Decimal::from(10),
            100,
        )
    }))
}

fn bench_get(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = catalog(1_000);
    let id = ItemId::new("500");

    c.bench_function("catalog_store/get", |b| {
        b.iter(|| rt.block_on(async { store.get(&id).await.unwrap() }));
    });
}

fn bench_blind_update(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = catalog(1_000);
    let id = ItemId::new("500");
    let request = UpdateRequest::blind(ItemPatch::stock(42));

    c.bench_function("catalog_store/blind_update", |b| {
        b.iter(|| rt.block_on(async { store.update(&id, &request).await.unwrap() }));
    });
}

fn bench_search(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = catalog(1_000);

    c.bench_function("catalog_store/search_1000", |b| {
        b.iter(|| rt.block_on(async { store.search("fiction").await.unwrap() }));
    });
}

criterion_group!(benches, bench_get, bench_blind_update, bench_search);
criterion_main!(benches);
