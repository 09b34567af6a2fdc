use barsync_core::views::{merge_sources, UnifiedEntity};
use barsync_core::{
    BusinessDateRange, BusinessDayCalendar, OperatorScope, RevenueCalculator, RevenueInputs,
    StatsQuery,
};
use barsync_domain::{
    CreateSalePayload, OperationPayload, PaymentMethod, PendingOperation, RecentlySyncedEntry,
    Sale, SaleItemInput,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const BAR: &str = "0191d3a4-6f1e-7c3b-9a57-3f1b2c4d5e6f";
const SELLER: &str = "0191d3a4-6f1e-7c3b-9a57-000000000001";
const PRODUCT: &str = "0191d3a4-6f1e-7c3b-9a57-000000000002";

fn payload(key: String, total: f64) -> CreateSalePayload {
    CreateSalePayload {
        idempotency_key: key,
        bar_id: BAR.to_string(),
        items: vec![SaleItemInput {
            product_id: PRODUCT.to_string(),
            product_name: None,
            quantity: 2,
            unit_price: total / 2.0,
        }],
        total,
        payment_method: PaymentMethod::MobileMoney,
        sold_by: SELLER.to_string(),
        server_id: None,
        ticket_id: None,
        promotion_ids: Vec::new(),
        notes: None,
    }
}

/// One evening of sales: most authoritative, some buffered, some queued,
/// with overlapping keys between the sources.
fn evening(count: usize) -> (Vec<Sale>, Vec<RecentlySyncedEntry>, Vec<PendingOperation>) {
    let opening = Utc.with_ymd_and_hms(2026, 3, 4, 18, 0, 0).unwrap();
    let mut sales = Vec::with_capacity(count);
    let mut buffer = Vec::new();
    let mut pending = Vec::new();

    for idx in 0..count {
        let at = opening + Duration::seconds(idx as i64 * 7);
        let key = format!("sale-{idx}");
        let payload = payload(key.clone(), 500.0 + (idx % 20) as f64 * 250.0);
        let op = PendingOperation::new_at(
            format!("tmp_{idx}"),
            OperationPayload::CreateSale(payload.clone()),
            at,
        );

        if idx % 10 < 8 {
            let mut sale = payload.to_optimistic_sale(&format!("s-{idx}"), at);
            sale.status = barsync_domain::SaleStatus::Validated;
            sales.push(sale);
        }
        if idx % 10 >= 7 {
            buffer.push(RecentlySyncedEntry {
                idempotency_key: key,
                total: payload.total,
                synced_at: at,
                operation: op.clone(),
                server_data: None,
            });
        }
        if idx % 10 == 9 {
            pending.push(op);
        }
    }
    (sales, buffer, pending)
}

fn revenue_benchmark(c: &mut Criterion) {
    let calculator =
        RevenueCalculator::new(BusinessDayCalendar::new(6, chrono_tz::Africa::Abidjan).unwrap());
    let query = StatsQuery::new(
        BusinessDateRange::single(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap()),
        OperatorScope::All,
    );

    let mut group = c.benchmark_group("revenue_calculator");
    group.sample_size(20).measurement_time(std::time::Duration::from_secs(10));

    for count in [500_usize, 5_000] {
        let (sales, buffer, pending) = evening(count);
        group.bench_function(format!("calculate_{count}"), |b| {
            b.iter(|| {
                let inputs = RevenueInputs {
                    sales: &sales,
                    returns: &[],
                    recently_synced: &buffer,
                    pending: &pending,
                };
                black_box(calculator.calculate(&inputs, &query));
            });
        });
    }

    let (sales, buffer, pending) = evening(5_000);
    group.bench_function("merge_sources_5000", |b| {
        b.iter(|| {
            let authoritative = sales.iter().cloned().map(UnifiedEntity::authoritative).collect();
            let synced = buffer
                .iter()
                .filter_map(|entry| match &entry.operation.operation {
                    OperationPayload::CreateSale(p) => Some(UnifiedEntity::recently_synced(
                        p.to_optimistic_sale(&entry.operation.id, entry.operation.timestamp),
                        &entry.operation.id,
                    )),
                    _ => None,
                })
                .collect();
            let offline = pending
                .iter()
                .filter_map(|op| match &op.operation {
                    OperationPayload::CreateSale(p) => Some(UnifiedEntity::offline(
                        p.to_optimistic_sale(&op.id, op.timestamp),
                        &op.id,
                        false,
                    )),
                    _ => None,
                })
                .collect();
            black_box(merge_sources(authoritative, synced, offline));
        });
    });

    group.finish();
}

criterion_group!(core_benchmarks, revenue_benchmark);
criterion_main!(core_benchmarks);
