use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::thread;

use apex_router::routing::path::{
    CandidateRef, ChoosePolicy, LatencyAwarePolicy, MetricsSlot, PacketContext, PathMetrics,
};
use apex_router::{PacketPool, SpscRing};

fn bench_spsc_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_ring");

    group.bench_function("push_pop_pair", |b| {
        let ring = SpscRing::with_capacity(1024).unwrap();
        b.iter(|| {
            ring.push(black_box(42u32)).unwrap();
            black_box(ring.pop().unwrap());
        });
    });

    group.bench_function("cross_thread_1m_u32", |b| {
        b.iter(|| {
            const N: usize = 1_000_000;
            let ring = Arc::new(SpscRing::<u32>::with_capacity(1024).unwrap());
            let producer = {
                let ring = ring.clone();
                thread::spawn(move || {
                    let mut i = 0u32;
                    while (i as usize) < N {
                        if ring.push(i).is_ok() {
                            i += 1;
                        } else {
                            std::hint::spin_loop();
                        }
                    }
                })
            };
            let mut consumed = 0usize;
            while consumed < N {
                if let Some(v) = ring.pop() {
                    black_box(v);
                    consumed += 1;
                } else {
                    std::hint::spin_loop();
                }
            }
            producer.join().unwrap();
        });
    });

    group.finish();
}

fn bench_packet_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_pool");

    group.bench_function("acquire_release", |b| {
        let pool = PacketPool::new(1024).unwrap();
        b.iter(|| {
            let h = pool.acquire().unwrap();
            pool.release(black_box(h));
        });
    });

    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_selection");

    let slots: Vec<MetricsSlot> = (0..8).map(|_| MetricsSlot::new()).collect();
    for (i, slot) in slots.iter().enumerate() {
        slot.update(PathMetrics {
            rtt_us: 1_000 + (i as u32) * 100,
            one_way_delay_us: 500,
            loss_ppm: 0,
            avail_kbps: 10_000,
            qos_class: (i % 2) as u8,
            healthy: true,
        });
    }
    let cands: Vec<CandidateRef<'_>> = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| CandidateRef {
            id: (i + 1) as u32,
            slot,
        })
        .collect();

    group.bench_function("latency_aware_8_candidates", |b| {
        let policy = LatencyAwarePolicy::default();
        let pkt = PacketContext {
            flow_hash: 0xDEAD_BEEF,
            dscp: 0x2E,
        };
        b.iter(|| black_box(policy.choose(black_box(&cands), &pkt)));
    });

    group.finish();
}

criterion_group!(benches, bench_spsc_ring, bench_packet_pool, bench_selection);
criterion_main!(benches);
