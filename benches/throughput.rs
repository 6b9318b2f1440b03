//! CRC, frame and event queue throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rs485_node_core::checksum;
use rs485_node_core::link::ModbusLink;
use rs485_node_core::sim::{SimClock, SimTransport};
use rs485_node_core::{Event, EventQueue, Frame, LinkConfig, LinkEvent};

fn benchmark_crc(c: &mut Criterion) {
    let mut group = c.benchmark_group("crc");

    for size in [6usize, 16, 38].iter() {
        let data: Vec<u8> = (0..*size).map(|i| i as u8).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &data, |b, data| {
            b.iter(|| checksum::compute(black_box(data)));
        });
    }

    group.finish();
}

fn benchmark_frame_verify(c: &mut Criterion) {
    let frame = Frame::from_hex("1103006B00037687").unwrap();
    c.bench_function("frame_verify", |b| {
        b.iter(|| black_box(&frame).verify());
    });
}

fn benchmark_event_queue(c: &mut Criterion) {
    let queue: EventQueue<16> = EventQueue::new();
    c.bench_function("event_queue_fill_drain", |b| {
        b.iter(|| {
            for i in 0..16u8 {
                queue.enqueue(Event::new(10, i, 0));
            }
            while let Some(ev) = queue.dequeue() {
                black_box(ev);
            }
        });
    });
}

fn benchmark_link_receive(c: &mut Criterion) {
    let port = SimTransport::new();
    let clock = SimClock::new();
    let config = LinkConfig::new().with_slave_id(0x11);
    let mut link = ModbusLink::new(port.clone(), clock.clone(), |_: LinkEvent, _: &[u8]| {}, config).unwrap();
    let request = Frame::from_hex("1103006B00037687").unwrap();

    c.bench_function("link_receive_request", |b| {
        b.iter(|| {
            port.inject(request.as_slice());
            while port.pending_rx() > 0 {
                link.service();
                clock.advance_us(100);
            }
            clock.advance_us(2_000);
            link.service();
        });
    });
}

criterion_group!(
    benches,
    benchmark_crc,
    benchmark_frame_verify,
    benchmark_event_queue,
    benchmark_link_receive
);
criterion_main!(benches);
