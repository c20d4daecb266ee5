//! Byte ring throughput and round-trip latency benchmark.
//!
//! Usage:
//!     cargo run --release --bin ring_bench
//!
//! Environment variables:
//!     PRODUCER_CPU=0  Pin producer to CPU 0 (default: 0)
//!     CONSUMER_CPU=2  Pin consumer to CPU 2 (default: 2)

use std::env;
use std::hint;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use styx::channel;

const RING_CAPACITY: usize = 1 << 20;
const CHUNK_LEN: usize = 64;
const TOTAL_BYTES: usize = 1 << 28;
const RTT_ITERATIONS: usize = 1 << 20;
const PING_LEN: usize = 8;

fn get_cpu_affinity() -> (Option<usize>, Option<usize>) {
    let producer_cpu = env::var("PRODUCER_CPU")
        .ok()
        .and_then(|s| s.parse().ok())
        .or(Some(0));
    let consumer_cpu = env::var("CONSUMER_CPU")
        .ok()
        .and_then(|s| s.parse().ok())
        .or(Some(2));
    (producer_cpu, consumer_cpu)
}

fn pin_to_cpu(cpu: Option<usize>) {
    if let Some(id) = cpu {
        core_affinity::set_for_current(core_affinity::CoreId { id });
    }
}

fn bench_throughput(producer_cpu: Option<usize>, consumer_cpu: Option<usize>) {
    let (mut tx, mut rx) = channel(RING_CAPACITY);

    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = ready.clone();

    // Consumer thread
    let consumer_thread = std::thread::spawn(move || {
        pin_to_cpu(consumer_cpu);

        // Signal ready
        ready_clone.store(true, Ordering::Release);

        let mut buf = vec![0u8; 64 * 1024];
        let mut expected: u8 = 0;
        let mut received = 0usize;
        while received < TOTAL_BYTES {
            match rx.read(&mut buf) {
                Ok(n) => {
                    for &byte in &buf[..n] {
                        if byte != expected {
                            panic!("data corruption: expected {expected}, got {byte}");
                        }
                        expected = expected.wrapping_add(1);
                    }
                    received += n;
                }
                Err(_) => hint::spin_loop(),
            }
        }
    });

    // Wait for consumer to be ready
    while !ready.load(Ordering::Acquire) {
        hint::spin_loop();
    }

    pin_to_cpu(producer_cpu);

    let mut chunk = [0u8; CHUNK_LEN];
    let mut next: u8 = 0;
    let mut sent = 0usize;

    let start = Instant::now();

    while sent < TOTAL_BYTES {
        for byte in &mut chunk {
            *byte = next;
            next = next.wrapping_add(1);
        }
        while tx.write(&chunk).is_err() {
            hint::spin_loop();
        }
        sent += CHUNK_LEN;
    }

    consumer_thread.join().unwrap();
    let elapsed = start.elapsed();

    let mib_per_s = (TOTAL_BYTES as f64 / (1024.0 * 1024.0)) / elapsed.as_secs_f64();
    let chunks_per_ms = (TOTAL_BYTES / CHUNK_LEN) as u128 * 1_000_000 / elapsed.as_nanos();
    println!("{mib_per_s:.0} MiB/s ({chunks_per_ms} chunks/ms)");
}

fn bench_rtt(producer_cpu: Option<usize>, consumer_cpu: Option<usize>) {
    let (mut ping_tx, mut ping_rx) = channel(RING_CAPACITY);
    let (mut pong_tx, mut pong_rx) = channel(RING_CAPACITY);

    let ready = Arc::new(AtomicBool::new(false));
    let ready_clone = ready.clone();

    // Responder thread: echo every ping back on the pong channel
    let responder = std::thread::spawn(move || {
        pin_to_cpu(consumer_cpu);

        // Signal ready
        ready_clone.store(true, Ordering::Release);

        let mut buf = [0u8; PING_LEN];
        for _ in 0..RTT_ITERATIONS {
            loop {
                match ping_rx.read(&mut buf) {
                    Ok(n) => {
                        while pong_tx.write(&buf[..n]).is_err() {
                            hint::spin_loop();
                        }
                        break;
                    }
                    Err(_) => hint::spin_loop(),
                }
            }
        }
    });

    // Wait for responder to be ready
    while !ready.load(Ordering::Acquire) {
        hint::spin_loop();
    }

    pin_to_cpu(producer_cpu);

    let ping = [0xA5u8; PING_LEN];
    let mut buf = [0u8; PING_LEN];

    let start = Instant::now();

    for _ in 0..RTT_ITERATIONS {
        while ping_tx.write(&ping).is_err() {
            hint::spin_loop();
        }
        let mut got = 0;
        while got < PING_LEN {
            match pong_rx.read(&mut buf[got..]) {
                Ok(n) => got += n,
                Err(_) => hint::spin_loop(),
            }
        }
    }

    let elapsed = start.elapsed();
    responder.join().unwrap();

    let rtt_ns = elapsed.as_nanos() / RTT_ITERATIONS as u128;
    println!("{rtt_ns} ns RTT ({PING_LEN}-byte ping)");
}

fn main() {
    let (producer_cpu, consumer_cpu) = get_cpu_affinity();

    println!(
        "styx byte ring (capacity={}, total={} MiB, chunk={}):",
        RING_CAPACITY,
        TOTAL_BYTES >> 20,
        CHUNK_LEN
    );
    bench_throughput(producer_cpu, consumer_cpu);
    bench_rtt(producer_cpu, consumer_cpu);
}
