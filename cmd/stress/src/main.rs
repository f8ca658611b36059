//! Stress test - many selectors racing on shared channels
//!
//! Usage: stress [items] [selectors] [channels]
//!
//! Producers spread `items` values over `channels` channels. `selectors`
//! threads each run a select loop over every channel. Every value must be
//! delivered to exactly one handler.

use chansel::{Channel, Selected, Selector};
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn arg(n: usize, default: usize) -> usize {
    std::env::args()
        .nth(n)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn main() {
    println!("=== chansel Stress Test ===\n");

    let items = arg(1, 200_000);
    let selectors = arg(2, 8).max(1);
    let channels = arg(3, 4).max(1);

    println!("{} items, {} selectors, {} channels", items, selectors, channels);

    let chans: Vec<Channel<usize>> = (0..channels)
        .map(|_| Channel::bounded(256).expect("eventfd"))
        .collect();

    let delivered = Arc::new(SegQueue::new());
    let remaining = Arc::new(AtomicUsize::new(items));
    let missed = Arc::new(AtomicU64::new(0));

    let start = Instant::now();

    let consumers: Vec<_> = (0..selectors)
        .map(|_| {
            let chans = chans.clone();
            let delivered = Arc::clone(&delivered);
            let remaining = Arc::clone(&remaining);
            let missed = Arc::clone(&missed);
            thread::spawn(move || {
                let mut builder = Selector::builder();
                for ch in &chans {
                    let delivered = Arc::clone(&delivered);
                    let remaining = Arc::clone(&remaining);
                    builder = builder.recv(ch, move |v| {
                        delivered.push(v);
                        remaining.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                let mut sel = builder.build().expect("selector");

                while remaining.load(Ordering::Relaxed) > 0 {
                    let outcome = sel.select_timeout(Duration::from_millis(10)).expect("select");
                    if let Selected::Missed(_) = outcome {
                        missed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    let producers: Vec<_> = chans
        .iter()
        .enumerate()
        .map(|(c, ch)| {
            let ch = ch.clone();
            thread::spawn(move || {
                let mut v = c;
                while v < items {
                    ch.put(v).expect("put");
                    v += channels;
                }
            })
        })
        .collect();

    for p in producers {
        p.join().unwrap();
    }
    for c in consumers {
        c.join().unwrap();
    }

    let elapsed = start.elapsed();

    let mut seen = vec![false; items];
    let mut count = 0;
    while let Some(v) = delivered.pop() {
        assert!(!seen[v], "value {} delivered twice", v);
        seen[v] = true;
        count += 1;
    }
    assert_eq!(count, items, "lost values");

    println!("\nDelivered: {} (each exactly once)", count);
    println!("Missed claims: {}", missed.load(Ordering::Relaxed));
    println!("Time: {:?}", elapsed);
    println!(
        "Rate: {:.0} items/sec",
        items as f64 / elapsed.as_secs_f64()
    );
    println!("\n=== Stress Test Complete ===");
}
