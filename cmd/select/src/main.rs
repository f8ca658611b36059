//! Select loop example
//!
//! Two producer threads feed channels of different types while the main
//! thread runs a `for { select { ... } }` loop with a default branch.

use chansel::{case, default_case, Channel, ChannelConfig, Selected, Selector};
use std::cell::Cell;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== chansel Select Example ===\n");

    let numbers = Channel::<i32>::with_config(ChannelConfig::from_env())?;
    let words = Channel::<String>::bounded(4)?;
    let quit = Channel::<()>::bounded(1)?;

    println!("numbers: {:?}", numbers);
    println!("words:   {:?}\n", words);

    let producers = vec![
        {
            let numbers = numbers.clone();
            thread::spawn(move || {
                for i in 1..=5 {
                    numbers.put(i).ok();
                    println!("[numbers] sent {}", i);
                    thread::sleep(Duration::from_millis(3));
                }
            })
        },
        {
            let words = words.clone();
            let quit = quit.clone();
            thread::spawn(move || {
                for w in ["alpha", "beta", "gamma"] {
                    words.put(w.to_string()).ok();
                    println!("[words]   sent {}", w);
                    thread::sleep(Duration::from_millis(7));
                }
                thread::sleep(Duration::from_millis(20));
                quit.put(()).ok();
            })
        },
    ];

    let idle = Cell::new(0u32);
    let done = Cell::new(false);

    let mut sel = Selector::builder()
        .case(case(&numbers, |n| println!("[select]  number {}", n)))
        .case(case(&words, |w| println!("[select]  word {}", w)))
        .case(case(&quit, |_| done.set(true)))
        .default_case(default_case(|| {
            idle.set(idle.get() + 1);
            thread::sleep(Duration::from_millis(1));
        }))
        .build()?;

    let mut missed = 0;
    while !done.get() {
        if let Selected::Missed(_) = sel.select()? {
            missed += 1;
        }
    }
    drop(sel);

    for p in producers {
        p.join().ok();
    }

    println!("\nidle rounds: {}, missed claims: {}", idle.get(), missed);
    println!("\n=== Example Complete ===");
    Ok(())
}
