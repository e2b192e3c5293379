use std::time::Duration;
use tickpool::prelude::*;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tickpool=debug".into()))
        .init();

    println!("=== Thread Pool ===\n");
    let pool = ThreadPool::with_workers(4, 16)?;

    let squares: Vec<_> = (1..=8u64)
        .map(|i| pool.execute_future(move || i * i))
        .collect::<Result<_>>()?;
    let values: Vec<u64> = squares.iter().map(|f| f.get()).collect::<Result<_>>()?;
    println!("Squares: {:?}", values);

    let failing = pool.execute_future(|| -> u64 { panic!("bad input") })?;
    println!("Panicking task: {:?}", failing.get());

    let stats = pool.metrics();
    println!(
        "Executed {} tasks, {} panicked, avg latency {:.1}us\n",
        stats.tasks_executed,
        stats.tasks_panicked,
        stats.avg_latency_ns as f64 / 1000.0
    );
    pool.close();

    println!("=== Scheduled Thread Pool ===\n");
    let config = Config::builder()
        .num_workers(2)
        .tick_interval(Duration::from_millis(100))
        .build()?;
    let sched = ScheduledThreadPool::new(&config)?;

    let (tx, rx) = crossbeam_channel::unbounded();
    for delay_ms in [300u64, 100, 200] {
        let tx = tx.clone();
        sched.schedule_once(
            move || tx.send(delay_ms).unwrap(),
            Duration::from_millis(delay_ms),
        );
    }
    drop(tx);

    for delay_ms in rx.iter().take(3) {
        println!("Task with {}ms delay ran", delay_ms);
    }
    println!("Current tick: {}", sched.current_tick());

    sched.close();
    Ok(())
}
