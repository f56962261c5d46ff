use super::{PoolConfig, PoolError, PoolState, RateLimitedPool, TaskError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

fn pool(workers: usize, limit: usize, interval: Duration) -> RateLimitedPool {
    let config = PoolConfig::builder()
        .max_workers(workers)
        .max_per_interval(limit)
        .interval(interval)
        .build()
        .unwrap();
    RateLimitedPool::new(config).unwrap()
}

#[test]
fn test_basic_submission() {
    let pool = pool(2, 10, Duration::from_secs(60));
    assert_eq!(pool.state(), PoolState::Created);

    let handle = pool.submit(|| 40 + 2).unwrap();
    assert_eq!(pool.state(), PoolState::Accepting);
    assert_eq!(handle.join(), Ok(42));
}

#[test]
fn test_limit_submissions_do_not_block() {
    let pool = pool(2, 5, Duration::from_secs(60));

    let started = Instant::now();
    for i in 0..5 {
        pool.submit(move || i).unwrap();
    }
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(pool.stats().admitted_this_interval, 5);
    assert_eq!(pool.stats().throttled, 0);
}

#[test]
fn test_submission_over_quota_blocks_until_next_interval() {
    let interval = Duration::from_millis(300);
    let pool = pool(2, 3, interval);
    let started = Instant::now();
    let admitted_at = Arc::new(Mutex::new(Vec::new()));

    // Five tasks from one thread: three fit into the first interval
    for _ in 0..5 {
        pool.submit(|| ()).unwrap();
        admitted_at.lock().unwrap().push(started.elapsed());
    }

    let admitted_at = admitted_at.lock().unwrap();
    for (i, elapsed) in admitted_at.iter().take(3).enumerate() {
        assert!(*elapsed < interval, "task {} waited {:?}", i + 1, elapsed);
    }
    for (i, elapsed) in admitted_at.iter().skip(3).enumerate() {
        assert!(*elapsed >= interval, "task {} admitted after {:?}", i + 4, elapsed);
    }

    let stats = pool.stats();
    assert_eq!(stats.submitted, 5);
    assert_eq!(stats.throttled, 1);
    assert!(stats.resets >= 1);
}

#[test]
fn test_try_submit_reports_exhausted_quota() {
    let pool = pool(1, 2, Duration::from_secs(60));

    pool.try_submit(|| ()).unwrap();
    pool.try_submit(|| ()).unwrap();
    assert!(matches!(
        pool.try_submit(|| ()),
        Err(PoolError::QuotaExhausted)
    ));
    assert_eq!(pool.stats().submitted, 2);
}

#[test]
fn test_quota_never_exceeded_with_concurrent_submitters() {
    let interval = Duration::from_millis(250);
    let limit = 4;
    let pool = Arc::new(pool(4, limit, interval));
    let started = Instant::now();
    let admissions = Arc::new(Mutex::new(Vec::new()));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let admissions = Arc::clone(&admissions);
            thread::spawn(move || {
                for _ in 0..3 {
                    pool.submit(|| ()).unwrap();
                    admissions.lock().unwrap().push(started.elapsed());
                }
            })
        })
        .collect();
    for submitter in submitters {
        submitter.join().unwrap();
    }

    // Twelve submissions with a quota of four need at least two resets
    let admissions = admissions.lock().unwrap();
    assert_eq!(admissions.len(), 12);
    let in_first_interval = admissions.iter().filter(|t| **t < interval).count();
    assert!(in_first_interval <= limit, "{in_first_interval} admitted early");
    assert!(admissions.iter().any(|t| *t >= interval * 2));
}

#[test]
fn test_single_worker_runs_tasks_sequentially() {
    let pool = pool(1, 10, Duration::from_secs(60));
    let started = Instant::now();

    let first = pool
        .submit(move || {
            thread::sleep(Duration::from_millis(200));
            started.elapsed()
        })
        .unwrap();
    let second = pool.submit(move || started.elapsed()).unwrap();

    let first_finished = first.join().unwrap();
    let second_started = second.join().unwrap();
    assert!(second_started >= first_finished);
}

#[test]
fn test_shutdown_waits_for_every_task() {
    let pool = pool(2, 10, Duration::from_secs(60));
    let finished = Arc::new(AtomicUsize::new(0));

    let mut handles: Vec<_> = (0..6)
        .map(|_| {
            let finished = Arc::clone(&finished);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(50));
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        })
        .collect();

    pool.shutdown(true);
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(finished.load(Ordering::SeqCst), 6);
    assert!(handles.iter_mut().all(|h| h.is_finished()));
}

#[test]
fn test_shutdown_is_idempotent() {
    let pool = pool(1, 10, Duration::from_secs(60));
    pool.submit(|| ()).unwrap();

    pool.shutdown(true);
    pool.shutdown(true);
    pool.shutdown(false);
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_submit_after_shutdown_fails_immediately() {
    let pool = pool(1, 10, Duration::from_secs(60));
    pool.shutdown(false);

    assert!(matches!(pool.submit(|| ()), Err(PoolError::ShutDown)));
    assert!(matches!(pool.try_submit(|| ()), Err(PoolError::ShutDown)));
}

#[test]
fn test_shutdown_releases_blocked_submitter() {
    let pool = Arc::new(pool(1, 1, Duration::from_secs(60)));
    pool.submit(|| ()).unwrap();

    let blocked = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.submit(|| ()).map(|_| ()))
    };
    thread::sleep(Duration::from_millis(100));

    pool.shutdown(true);
    assert!(matches!(blocked.join().unwrap(), Err(PoolError::ShutDown)));
}

#[test]
fn test_shutdown_releases_submitter_waiting_on_full_queue() {
    let config = PoolConfig::builder()
        .max_workers(1)
        .max_per_interval(10)
        .queue_capacity(1)
        .build()
        .unwrap();
    let pool = RateLimitedPool::new(config).unwrap();

    let (started_tx, started_rx) = mpsc::channel();
    let running = pool
        .submit(move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(400));
        })
        .unwrap();
    started_rx.recv().unwrap();
    let queued = pool.submit(|| ()).unwrap();

    thread::scope(|s| {
        let waiting = s.spawn(|| pool.submit(|| ()).map(|_| ()));
        thread::sleep(Duration::from_millis(100));
        assert!(!waiting.is_finished());

        pool.shutdown(false);
        assert_eq!(pool.state(), PoolState::Stopped);
        assert!(matches!(waiting.join().unwrap(), Err(PoolError::ShutDown)));
    });

    assert_eq!(running.join(), Ok(()));
    assert_eq!(queued.join(), Ok(()));
    assert_eq!(pool.stats().submitted, 2);
}

#[test]
fn test_concurrent_shutdown_waits_for_running_task() {
    let pool = pool(1, 10, Duration::from_secs(60));
    let finished = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&finished);
    pool.submit(move || {
        thread::sleep(Duration::from_millis(400));
        flag.store(true, Ordering::SeqCst);
    })
    .unwrap();

    thread::scope(|s| {
        s.spawn(|| pool.shutdown(true));
        thread::sleep(Duration::from_millis(50));

        pool.shutdown(true);
        assert!(finished.load(Ordering::SeqCst));
        assert_eq!(pool.state(), PoolState::Stopped);
    });
}

#[test]
fn test_drop_after_shutdown_without_wait_drains() {
    let finished = Arc::new(AtomicUsize::new(0));
    {
        let pool = pool(2, 10, Duration::from_secs(60));
        for _ in 0..4 {
            let finished = Arc::clone(&finished);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(100));
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        pool.shutdown(false);
    }
    assert_eq!(finished.load(Ordering::SeqCst), 4);
}

#[test]
fn test_last_reference_dropped_inside_own_task() {
    let pool = Arc::new(pool(2, 10, Duration::from_secs(60)));
    let inner = Arc::clone(&pool);

    let handle = pool
        .submit(move || {
            thread::sleep(Duration::from_millis(100));
            drop(inner);
            "released"
        })
        .unwrap();
    drop(pool);

    assert_eq!(handle.join(), Ok("released"));
}

#[test]
fn test_shutdown_stops_interval_timer() {
    let pool = pool(1, 10, Duration::from_millis(20));
    pool.submit(|| ()).unwrap();
    thread::sleep(Duration::from_millis(70));

    pool.shutdown(true);
    let resets = pool.stats().resets;
    assert!(resets >= 1);

    thread::sleep(Duration::from_millis(70));
    assert_eq!(pool.stats().resets, resets);
}

#[test]
fn test_task_panic_is_delivered_through_handle() {
    let pool = pool(1, 10, Duration::from_secs(60));

    let failing = pool
        .submit(|| -> Result<u32, String> { panic!("quota api down") })
        .unwrap();
    let returning_err = pool
        .submit(|| -> Result<u32, String> { Err("bad input".into()) })
        .unwrap();

    assert_eq!(
        failing.join(),
        Err(TaskError::Panicked("quota api down".into()))
    );
    assert_eq!(returning_err.join(), Ok(Err("bad input".to_string())));

    pool.shutdown(true);
    let stats = pool.stats();
    assert_eq!(stats.panicked, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending(), 0);
}

#[test]
fn test_drop_drains_pool_after_failed_submission_loop() {
    let finished = Arc::new(AtomicUsize::new(0));

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let pool = pool(2, 10, Duration::from_secs(60));
        for i in 0..5 {
            if i == 3 {
                panic!("submission loop failed");
            }
            let finished = Arc::clone(&finished);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(30));
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
    }));

    assert!(outcome.is_err());
    // The pool was dropped while unwinding and waited for accepted tasks
    assert_eq!(finished.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_handles_can_be_awaited() {
    let pool = pool(2, 10, Duration::from_secs(60));

    let handles: Vec<_> = (1..=3).map(|i| pool.submit(move || i * 10).unwrap()).collect();

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 60);

    tokio::task::spawn_blocking(move || pool.shutdown(true))
        .await
        .unwrap();
}
