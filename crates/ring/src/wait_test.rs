//! Tests for waiting strategies

use super::*;
use std::sync::Arc;
use std::sync::atomic::AtomicI64;
use std::time::Instant;

fn all_strategies() -> Vec<Box<dyn WaitStrategy>> {
    vec![
        WaitStrategyKind::BusySpin.build(DEFAULT_SLEEP_QUANTUM),
        WaitStrategyKind::Yielding.build(DEFAULT_SLEEP_QUANTUM),
        WaitStrategyKind::Sleeping.build(DEFAULT_SLEEP_QUANTUM),
        WaitStrategyKind::Blocking.build(DEFAULT_SLEEP_QUANTUM),
    ]
}

#[test]
fn test_returns_immediately_when_available() {
    let alerted = AtomicBool::new(false);
    for strategy in all_strategies() {
        let highest = strategy.wait_for(3, &|| 7, &alerted).unwrap();
        assert_eq!(highest, 7, "{strategy:?}");
    }
}

#[test]
fn test_alert_wins_over_available_records() {
    let alerted = AtomicBool::new(true);
    for strategy in all_strategies() {
        assert_eq!(strategy.wait_for(0, &|| 10, &alerted), Err(Alerted));
    }
}

#[test]
fn test_wakes_up_when_sequence_is_published() {
    for strategy in all_strategies() {
        let strategy: Arc<dyn WaitStrategy> = Arc::from(strategy);
        let cursor = Arc::new(AtomicI64::new(-1));
        let alerted = Arc::new(AtomicBool::new(false));

        let waiter = {
            let strategy = Arc::clone(&strategy);
            let cursor = Arc::clone(&cursor);
            let alerted = Arc::clone(&alerted);
            thread::spawn(move || {
                strategy.wait_for(0, &|| cursor.load(Ordering::Acquire), &alerted)
            })
        };

        thread::sleep(Duration::from_millis(10));
        cursor.store(0, Ordering::Release);
        strategy.signal_all_when_blocking();

        assert_eq!(waiter.join().unwrap(), Ok(0));
    }
}

#[test]
fn test_halt_unblocks_waiter() {
    for strategy in all_strategies() {
        let strategy: Arc<dyn WaitStrategy> = Arc::from(strategy);
        let alerted = Arc::new(AtomicBool::new(false));

        let waiter = {
            let strategy = Arc::clone(&strategy);
            let alerted = Arc::clone(&alerted);
            thread::spawn(move || strategy.wait_for(0, &|| -1, &alerted))
        };

        thread::sleep(Duration::from_millis(10));
        alerted.store(true, Ordering::Release);
        strategy.signal_all_when_blocking();

        assert_eq!(waiter.join().unwrap(), Err(Alerted));
    }
}

#[test]
fn test_sleeping_wait_backs_off_to_sleep() {
    let strategy = SleepingWait::new(Duration::from_millis(2));
    let alerted = AtomicBool::new(false);
    let calls = AtomicI64::new(0);

    // Becomes available after the spin and yield phases are exhausted
    let start = Instant::now();
    let highest = strategy
        .wait_for(
            0,
            &|| {
                let n = calls.fetch_add(1, Ordering::Relaxed);
                if n > SLEEPING_RETRIES as i64 + 2 { 0 } else { -1 }
            },
            &alerted,
        )
        .unwrap();

    assert_eq!(highest, 0);
    assert!(start.elapsed() >= Duration::from_millis(4));
}

#[test]
fn test_kind_from_config_names() {
    #[derive(Deserialize)]
    struct Wrapper {
        wait: WaitStrategyKind,
    }

    let parsed: Wrapper = serde_json::from_str(r#"{"wait": "busy_spin"}"#).unwrap();
    assert_eq!(parsed.wait, WaitStrategyKind::BusySpin);
    assert_eq!(WaitStrategyKind::default(), WaitStrategyKind::Sleeping);
    assert_eq!(WaitStrategyKind::Blocking.to_string(), "blocking");
}
