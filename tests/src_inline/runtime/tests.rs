use std::sync::Barrier;
use std::sync::atomic::AtomicUsize;

use super::*;

#[test]
fn test_submit_delivers_single_result() {
    let pool = WorkerPool::new(2).unwrap();
    assert_eq!(pool.threads(), 2);
    let handle = pool.submit(|| 6 * 7);
    assert_eq!(handle.wait(), Some(42));
}

#[test]
fn test_try_take_before_and_after_completion() {
    let pool = WorkerPool::new(1).unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let handle = pool.submit(move || {
        release_rx.recv().unwrap();
        "done"
    });
    assert_eq!(handle.try_take(), None);
    release_tx.send(()).unwrap();
    assert_eq!(handle.wait_timeout(Duration::from_secs(5)), Some("done"));
}

#[test]
fn test_latest_slot_last_write_wins() {
    let slot: LatestSlot<&str> = LatestSlot::new();
    assert!(slot.latest().is_none());
    assert_eq!(slot.version(), 0);
    assert_eq!(slot.publish("first"), 1);
    let reader = slot.clone();
    assert_eq!(slot.publish("second"), 2);
    let (version, value) = reader.latest().unwrap();
    assert_eq!(version, 2);
    assert_eq!(*value, "second");
}

#[test]
fn test_regenerations_are_not_cancelled() {
    let pool = WorkerPool::new(2).unwrap();
    let slot: LatestSlot<usize> = LatestSlot::new();
    let handles: Vec<ResultHandle<u64>> = (0..4)
        .map(|i| {
            let slot = slot.clone();
            pool.submit(move || slot.publish(i))
        })
        .collect();
    let mut versions: Vec<u64> = handles.into_iter().filter_map(|h| h.wait()).collect();
    versions.sort_unstable();
    assert_eq!(versions, vec![1, 2, 3, 4]);
    assert_eq!(slot.version(), 4);
}

#[test]
fn test_debouncer_drops_superseded_jobs() {
    let pool = WorkerPool::new(2).unwrap();
    let debouncer = Debouncer::new(pool, Duration::from_millis(50)).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    let first = {
        let runs = Arc::clone(&runs);
        debouncer.schedule(move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
            "a"
        })
    };
    let second = {
        let runs = Arc::clone(&runs);
        debouncer.schedule(move |_| {
            runs.fetch_add(1, Ordering::SeqCst);
            "ab"
        })
    };
    assert_eq!(first.wait(), Some(None));
    assert_eq!(second.wait(), Some(Some("ab")));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_debouncer_cancels_in_flight_job() {
    let pool = WorkerPool::new(2).unwrap();
    let debouncer = Debouncer::new(pool, Duration::from_millis(1)).unwrap();
    let started = Arc::new(Barrier::new(2));
    let (release_tx, release_rx) = mpsc::channel::<()>();

    let slow = {
        let started = Arc::clone(&started);
        debouncer.schedule(move |token| {
            started.wait();
            release_rx.recv().unwrap();
            token.is_cancelled()
        })
    };
    started.wait();
    debouncer.cancel_all();
    release_tx.send(()).unwrap();
    assert_eq!(slow.wait(), Some(None));
}

#[test]
fn test_state_cell_copy_on_write() {
    let cell = StateCell::new(vec![1]);
    let before = cell.snapshot();
    let after = cell.update(|v| {
        let mut next = v.clone();
        next.push(2);
        next
    });
    assert_eq!(*before, vec![1]);
    assert_eq!(*after, vec![1, 2]);
    assert!(Arc::ptr_eq(&after, &cell.snapshot()));
    cell.replace(vec![]);
    assert!(cell.snapshot().is_empty());
}

#[test]
fn test_state_cell_serializes_writers() {
    let cell = Arc::new(StateCell::new(0usize));
    let workers: Vec<_> = (0..8)
        .map(|_| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for _ in 0..100 {
                    cell.update(|v| v + 1);
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }
    assert_eq!(*cell.snapshot(), 800);
}

#[test]
fn test_debouncer_burst_resolves_every_handle() {
    let pool = WorkerPool::new(2).unwrap();
    let debouncer = Debouncer::new(pool, Duration::from_millis(200)).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let handles: Vec<ResultHandle<Option<usize>>> = (0..50)
        .map(|i| {
            let runs = Arc::clone(&runs);
            debouncer.schedule(move |_| {
                runs.fetch_add(1, Ordering::SeqCst);
                i
            })
        })
        .collect();
    let results: Vec<Option<usize>> = handles
        .into_iter()
        .map(|h| h.wait_timeout(Duration::from_secs(5)).unwrap())
        .collect();
    assert!(results[..49].iter().all(Option::is_none));
    assert_eq!(results[49], Some(49));
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let later = debouncer.schedule(|_| "again");
    assert_eq!(later.wait(), Some(Some("again")));
}

#[test]
fn test_pending_jobs_resolve_after_debouncer_drop() {
    let pool = WorkerPool::new(1).unwrap();
    let debouncer = Debouncer::new(pool, Duration::from_millis(10)).unwrap();
    let handle = debouncer.schedule(|_| 5);
    drop(debouncer);
    assert_eq!(handle.wait_timeout(Duration::from_secs(5)), Some(Some(5)));
}
