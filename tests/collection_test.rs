//! Future-frame collection.

mod common;

use cam_daq::{AcquisitionState, DaqError};
use common::{assert_consecutive, assert_deadline_near, counters, manual_camera, timed_camera};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn collects_five_consecutive_frames_from_running_stream() {
    let (camera, _probe) = timed_camera(20.0);
    camera.start_acquisition().unwrap();

    let frames = camera
        .collect_future_frames(5, Duration::from_millis(2000))
        .unwrap();
    assert_eq!(frames.len(), 5);
    assert_consecutive(&frames);
    assert!(frames[0].counter() <= camera.frame_counter());
    camera.stop_acquisition().unwrap();
}

#[test]
fn times_out_when_no_frames_arrive() {
    let (camera, _probe) = manual_camera();
    camera.start_acquisition().unwrap();

    let started = Instant::now();
    let err = camera
        .collect_future_frames(5, Duration::from_millis(2000))
        .unwrap_err();
    assert_deadline_near(started.elapsed(), Duration::from_millis(2000), "collect timeout");
    assert_eq!(
        err,
        DaqError::Timeout {
            expected: 5,
            received: 0,
            timeout: Duration::from_millis(2000),
        }
    );
    assert!(err.is_recoverable());
}

#[test]
fn collection_never_changes_acquisition_state() {
    let (camera, _probe) = manual_camera();
    assert!(camera
        .collect_future_frames(1, Duration::from_millis(20))
        .is_err());
    assert_eq!(camera.state(), AcquisitionState::Idle);
}

#[test]
fn concurrent_collectors_each_get_their_own_frames() {
    let (camera, probe) = manual_camera();
    camera.start_acquisition().unwrap();
    let camera = Arc::new(camera);

    let collectors: Vec<_> = (0..2).map(|_| camera.future_frames(3)).collect();
    let waiters: Vec<_> = collectors
        .into_iter()
        .map(|collector| thread::spawn(move || collector.wait(Duration::from_secs(2))))
        .collect();

    assert_eq!(probe.deliver_many(4), 4);
    let results: Vec<_> = waiters
        .into_iter()
        .map(|waiter| waiter.join().unwrap().unwrap())
        .collect();

    for frames in &results {
        assert_eq!(counters(frames), vec![0, 1, 2]);
    }
    // Both collectors hold the same immutable frame.
    assert!(Arc::ptr_eq(&results[0][0], &results[1][0]));
}

#[test]
fn concurrent_collectors_started_at_different_times() {
    let (camera, probe) = manual_camera();
    camera.start_acquisition().unwrap();

    let early = camera.future_frames(3);
    probe.deliver_many(2);
    let late = camera.future_frames(3);
    probe.deliver_many(3);

    assert_eq!(
        counters(&early.wait(Duration::from_millis(100)).unwrap()),
        vec![0, 1, 2]
    );
    assert_eq!(
        counters(&late.wait(Duration::from_millis(100)).unwrap()),
        vec![2, 3, 4]
    );
}

#[test]
fn slow_collector_does_not_block_fast_one() {
    let (camera, probe) = manual_camera();
    camera.start_acquisition().unwrap();

    let slow = camera.future_frames(50);
    let fast = camera.future_frames(2);
    probe.deliver_many(2);

    assert_eq!(fast.wait(Duration::from_millis(100)).unwrap().len(), 2);
    assert_eq!(slow.received(), 2);
    assert!(matches!(
        slow.wait(Duration::from_millis(10)),
        Err(DaqError::Timeout { received: 2, .. })
    ));
}

#[test]
fn collector_unregisters_on_every_exit_path() {
    let (camera, probe) = manual_camera();
    camera.start_acquisition().unwrap();
    let delivered = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let witness = Arc::clone(&delivered);
    let witness_id = camera.register_subscriber(move |_| {
        witness.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    });

    // Timeout path.
    assert!(camera
        .collect_future_frames(2, Duration::from_millis(10))
        .is_err());
    // Success path.
    let collector = camera.future_frames(1);
    probe.deliver_complete();
    collector.wait(Duration::from_millis(100)).unwrap();
    // Cancellation path.
    let collector = camera.future_frames(1);
    collector.canceller().cancel();
    assert_eq!(
        collector.wait(Duration::from_secs(1)),
        Err(DaqError::Cancelled)
    );
    // Dropped without waiting.
    drop(camera.future_frames(3));

    assert_eq!(camera.subscriber_count(), 1);
    assert!(camera.unregister_subscriber(witness_id));
    probe.deliver_complete();
    assert_eq!(delivered.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(camera.delivery_stats().subscriber_failures, 0);
}

#[test]
fn zero_frames_returns_immediately() {
    let (camera, _probe) = manual_camera();
    let started = Instant::now();
    assert!(camera
        .collect_future_frames(0, Duration::from_secs(5))
        .unwrap()
        .is_empty());
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_collection_from_running_stream() {
    let (camera, _probe) = timed_camera(50.0);
    camera.start_acquisition().unwrap();
    let frames = camera
        .collect_future_frames_async(3, camera.config().collect_timeout())
        .await
        .unwrap();
    assert_eq!(frames.len(), 3);
    assert_consecutive(&frames);
    camera.stop_acquisition().unwrap();
}

#[tokio::test]
async fn async_collection_subscribes_on_first_poll() {
    let (camera, probe) = manual_camera();
    camera.start_acquisition().unwrap();
    let pending = camera.collect_future_frames_async(2, Duration::from_secs(2));
    // Subscription happens when the future is first polled; poll it alongside
    // the delivery.
    let deliver = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        probe.deliver_many(2)
    };
    let (frames, delivered) = tokio::join!(pending, deliver);
    assert_eq!(delivered, 2);
    assert_eq!(counters(&frames.unwrap()), vec![0, 1]);
}
