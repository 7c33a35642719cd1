use oluk_channel::{channel, Channel, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_slot_simple() {
    let (tx, rx) = channel(1);
    tx.send(1).unwrap();
    assert_eq!(rx.try_recv(), Ok(1));
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
}

#[test]
fn test_ring_fifo() {
    let chan = Channel::new(4);
    for i in 0..4 {
        chan.send(i).unwrap();
    }
    assert!(chan.is_full());
    for i in 0..4 {
        assert_eq!(chan.recv(), Some(i));
    }
    assert!(chan.is_empty());
}

#[test]
fn test_try_send_full() {
    let chan = Channel::new(2);
    chan.try_send(1).unwrap();
    chan.try_send(2).unwrap();
    assert!(chan.try_send(3).unwrap_err().is_full());
    assert_eq!(chan.recv(), Some(1));
    chan.try_send(3).unwrap();
    assert_eq!(chan.recv(), Some(2));
    assert_eq!(chan.recv(), Some(3));
}

#[test]
fn test_capacity_reporting() {
    assert_eq!(Channel::<u8>::new(1).capacity(), 1);
    // Capacity is logical even though the ring rounds its backing array
    // up to a power of two.
    assert_eq!(Channel::<u8>::new(5).capacity(), 5);
    let chan = Channel::new(5);
    for i in 0..5 {
        chan.try_send(i).unwrap();
    }
    assert!(chan.try_send(5).unwrap_err().is_full());
    assert_eq!(chan.len(), 5);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_slot_overflow_blocks() {
    let chan = Arc::new(Channel::new(1));
    chan.send(1).unwrap();

    let writer = chan.clone();
    let t = thread::spawn(move || {
        writer.send(2).unwrap();
    });

    thread::sleep(Duration::from_millis(50));
    assert_eq!(chan.recv(), Some(1));
    assert_eq!(chan.recv(), Some(2));
    t.join().unwrap();
    assert!(chan.is_empty());
}

#[test]
fn test_close_drains() {
    let chan = Channel::new(4);
    for v in [10, 20, 30] {
        chan.send(v).unwrap();
    }
    chan.close();
    assert_eq!(chan.recv(), Some(10));
    assert_eq!(chan.recv(), Some(20));
    assert_eq!(chan.recv(), Some(30));
    assert_eq!(chan.recv(), None);
    assert!(chan.send(40).is_err());
}

#[test]
fn test_slot_close_drains() {
    let chan = Channel::new(1);
    chan.send(1).unwrap();
    chan.close();
    assert_eq!(chan.recv(), Some(1));
    assert_eq!(chan.recv(), None);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_close_wakes_blocked_reader() {
    let chan = Arc::new(Channel::<i32>::new(4));

    let reader = chan.clone();
    let t = thread::spawn(move || reader.recv());

    thread::sleep(Duration::from_millis(100));
    chan.close();
    assert_eq!(t.join().unwrap(), None);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_close_wakes_blocked_writers() {
    let chan = Arc::new(Channel::new(1));
    chan.send(0).unwrap();

    let mut handles = vec![];
    for i in 1..=3 {
        let writer = chan.clone();
        handles.push(thread::spawn(move || writer.send(i)));
    }

    thread::sleep(Duration::from_millis(100));
    chan.close();
    for h in handles {
        assert!(h.join().unwrap().is_err());
    }
    // The pre-close value is still drainable.
    assert_eq!(chan.recv(), Some(0));
    assert_eq!(chan.recv(), None);
}

#[test]
fn test_close_idempotent() {
    let chan = Channel::<i32>::new(4);
    chan.close();
    chan.close();
    assert!(chan.is_closed());
    assert_eq!(chan.recv(), None);
}

#[test]
fn test_try_recv_closed_vs_empty() {
    let chan = Channel::<i32>::new(4);
    assert_eq!(chan.try_recv(), Err(TryRecvError::Empty));
    chan.close();
    assert_eq!(chan.try_recv(), Err(TryRecvError::Closed));
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_recv_timeout() {
    let chan = Channel::<i32>::new(4);
    let start = Instant::now();
    assert!(chan.recv_timeout(Duration::from_millis(50)).is_err());
    assert!(start.elapsed() >= Duration::from_millis(50));

    chan.send(3).unwrap();
    assert_eq!(chan.recv_timeout(Duration::from_millis(50)), Ok(3));
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_send_timeout_full_channel() {
    let chan = Channel::new(1);
    chan.send(1).unwrap();
    let res = chan.send_timeout(2, Duration::from_millis(50));
    assert_eq!(res.unwrap_err().into_inner(), 2);
    // Capacity is intact after the timeout.
    assert_eq!(chan.recv(), Some(1));
    chan.send(3).unwrap();
    assert_eq!(chan.recv(), Some(3));
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_blocked_reader_sees_late_send() {
    let chan = Arc::new(Channel::new(8));

    let reader = chan.clone();
    let t = thread::spawn(move || reader.recv());

    thread::sleep(Duration::from_millis(50));
    chan.send(99).unwrap();
    assert_eq!(t.join().unwrap(), Some(99));
}
