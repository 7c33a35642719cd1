use oluk_channel::{channel, select, Channel, Select};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_select_ready_arm() {
    let c1: Channel<i32> = Channel::new(4);
    let c2: Channel<i32> = Channel::new(4);
    c2.send(7).unwrap();

    let mut sel = Select::new();
    sel.recv(&c1);
    sel.recv(&c2);
    let op = sel.select();
    assert_eq!(op.index(), 1);
    assert_eq!(op.recv(&c2), Some(7));
}

#[test]
fn test_try_select_would_block() {
    let c1: Channel<i32> = Channel::new(4);
    let c2: Channel<i32> = Channel::new(4);

    let mut sel = Select::new();
    sel.recv(&c1);
    sel.recv(&c2);
    assert!(sel.try_select().is_err());
}

#[test]
fn test_select_scans_in_arm_order() {
    let c1: Channel<i32> = Channel::new(4);
    let c2: Channel<i32> = Channel::new(4);
    c1.send(1).unwrap();
    c2.send(2).unwrap();

    let mut sel = Select::new();
    sel.recv(&c1);
    sel.recv(&c2);
    let op = sel.select();
    assert_eq!(op.index(), 0);
    assert_eq!(op.recv(&c1), Some(1));
    // The losing arm's channel is untouched.
    assert_eq!(c2.len(), 1);
    assert_eq!(c2.recv(), Some(2));
}

#[test]
fn test_select_send_arm() {
    let c1: Channel<i32> = Channel::new(1);
    c1.send(0).unwrap(); // full
    let c2: Channel<i32> = Channel::new(1);

    let mut sel = Select::new();
    sel.send(&c1);
    sel.send(&c2);
    let op = sel.select();
    assert_eq!(op.index(), 1);
    op.send(&c2, 5).unwrap();
    assert_eq!(c2.recv(), Some(5));
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_blocking_race() {
    let c1: Arc<Channel<i32>> = Arc::new(Channel::new(4));
    let c2: Arc<Channel<i32>> = Arc::new(Channel::new(4));

    let writer = c2.clone();
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        writer.send(20).unwrap();
    });

    let mut sel = Select::new();
    sel.recv(&c1);
    sel.recv(&c2);
    let op = sel.select();
    assert_eq!(op.index(), 1);
    assert_eq!(op.recv(&c2), Some(20));
    t.join().unwrap();
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_blocked_send_arm() {
    let c1: Arc<Channel<i32>> = Arc::new(Channel::new(1));
    c1.send(0).unwrap(); // full

    let reader = c1.clone();
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        assert_eq!(reader.recv(), Some(0));
    });

    let mut sel = Select::new();
    sel.send(&c1);
    let op = sel.select();
    assert_eq!(op.index(), 0);
    op.send(&c1, 1).unwrap();
    t.join().unwrap();
    assert_eq!(c1.recv(), Some(1));
}

#[test]
fn test_select_all_closed() {
    let c1: Channel<i32> = Channel::new(4);
    let c2: Channel<i32> = Channel::new(4);
    c1.close();
    c2.close();

    let mut sel = Select::new();
    sel.recv(&c1);
    sel.recv(&c2);
    let op = sel.select();
    assert_eq!(op.index(), 0);
    assert_eq!(op.recv(&c1), None);
}

#[test]
fn test_select_drains_closed_channel() {
    let c1: Channel<i32> = Channel::new(4);
    c1.send(8).unwrap();
    c1.close();

    let mut sel = Select::new();
    sel.recv(&c1);
    let op = sel.select();
    assert_eq!(op.recv(&c1), Some(8));

    let mut sel = Select::new();
    sel.recv(&c1);
    let op = sel.select();
    assert_eq!(op.recv(&c1), None);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_woken_by_close() {
    let c1: Arc<Channel<i32>> = Arc::new(Channel::new(4));

    let closer = c1.clone();
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        closer.close();
    });

    let mut sel = Select::new();
    sel.recv(&c1);
    let op = sel.select();
    assert_eq!(op.recv(&c1), None);
    t.join().unwrap();
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_rendezvous_recv() {
    let c: Arc<Channel<i32>> = Arc::new(Channel::new(0));

    let writer = c.clone();
    let t = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        writer.send(13).unwrap();
    });

    let mut sel = Select::new();
    sel.recv(&c);
    let op = sel.select();
    assert_eq!(op.recv(&c), Some(13));
    t.join().unwrap();
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_rendezvous_send() {
    let c: Arc<Channel<i32>> = Arc::new(Channel::new(0));

    let reader = c.clone();
    let t = thread::spawn(move || reader.recv());

    thread::sleep(Duration::from_millis(50));
    let mut sel = Select::new();
    sel.send(&c);
    let op = sel.select();
    op.send(&c, 21).unwrap();
    assert_eq!(t.join().unwrap(), Some(21));
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_rendezvous_ready_sender() {
    let c: Arc<Channel<i32>> = Arc::new(Channel::new(0));

    let writer = c.clone();
    let t = thread::spawn(move || {
        writer.send(34).unwrap();
    });

    // Let the sender park, then select over it: the non-blocking phase
    // must commit.
    thread::sleep(Duration::from_millis(50));
    let mut sel = Select::new();
    sel.recv(&c);
    let op = sel.try_select().unwrap();
    assert_eq!(op.recv(&c), Some(34));
    t.join().unwrap();
}

#[test]
fn test_select_macro_basic() {
    let (s1, r1) = channel::<i32>(4);
    let (_s2, r2) = channel::<i32>(4);

    s1.send(10).unwrap();

    select! {
        v1 = r1 => assert_eq!(v1, Some(10)),
        _v2 = r2 => panic!("should receive from r1"),
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_macro_race() {
    let (_s1, r1) = channel::<i32>(4);
    let (s2, r2) = channel::<i32>(4);

    thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        s2.send(20).unwrap();
    });

    select! {
        _v1 = r1 => panic!("should receive from r2"),
        v2 = r2 => assert_eq!(v2, Some(20)),
    }
}

#[test]
fn test_select_macro_default() {
    let (_s1, r1) = channel::<i32>(4);
    let (_s2, r2) = channel::<i32>(4);

    select! {
        _v1 = r1 => panic!("should not receive from r1"),
        _v2 = r2 => panic!("should not receive from r2");
        default => {},
    };
}

#[test]
fn test_select_macro_closed_arm() {
    let (s1, r1) = channel::<i32>(4);
    s1.close();

    select! {
        v1 = r1 => assert_eq!(v1, None),
    }
}

#[test]
fn test_select_macro_returns_value() {
    let (s1, r1) = channel::<i32>(4);
    let (_s2, r2) = channel::<i32>(4);
    s1.send(3).unwrap();

    let doubled = select! {
        v = r1 => v.unwrap() * 2,
        v = r2 => v.unwrap() * 3,
    };
    assert_eq!(doubled, 6);
}
