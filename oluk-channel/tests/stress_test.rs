use oluk_channel::{channel, Channel, Select};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

#[test]
#[cfg_attr(miri, ignore)]
fn test_mpmc_no_loss_no_dup() {
    let producers = 4;
    let consumers = 4;
    let items_per = 5000u64;
    let (tx, rx) = channel::<u64>(16);

    let mut handles = vec![];
    for p in 0..producers {
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            for i in 0..items_per {
                tx.send(p * items_per + i).unwrap();
            }
        }));
    }
    drop(tx);

    let sum = Arc::new(AtomicUsize::new(0));
    let count = Arc::new(AtomicUsize::new(0));
    let mut readers = vec![];
    for _ in 0..consumers {
        let rx = rx.clone();
        let sum = sum.clone();
        let count = count.clone();
        readers.push(thread::spawn(move || {
            while let Some(v) = rx.recv() {
                sum.fetch_add(v as usize, Ordering::SeqCst);
                count.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }
    drop(rx);

    for h in handles {
        h.join().unwrap();
    }
    for r in readers {
        r.join().unwrap();
    }

    let total = producers * items_per;
    assert_eq!(count.load(Ordering::SeqCst) as u64, total);
    let expected: u64 = (0..total).sum();
    assert_eq!(sum.load(Ordering::SeqCst) as u64, expected);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_fifo_per_producer() {
    let producers = 8u64;
    let items_per = 2000u64;
    let (tx, rx) = channel::<(u64, u64)>(16);

    let mut handles = vec![];
    for p in 0..producers {
        let tx = tx.clone();
        handles.push(thread::spawn(move || {
            for i in 0..items_per {
                tx.send((p, i)).unwrap();
            }
        }));
    }
    drop(tx);

    let mut last: HashMap<u64, u64> = HashMap::new();
    let mut received = 0u64;
    while let Some((p, i)) = rx.recv() {
        if let Some(prev) = last.get(&p) {
            assert!(i > *prev, "producer {p} went backwards: {prev} then {i}");
        }
        last.insert(p, i);
        received += 1;
    }
    assert_eq!(received, producers * items_per);

    for h in handles {
        h.join().unwrap();
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_select_contention() {
    let trials = 200;
    for _ in 0..trials {
        let chans: Vec<Arc<Channel<u64>>> =
            (0..3).map(|_| Arc::new(Channel::new(1))).collect();
        for (i, c) in chans.iter().enumerate() {
            c.send(i as u64).unwrap();
        }

        let received = Arc::new(Mutex::new(Vec::new()));
        let mut handles = vec![];
        for _ in 0..3 {
            let chans = chans.clone();
            let received = received.clone();
            handles.push(thread::spawn(move || {
                // Each selector scans the channels in its own order.
                let mut order: Vec<usize> = (0..chans.len()).collect();
                order.shuffle(&mut rand::thread_rng());
                let mut sel = Select::new();
                for &c in order.iter() {
                    sel.recv(&chans[c]);
                }
                let op = sel.select();
                let idx = op.index();
                let v = op.recv(&chans[order[idx]]).unwrap();
                received.lock().unwrap().push(v);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        let mut got = received.lock().unwrap().clone();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2]);
        for c in chans.iter() {
            assert!(c.is_empty());
        }
    }
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_rendezvous_pairing() {
    let pairs = 4;
    let rounds = 1000u64;
    let chan = Arc::new(Channel::<u64>::new(0));

    let mut handles = vec![];
    for p in 0..pairs {
        let chan = chan.clone();
        handles.push(thread::spawn(move || {
            for i in 0..rounds {
                chan.send(p * rounds + i).unwrap();
            }
        }));
    }

    let seen = Arc::new(AtomicUsize::new(0));
    let mut readers = vec![];
    for _ in 0..pairs {
        let chan = chan.clone();
        let seen = seen.clone();
        readers.push(thread::spawn(move || {
            for _ in 0..rounds {
                assert!(chan.recv().is_some());
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));
    }

    for h in handles {
        h.join().unwrap();
    }
    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(seen.load(Ordering::SeqCst) as u64, pairs * rounds);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_drop_of_last_sender_closes() {
    let (tx, rx) = channel::<i32>(4);
    tx.send(1).unwrap();
    drop(tx);
    assert_eq!(rx.recv(), Some(1));
    assert_eq!(rx.recv(), None);
    assert!(rx.is_closed());
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_drop_of_last_receiver_closes() {
    let (tx, rx) = channel::<i32>(4);
    drop(rx);
    assert!(tx.send(1).is_err());
    assert!(tx.is_closed());
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_clone_keeps_channel_open() {
    let (tx, rx) = channel::<i32>(4);
    let tx2 = tx.clone();
    drop(tx);
    tx2.send(5).unwrap();
    assert_eq!(rx.recv(), Some(5));
    drop(tx2);
    assert_eq!(rx.recv(), None);
}
