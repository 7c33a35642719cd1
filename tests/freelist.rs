use oluk::freelist::{LinkQueue, NodePool};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

static INT_NODES: NodePool<u64> = NodePool::new();

#[test]
fn test_queue_fifo() {
    let mut q = LinkQueue::new(&INT_NODES);
    assert!(q.is_empty());
    for i in 0..100 {
        q.push_back(i);
    }
    assert_eq!(q.len(), 100);
    for i in 0..100 {
        assert_eq!(q.pop_front(), Some(i));
    }
    assert_eq!(q.pop_front(), None);
    assert!(q.is_empty());
}

#[test]
fn test_queues_share_nodes() {
    static SHARED: NodePool<u64> = NodePool::new();
    {
        let mut a = LinkQueue::new(&SHARED);
        for i in 0..8 {
            a.push_back(i);
        }
        // Dropping the queue returns its nodes to the pool.
    }
    let mut b = LinkQueue::new(&SHARED);
    for i in 0..8 {
        b.push_back(i * 2);
    }
    for i in 0..8 {
        assert_eq!(b.pop_front(), Some(i * 2));
    }
}

#[test]
fn test_drop_releases_values() {
    static DROP_NODES: NodePool<Counted> = NodePool::new();
    static DROPS: AtomicUsize = AtomicUsize::new(0);

    struct Counted;
    impl Drop for Counted {
        fn drop(&mut self) {
            DROPS.fetch_add(1, Ordering::SeqCst);
        }
    }

    {
        let mut q = LinkQueue::new(&DROP_NODES);
        for _ in 0..5 {
            q.push_back(Counted);
        }
        let popped = q.pop_front();
        assert!(popped.is_some());
        drop(popped);
    }
    assert_eq!(DROPS.load(Ordering::SeqCst), 5);
}

#[test]
#[cfg_attr(miri, ignore)]
fn test_concurrent_pool_traffic() {
    static BUSY: NodePool<u64> = NodePool::new();
    let total = Arc::new(AtomicUsize::new(0));
    let mut handles = vec![];
    for t in 0..4 {
        let total = total.clone();
        handles.push(thread::spawn(move || {
            // Each thread owns its queue; the node pool is the shared part.
            let mut q = LinkQueue::new(&BUSY);
            for round in 0..1000u64 {
                q.push_back(t * 1000 + round);
                if round % 2 == 1 {
                    let a = q.pop_front().unwrap();
                    let b = q.pop_front().unwrap();
                    assert!(a < b);
                    total.fetch_add(2, Ordering::SeqCst);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(total.load(Ordering::SeqCst), 4000);
}
