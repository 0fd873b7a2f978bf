use std::ops::{Deref, DerefMut};
use crossbeam::channel::{bounded, Receiver, Sender};

/// Reset hook run when a pooled object goes back to its pool
pub trait Recycle {
    fn recycle(&mut self);
}

/// Fixed-capacity object pool over a bounded channel.
///
/// Checkout blocks while the pool is drained: this caps in-flight work at the pool
/// size. An object that is never returned shrinks the pool for good.
pub struct Pool<T: Recycle> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    capacity: usize,
}

/// Checked-out object. Dropping it (or calling `release`) returns it to the pool.
pub struct Pooled<T: Recycle> {
    item: Option<T>,
    home: Sender<T>,
}

impl<T: Recycle> Pool<T> {
    pub fn new<F: FnMut() -> T>(capacity: usize, mut build: F) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        for _ in 0..capacity {
            // Cannot fail: the channel has room for exactly `capacity` items
            let _ = sender.send(build());
        }
        Pool {
            sender,
            receiver,
            capacity,
        }
    }

    /// Blocks until an object is available
    pub fn checkout(&self) -> Pooled<T> {
        // The pool holds its own sender, so the channel can never disconnect
        let item = self.receiver.recv().ok();
        Pooled {
            item,
            home: self.sender.clone(),
        }
    }

    pub fn available(&self) -> usize {
        self.receiver.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Recycle> Pooled<T> {
    pub fn release(self) {
        drop(self)
    }
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => item,
            None => unreachable!("pooled item taken before drop"),
        }
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pooled item taken before drop"),
        }
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            item.recycle();
            // Fails only when the pool itself is gone; the item is then simply freed
            let _ = self.home.send(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Scratch {
        values: Vec<u32>,
    }

    impl Recycle for Scratch {
        fn recycle(&mut self) {
            self.values.clear();
        }
    }

    #[test]
    fn release_recycles_and_returns() {
        let pool = Pool::new(1, Scratch::default);
        let mut item = pool.checkout();
        item.values.push(4);
        assert_eq!(pool.available(), 0);
        item.release();

        assert_eq!(pool.available(), 1);
        assert!(pool.checkout().values.is_empty());
    }

    #[test]
    fn blocks_when_drained() {
        let pool = Arc::new(Pool::new(2, Scratch::default));
        let a = pool.checkout();
        let _b = pool.checkout();
        assert_eq!(pool.available(), 0);

        let (done_tx, done_rx) = crossbeam::channel::bounded(1);
        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || {
                let _c = pool.checkout();
                done_tx.send(()).unwrap();
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());
        a.release();
        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        waiter.join().unwrap();
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let pool = Pool::new(0, Scratch::default);
        assert_eq!(pool.capacity(), 1);
        assert_eq!(pool.available(), 1);
    }
}
