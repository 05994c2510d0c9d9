use std::sync::{Condvar, Mutex};

/// A level-triggered wakeup flag.
///
/// Unlike a bare condvar there is no lost-wakeup window: a signal
/// delivered before the waiter arrives is remembered until consumed.
/// This is the "client notify" half of the command rendezvous — the
/// worker signals it after clearing the command slot, and the
/// controller waits on it with the state mutex released.
pub(crate) struct Notify {
    pending: Mutex<bool>,
    cond: Condvar,
}

impl Notify {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Blocks until signaled, then consumes the signal.
    pub(crate) fn wait(&self) {
        let mut pending = self.pending.lock().expect("notify mutex poisoned");
        while !*pending {
            pending = self.cond.wait(pending).expect("notify mutex poisoned");
        }
        *pending = false;
    }

    pub(crate) fn signal(&self) {
        let mut pending = self.pending.lock().expect("notify mutex poisoned");
        *pending = true;
        self.cond.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::Notify;

    #[test]
    fn signal_before_wait_is_not_lost() {
        let notify = Notify::new();
        notify.signal();
        // Returns immediately because the signal is pending.
        notify.wait();
    }

    #[test]
    fn wait_blocks_until_signaled() {
        let notify = Arc::new(Notify::new());
        let signaler = Arc::clone(&notify);
        let waiter = thread::spawn(move || notify.wait());

        thread::sleep(Duration::from_millis(10));
        signaler.signal();
        waiter.join().expect("waiter thread");
    }
}
