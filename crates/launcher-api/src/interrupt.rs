//! Per-thread interrupt status.
//!
//! Blocking launcher calls poll the flag of the thread they run on. Another
//! thread interrupts a waiter through the [`InterruptHandle`] the waiter
//! published; the waiter itself can re-assert its own status with
//! [`interrupt_current`] after handling an interruption locally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

thread_local! {
    static FLAG: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
}

/// Handle to one thread's interrupt flag; may be sent to other threads.
#[derive(Clone, Debug)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle for the calling thread.
pub fn current() -> InterruptHandle {
    FLAG.with(|flag| InterruptHandle(flag.clone()))
}

/// Set the calling thread's interrupt flag.
pub fn interrupt_current() {
    FLAG.with(|flag| flag.store(true, Ordering::SeqCst));
}

/// Peek at the calling thread's interrupt flag without clearing it.
pub fn is_interrupted() -> bool {
    FLAG.with(|flag| flag.load(Ordering::SeqCst))
}

/// Test and clear the calling thread's interrupt flag.
pub fn take_interrupted() -> bool {
    FLAG.with(|flag| flag.swap(false, Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn take_clears_the_flag() {
        interrupt_current();
        assert!(is_interrupted());
        assert!(take_interrupted());
        assert!(!is_interrupted());
        assert!(!take_interrupted());
    }

    #[test]
    fn handle_interrupts_owning_thread_only() {
        let (tx, rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel();

        let worker = thread::spawn(move || {
            tx.send(current()).unwrap();
            done_rx.recv().unwrap();
            take_interrupted()
        });

        let handle = rx.recv().unwrap();
        handle.interrupt();
        assert!(handle.is_interrupted());
        assert!(!is_interrupted(), "caller thread must stay untouched");

        done_tx.send(()).unwrap();
        assert!(worker.join().unwrap());
    }
}
