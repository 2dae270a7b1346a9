//! The single ordered queue feeding the pipeline.
//!
//! Producers (the file watcher, the host's event source) only enqueue; the
//! pipeline thread is the only consumer.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::router::InputEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Re-run the whole pass on this script text. The file has already been
    /// read by the producer.
    Reload { source: String },
    Dispatch(InputEvent),
    Shutdown,
}

#[derive(Debug, Default)]
struct State {
    requests: VecDeque<Request>,
    closed: bool,
}

/// FIFO of [`Request`]s with blocking receive.
///
/// A reload enqueued while another reload is still waiting replaces that
/// one's source in place, keeping its position. Once a `Shutdown` has been
/// pushed the queue is closed and further pushes are dropped.
#[derive(Debug, Default)]
pub struct MutationQueue {
    state: Mutex<State>,
    ready: Condvar,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `request`. Returns `false` if the queue is closed.
    pub fn push(&self, request: Request) -> bool {
        let mut state = self.state.lock();
        if state.closed {
            log::debug!("queue closed; dropping {request:?}");
            return false;
        }
        match request {
            Request::Reload { source } => {
                let pending = state.requests.iter_mut().find_map(|r| match r {
                    Request::Reload { source } => Some(source),
                    _ => None,
                });
                match pending {
                    Some(pending) => {
                        log::debug!("superseding pending reload");
                        *pending = source;
                    }
                    None => state.requests.push_back(Request::Reload { source }),
                }
            }
            Request::Shutdown => {
                state.closed = true;
                state.requests.push_back(Request::Shutdown);
            }
            other => state.requests.push_back(other),
        }
        drop(state);
        self.ready.notify_one();
        true
    }

    /// Block until a request is available.
    pub fn pop(&self) -> Request {
        let mut state = self.state.lock();
        loop {
            if let Some(request) = state.requests.pop_front() {
                return request;
            }
            self.ready.wait(&mut state);
        }
    }

    pub fn try_pop(&self) -> Option<Request> {
        self.state.lock().requests.pop_front()
    }

    pub fn len(&self) -> usize {
        self.state.lock().requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn reload(src: &str) -> Request {
        Request::Reload { source: src.to_string() }
    }

    fn event(handler: &str) -> Request {
        Request::Dispatch(InputEvent::new("b1", handler))
    }

    #[test]
    fn fifo_order() {
        let q = MutationQueue::new();
        q.push(event("a"));
        q.push(reload("v1"));
        q.push(event("b"));
        assert_eq!(q.try_pop(), Some(event("a")));
        assert_eq!(q.try_pop(), Some(reload("v1")));
        assert_eq!(q.try_pop(), Some(event("b")));
        assert_eq!(q.try_pop(), None);
    }

    #[test]
    fn pending_reload_is_superseded_in_place() {
        let q = MutationQueue::new();
        q.push(reload("v1"));
        q.push(event("a"));
        q.push(reload("v2"));
        assert_eq!(q.len(), 2);
        assert_eq!(q.try_pop(), Some(reload("v2")));
        assert_eq!(q.try_pop(), Some(event("a")));

        // once taken, a new reload queues normally
        q.push(reload("v3"));
        assert_eq!(q.try_pop(), Some(reload("v3")));
    }

    #[test]
    fn shutdown_closes() {
        let q = MutationQueue::new();
        assert!(q.push(Request::Shutdown));
        assert!(!q.push(event("late")));
        assert!(q.is_closed());
        assert_eq!(q.try_pop(), Some(Request::Shutdown));
        assert!(q.is_empty());
    }

    #[test]
    fn pop_blocks_until_push() {
        let q = Arc::new(MutationQueue::new());
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                q.push(event("x"));
            })
        };
        assert_eq!(q.pop(), event("x"));
        producer.join().unwrap();
        assert_eq!(q.try_pop(), None);
    }
}
