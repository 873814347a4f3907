use std::sync::Mutex;
use tokio::sync::mpsc;

type Job = Box<dyn FnOnce() + Send>;

/// Work posted from any thread to be run on the main thread.
///
/// Workers hold a [`MainThreadHandle`]; the host's main loop calls
/// [`drain`](MainThreadQueue::drain) once per frame.
pub struct MainThreadQueue {
    tx: mpsc::UnboundedSender<Job>,
    rx: Mutex<mpsc::UnboundedReceiver<Job>>,
}

/// Cloneable posting side of a [`MainThreadQueue`]
#[derive(Clone)]
pub struct MainThreadHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl MainThreadHandle {
    /// Queue `job` for the main thread.
    ///
    /// # Returns
    /// `false` if the queue no longer exists
    pub fn post<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(job)).is_ok()
    }
}

impl MainThreadQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn handle(&self) -> MainThreadHandle {
        MainThreadHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every job queued so far, in posting order.
    ///
    /// Jobs posted while draining wait for the next call.
    ///
    /// # Returns
    /// Number of jobs run
    pub fn drain(&self) -> usize {
        let jobs: Vec<Job> = {
            let mut rx = self.rx.lock().unwrap_or_else(|p| p.into_inner());
            let mut jobs = Vec::new();
            while let Ok(job) = rx.try_recv() {
                jobs.push(job);
            }
            jobs
        };

        let count = jobs.len();
        for job in jobs {
            job();
        }
        count
    }
}

impl Default for MainThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}
