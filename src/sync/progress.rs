use super::SyncOutcome;
use std::path::PathBuf;

/// Everything a sync run reports while it works.
///
/// Events are delivered synchronously on the thread running the sync. A UI
/// should hand them to its own thread, e.g. by passing a channel sender as the sink.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started { total_files: usize },
    FileProcessed { current: usize, total: usize, file_name: String },
    Added { path: PathBuf },
    Updated { path: PathBuf },
    Removed { path: PathBuf },
    Error { path: PathBuf, message: String },
    Completed { outcome: SyncOutcome },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// For callers that only want the final outcome
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_event(&self, _event: &SyncEvent) {}
}

impl<F> ProgressSink for F
where
    F: Fn(&SyncEvent) + Send + Sync,
{
    fn on_event(&self, event: &SyncEvent) {
        self(event)
    }
}

// Dropped receivers are fine, the run doesn't care who's listening
impl ProgressSink for std::sync::mpsc::Sender<SyncEvent> {
    fn on_event(&self, event: &SyncEvent) {
        let _ = self.send(event.clone());
    }
}

impl ProgressSink for tokio::sync::mpsc::UnboundedSender<SyncEvent> {
    fn on_event(&self, event: &SyncEvent) {
        let _ = self.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_sink_receives_events() {
        let seen = Mutex::new(Vec::new());
        let sink = |event: &SyncEvent| {
            if let SyncEvent::Started { total_files } = event {
                seen.lock().unwrap().push(*total_files);
            }
        };

        sink.on_event(&SyncEvent::Started { total_files: 7 });
        NoopProgress.on_event(&SyncEvent::Started { total_files: 1 });
        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[test]
    fn test_tokio_sender_sink_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<SyncEvent>();
        drop(rx);
        tx.on_event(&SyncEvent::Removed { path: PathBuf::from("/music/x.mp3") });
    }

    #[test]
    fn test_std_sender_sink_forwards() {
        let (tx, rx) = std::sync::mpsc::channel::<SyncEvent>();
        tx.on_event(&SyncEvent::Error {
            path: PathBuf::from("/music/bad.mp3"),
            message: "boom".to_string(),
        });
        match rx.recv().unwrap() {
            SyncEvent::Error { path, message } => {
                assert_eq!(path, PathBuf::from("/music/bad.mp3"));
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
