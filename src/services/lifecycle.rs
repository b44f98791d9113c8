use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::services::initializers::InitializerRegistry;

/// Log target for per-request lines.
pub const REQUEST_TARGET: &str = "request";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHandledEvent {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub duration: Duration,
    pub failed: bool,
}

impl fmt::Display for RequestHandledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "method=[{}] url=[{}] status=[{}] time=[{}ms]",
            self.method,
            self.path,
            self.status,
            self.duration.as_millis()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplicationEvent {
    Loaded,
    Ready,
    Closed,
    RequestHandled(RequestHandledEvent),
}

/// Application hook notified of every lifecycle event before it is handled.
pub trait ApplicationEventClient: Send + Sync {
    fn application_load(&self) {}

    fn on_application_event(&self, event: &ApplicationEvent);
}

/// Tracks whether the server is accepting requests: set on `Ready`, cleared
/// on `Closed`.
#[derive(Debug, Default)]
pub struct Readiness {
    ready: AtomicBool,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

impl ApplicationEventClient for Readiness {
    fn on_application_event(&self, event: &ApplicationEvent) {
        match event {
            ApplicationEvent::Ready => self.ready.store(true, Ordering::Release),
            ApplicationEvent::Closed => self.ready.store(false, Ordering::Release),
            _ => {}
        }
    }
}

/// Relays lifecycle events to logging and runs startup/shutdown work.
pub struct Lifecycle {
    application_id: String,
    initializers: InitializerRegistry,
    client: Option<Arc<dyn ApplicationEventClient>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Lifecycle {
    pub fn new(application_id: impl Into<String>, initializers: InitializerRegistry) -> Self {
        Self {
            application_id: application_id.into(),
            initializers,
            client: None,
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_client(mut self, client: Arc<dyn ApplicationEventClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn application_id(&self) -> &str {
        &self.application_id
    }

    /// Background task to abort on shutdown.
    pub fn track_task(&self, handle: JoinHandle<()>) {
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    /// Called once the application state is assembled.
    pub fn loaded(&self) {
        if let Some(client) = &self.client {
            client.application_load();
        }
        self.dispatch(ApplicationEvent::Loaded);
    }

    pub fn dispatch(&self, event: ApplicationEvent) {
        if let Some(client) = &self.client {
            client.on_application_event(&event);
        }

        match event {
            ApplicationEvent::Loaded => {
                tracing::debug!("{} loaded", self.application_id);
            }
            ApplicationEvent::Ready => {
                self.initializers.run_all();
                tracing::info!("{} started", self.application_id);
            }
            ApplicationEvent::Closed => {
                tracing::info!("{} shutting down", self.application_id);
                let aborted = self.abort_tasks();
                if aborted > 0 {
                    tracing::debug!("Aborted {} background task(s)", aborted);
                }
            }
            ApplicationEvent::RequestHandled(request) => {
                if request.failed {
                    tracing::info!(target: REQUEST_TARGET, "error:{}", request);
                } else {
                    tracing::info!(target: REQUEST_TARGET, "{}", request);
                }
            }
        }
    }

    fn abort_tasks(&self) -> usize {
        let handles = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for handle in &handles {
            handle.abort();
        }
        handles.len()
    }
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("application_id", &self.application_id)
            .field("initializers", &self.initializers)
            .field("has_client", &self.client.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingClient {
        loads: AtomicUsize,
        events: Mutex<Vec<ApplicationEvent>>,
    }

    impl ApplicationEventClient for RecordingClient {
        fn application_load(&self) {
            self.loads.fetch_add(1, Ordering::SeqCst);
        }

        fn on_application_event(&self, event: &ApplicationEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_client_sees_every_event() {
        let client = Arc::new(RecordingClient::default());
        let lifecycle = Lifecycle::new("test-app", InitializerRegistry::new()).with_client(client.clone());

        lifecycle.loaded();
        lifecycle.dispatch(ApplicationEvent::Ready);
        lifecycle.dispatch(ApplicationEvent::Closed);

        assert_eq!(client.loads.load(Ordering::SeqCst), 1);
        assert_eq!(
            *client.events.lock().unwrap(),
            vec![ApplicationEvent::Loaded, ApplicationEvent::Ready, ApplicationEvent::Closed]
        );
    }

    #[test]
    fn test_readiness_follows_ready_and_closed() {
        let readiness = Arc::new(Readiness::new());
        let lifecycle = Lifecycle::new("test-app", InitializerRegistry::new()).with_client(readiness.clone());

        lifecycle.loaded();
        assert!(!readiness.is_ready());
        lifecycle.dispatch(ApplicationEvent::Ready);
        assert!(readiness.is_ready());
        lifecycle.dispatch(ApplicationEvent::Closed);
        assert!(!readiness.is_ready());
    }

    #[test]
    fn test_ready_runs_initializers_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let mut registry = InitializerRegistry::new();
        registry.register("count", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let lifecycle = Lifecycle::new("test-app", registry);

        lifecycle.dispatch(ApplicationEvent::Ready);
        lifecycle.dispatch(ApplicationEvent::Ready);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_aborts_tracked_tasks() {
        let lifecycle = Lifecycle::new("test-app", InitializerRegistry::new());
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        lifecycle.track_task(handle);

        assert_eq!(lifecycle.abort_tasks(), 1);
        assert_eq!(lifecycle.abort_tasks(), 0);
    }

    #[test]
    fn test_request_event_display() {
        let event = RequestHandledEvent {
            method: "POST".to_string(),
            path: "/api/upload".to_string(),
            status: 200,
            duration: Duration::from_millis(12),
            failed: false,
        };
        assert_eq!(
            event.to_string(),
            "method=[POST] url=[/api/upload] status=[200] time=[12ms]"
        );
    }
}
