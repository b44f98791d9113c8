use std::sync::atomic::{AtomicBool, Ordering};

type InitFn = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Named startup hooks, run once when the application is ready.
#[derive(Default)]
pub struct InitializerRegistry {
    entries: Vec<(String, InitFn)>,
    ran: AtomicBool,
}

impl InitializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, init: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.entries.push((name.into(), Box::new(init)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every initializer in registration order and returns how many
    /// succeeded. Failures are logged and do not stop the rest. Only the
    /// first call does anything.
    pub fn run_all(&self) -> usize {
        if self.ran.swap(true, Ordering::SeqCst) {
            tracing::debug!("Initializers already ran, skipping");
            return 0;
        }

        let mut succeeded = 0;
        for (name, init) in &self.entries {
            match init() {
                Ok(()) => {
                    succeeded += 1;
                    tracing::debug!("Initializer {} completed", name);
                }
                Err(e) => tracing::error!("Initializer {} failed: {:#}", name, e),
            }
        }

        tracing::info!("Ran {}/{} initializers", succeeded, self.entries.len());
        succeeded
    }
}

impl std::fmt::Debug for InitializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializerRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .field("ran", &self.ran.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_runs_in_order_once() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut registry = InitializerRegistry::new();
        for name in ["first", "second", "third"] {
            let order = order.clone();
            registry.register(name, move || {
                order.lock().unwrap().push(name);
                Ok(())
            });
        }

        assert_eq!(registry.run_all(), 3);
        assert_eq!(registry.run_all(), 0);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failure_does_not_stop_others() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = InitializerRegistry::new();
        let counter = calls.clone();
        registry
            .register("broken", || Err(anyhow::anyhow!("boom")))
            .register("counter", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });

        assert_eq!(registry.run_all(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["broken", "counter"]);
    }
}
