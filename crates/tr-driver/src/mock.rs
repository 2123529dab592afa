//! In-memory [`ContainerDriver`] for control-plane tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ContainerDriver, ContainerSpec, ContainerState, DriverError, Result};

#[derive(Debug, Clone)]
pub struct MockContainer {
    pub id: String,
    pub spec: ContainerSpec,
    pub running: bool,
}

/// Records every call and supports injected failures, so tests can assert
/// invariants like "create is invoked exactly once" or "the registry is
/// cleared even when remove fails".
#[derive(Default)]
pub struct MockDriver {
    images: Vec<String>,
    containers: Mutex<HashMap<String, MockContainer>>,
    next_id: AtomicUsize,
    create_calls: AtomicUsize,
    fail_start: AtomicBool,
    fail_stop: AtomicBool,
    fail_remove: AtomicBool,
}

impl MockDriver {
    /// A driver that knows about the given image.
    pub fn with_image(image: &str) -> Self {
        Self {
            images: vec![image.to_string()],
            ..Default::default()
        }
    }

    /// A driver with no images at all.
    pub fn without_images() -> Self {
        Self::default()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn container_count(&self) -> usize {
        self.containers.lock().expect("mock driver lock poisoned").len()
    }

    pub fn container(&self, id: &str) -> Option<MockContainer> {
        self.containers.lock().expect("mock driver lock poisoned").get(id).cloned()
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_remove(&self, fail: bool) {
        self.fail_remove.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContainerDriver for MockDriver {
    async fn image_exists(&self, name: &str) -> Result<bool> {
        Ok(self.images.iter().any(|image| image == name))
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.containers.lock().expect("mock driver lock poisoned").insert(
            id.clone(),
            MockContainer {
                id: id.clone(),
                spec: spec.clone(),
                running: false,
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(DriverError::Daemon("injected start failure".to_string()));
        }
        let mut containers = self.containers.lock().expect("mock driver lock poisoned");
        match containers.get_mut(id) {
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(DriverError::NotFound(id.to_string())),
        }
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState> {
        let containers = self.containers.lock().expect("mock driver lock poisoned");
        match containers.get(id) {
            Some(container) => Ok(ContainerState {
                id: container.id.clone(),
                running: container.running,
            }),
            None => Err(DriverError::NotFound(id.to_string())),
        }
    }

    async fn stop(&self, id: &str) -> Result<()> {
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(DriverError::Daemon("injected stop failure".to_string()));
        }
        // Missing container is success; stop is idempotent.
        if let Some(container) = self.containers.lock().expect("mock driver lock poisoned").get_mut(id) {
            container.running = false;
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(DriverError::Daemon("injected remove failure".to_string()));
        }
        self.containers.lock().expect("mock driver lock poisoned").remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tr_core::NetworkMode;

    fn spec() -> ContainerSpec {
        ContainerSpec {
            image: "runner-image".to_string(),
            session_id: "s1".to_string(),
            container_port: 3000,
            host_port: Some(49152),
            network: NetworkMode::Default,
        }
    }

    #[tokio::test]
    async fn create_start_inspect_lifecycle() {
        let driver = MockDriver::with_image("runner-image");
        assert!(driver.image_exists("runner-image").await.unwrap());
        assert!(!driver.image_exists("other").await.unwrap());

        let id = driver.create(&spec()).await.unwrap();
        assert_eq!(driver.create_calls(), 1);
        assert!(!driver.inspect(&id).await.unwrap().running);

        driver.start(&id).await.unwrap();
        assert!(driver.inspect(&id).await.unwrap().running);
    }

    #[tokio::test]
    async fn stop_and_remove_are_idempotent() {
        let driver = MockDriver::with_image("runner-image");
        let id = driver.create(&spec()).await.unwrap();
        driver.start(&id).await.unwrap();

        driver.stop(&id).await.unwrap();
        driver.stop(&id).await.unwrap();
        driver.remove(&id).await.unwrap();
        driver.remove(&id).await.unwrap();
        driver.stop("never-existed").await.unwrap();

        assert_eq!(driver.container_count(), 0);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_daemon_errors() {
        let driver = MockDriver::with_image("runner-image");
        let id = driver.create(&spec()).await.unwrap();

        driver.set_fail_start(true);
        let err = driver.start(&id).await.unwrap_err();
        assert!(matches!(err, DriverError::Daemon(_)));
    }
}
