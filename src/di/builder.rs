use crate::config::Settings;
use crate::di::Container;
use crate::error::Result;
use crate::installer::Installer;

/// Builder for a root container
///
/// Runs the registered installers in order, then instantiates every eager
/// singleton before handing the container out.
///
/// # Example
/// ```
/// use injexit::{Container, ContainerBuilder, Result, Settings};
/// use std::sync::Arc;
///
/// fn config(container: &Container) -> Result<()> {
///     container.bind_instance(Arc::new("postgres://localhost".to_string()));
///     Ok(())
/// }
///
/// let container = ContainerBuilder::new()
///     .settings(Settings::default().with_max_depth(32))
///     .install(config)
///     .build()
///     .unwrap();
/// assert!(container.contains::<String>());
/// ```
pub struct ContainerBuilder {
    settings: Settings,
    installers: Vec<Box<dyn Installer>>,
}

impl ContainerBuilder {
    /// Create a builder using [`Settings::default`]
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            installers: Vec::new(),
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Queue an installer; installers run in the order they were added
    pub fn install(mut self, installer: impl Installer + 'static) -> Self {
        self.installers.push(Box::new(installer));
        self
    }

    /// Build the container
    ///
    /// # Errors
    /// Propagates installer failures and failures of the eager pass. The
    /// partially built container is disposed before returning.
    pub fn build(self) -> Result<Container> {
        let container = Container::with_settings(self.settings);
        let outcome = self
            .installers
            .iter()
            .try_for_each(|installer| container.install(installer.as_ref()))
            .and_then(|()| container.instantiate_eager_singles());

        match outcome {
            Ok(()) => {
                tracing::info!("Container built with {} bindings", container.len());
                Ok(container)
            }
            Err(e) => {
                tracing::error!("Container build failed: {}", e);
                container.dispose();
                Err(e)
            }
        }
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InjexitError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_build_runs_eager_pass() {
        let built = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&built);
        let container = ContainerBuilder::new()
            .install(move |c: &Container| -> Result<()> {
                let seen = Arc::clone(&seen);
                c.bind_factory(move |_| Ok(Arc::new(seen.fetch_add(1, Ordering::SeqCst))))
                    .eager();
                Ok(())
            })
            .build()
            .unwrap();

        assert_eq!(built.load(Ordering::SeqCst), 1);
        container.resolve::<usize>().unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_build_reports_eager_cycle() {
        let result = ContainerBuilder::new()
            .install(|c: &Container| -> Result<()> {
                c.bind_factory(|r| Ok(Arc::new(*r.resolve::<i64>()? as i32))).eager();
                c.bind_factory(|r| Ok(Arc::new(*r.resolve::<i32>()? as i64))).eager();
                Ok(())
            })
            .build();

        match result {
            Err(InjexitError::CircularDependency { cycle }) => {
                assert_eq!(cycle, vec!["i32", "i64"]);
            }
            other => panic!("unexpected outcome: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_installer_failure_aborts_build() {
        let result = ContainerBuilder::new()
            .install(|_: &Container| -> Result<()> { Err(InjexitError::Disposed) })
            .build();
        assert!(result.is_err());
    }
}
