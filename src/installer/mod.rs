use crate::di::Container;
use crate::error::Result;

/// A group of related bindings applied to a container in one call
///
/// # Example
/// ```
/// use injexit::{Container, Installer, Result};
/// use std::sync::Arc;
///
/// struct NetworkInstaller {
///     port: u16,
/// }
///
/// impl Installer for NetworkInstaller {
///     fn install(&self, container: &Container) -> Result<()> {
///         container.bind_instance(Arc::new(self.port)).with_id("port");
///         Ok(())
///     }
/// }
///
/// let container = Container::new();
/// container.install(&NetworkInstaller { port: 80 }).unwrap();
/// assert_eq!(*container.resolve_id::<u16>("port").unwrap(), 80);
/// ```
pub trait Installer {
    /// Register this installer's bindings
    fn install(&self, container: &Container) -> Result<()>;

    /// Name used in diagnostics
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Installer for F
where
    F: Fn(&Container) -> Result<()>,
{
    fn install(&self, container: &Container) -> Result<()> {
        self(container)
    }
}

impl Container {
    /// Apply `installer` to this container
    pub fn install(&self, installer: &dyn Installer) -> Result<()> {
        tracing::debug!("Installing {}", installer.name());
        installer.install(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Defaults;

    impl Installer for Defaults {
        fn install(&self, container: &Container) -> Result<()> {
            container.bind_instance(Arc::new("defaults".to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_install_struct_and_closure() {
        let container = Container::new();
        container.install(&Defaults).unwrap();
        container
            .install(&|c: &Container| -> Result<()> {
                c.bind_instance(Arc::new(3u8));
                Ok(())
            })
            .unwrap();

        assert_eq!(*container.resolve::<String>().unwrap(), "defaults");
        assert_eq!(*container.resolve::<u8>().unwrap(), 3);
        assert!(Defaults.name().ends_with("Defaults"));
    }
}
