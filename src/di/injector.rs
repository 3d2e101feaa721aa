use crate::di::container::Container;
use crate::di::reflect::{DependencyKind, Inject};
use crate::error::{InjexitError, Result};

impl Container {
    /// Fill the injectable members of an already-constructed object
    ///
    /// # Example
    /// ```rust,ignore
    /// let mut view = ProfileView::default();
    /// container.inject(&mut view)?;
    /// ```
    pub fn inject<T: Inject + ?Sized>(&self, target: &mut T) -> Result<()> {
        self.inject_with(target, self)
    }

    /// Fill the injectable members of `target`, resolving through `resolver`
    /// for this call only
    ///
    /// Optional members that resolve to nothing keep their current value. A
    /// required member that fails aborts the call with `MissingRequiredMember`;
    /// members assigned before it keep their new values.
    pub fn inject_with<T: Inject + ?Sized>(&self, target: &mut T, resolver: &Container) -> Result<()> {
        self.ensure_live()?;
        let owner = std::any::type_name::<T>();
        let members = target.members();
        tracing::trace!(owner, members = members.len(), "Injecting members");

        for (index, member) in members.iter().enumerate() {
            let resolved = resolver
                .resolve_request(&member.request)
                .map_err(|source| missing_member(owner, member.name, source))?;

            if member.kind() == DependencyKind::Optional && resolved.is_absent() {
                continue;
            }
            target
                .assign(index, resolved)
                .map_err(|source| missing_member(owner, member.name, source))?;
        }
        Ok(())
    }
}

fn missing_member(owner: &'static str, member: &'static str, source: InjexitError) -> InjexitError {
    InjexitError::MissingRequiredMember {
        owner,
        member,
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::reflect::{Dependency, Resolved};
    use std::sync::Arc;

    trait Theme: Send + Sync {
        fn color(&self) -> &'static str;
    }

    struct Dark;

    impl Theme for Dark {
        fn color(&self) -> &'static str {
            "black"
        }
    }

    #[derive(Default)]
    struct Panel {
        theme: Option<Arc<dyn Theme>>,
        title: Option<Arc<String>>,
        plugins: Vec<Arc<u32>>,
    }

    impl Inject for Panel {
        fn members(&self) -> Vec<Dependency> {
            vec![
                Dependency::single::<dyn Theme>("theme"),
                Dependency::optional::<String>("title").with_id("title"),
                Dependency::list::<u32>("plugins"),
            ]
        }

        fn assign(&mut self, index: usize, value: Resolved) -> Result<()> {
            match index {
                0 => self.theme = Some(value.into_single()?),
                1 => self.title = value.into_optional()?,
                2 => self.plugins = value.into_list()?,
                _ => {}
            }
            Ok(())
        }
    }

    #[test]
    fn test_inject_fills_members() {
        let container = Container::new();
        let dark: Arc<dyn Theme> = Arc::new(Dark);
        container.bind_instance(Arc::clone(&dark));
        container.bind_instance(Arc::new(1u32)).into_list();
        container.bind_instance(Arc::new(2u32)).into_list();

        let mut panel = Panel {
            title: Some(Arc::new("keep".to_string())),
            ..Panel::default()
        };
        container.inject(&mut panel).unwrap();

        assert!(Arc::ptr_eq(panel.theme.as_ref().unwrap(), &dark));
        assert_eq!(panel.title.as_deref().map(String::as_str), Some("keep"));
        assert_eq!(panel.plugins.len(), 2);
    }

    #[test]
    fn test_missing_required_member_names_owner() {
        let container = Container::new();
        let mut panel = Panel::default();
        match container.inject(&mut panel).err().unwrap() {
            InjexitError::MissingRequiredMember {
                owner,
                member,
                source,
            } => {
                assert!(owner.ends_with("Panel"));
                assert_eq!(member, "theme");
                assert!(matches!(*source, InjexitError::NoBindingFound { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_inject_with_override_resolver() {
        let container = Container::new();
        let scoped = container.using(|child| {
            child.bind_instance(Arc::new(Dark) as Arc<dyn Theme>);
            child
                .bind_instance(Arc::new("scoped".to_string()))
                .with_id("title");
        });

        let mut panel = Panel::default();
        container.inject_with(&mut panel, &scoped).unwrap();
        assert_eq!(panel.theme.unwrap().color(), "black");
        assert_eq!(panel.title.as_deref().map(String::as_str), Some("scoped"));
        scoped.dispose();
    }
}
