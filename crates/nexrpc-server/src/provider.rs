use nexrpc_common::service::ServiceHandler;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Local map from service name to the handler serving it.
///
/// Services are keyed by the name clients put in `interface_name`: the
/// handler's declared service name, unless published under an override.
#[derive(Default)]
pub struct ServiceProvider {
    services: RwLock<HashMap<String, Arc<dyn ServiceHandler>>>,
}

impl ServiceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` under `name`.
    ///
    /// Returns `false` and keeps the existing binding if `name` is taken.
    pub fn add(&self, name: impl Into<String>, handler: Arc<dyn ServiceHandler>) -> bool {
        let name = name.into();
        let mut services = self.services.write();
        if services.contains_key(&name) {
            warn!(service = %name, "Service already bound, keeping the first binding");
            return false;
        }
        info!(service = %name, methods = handler.methods().len(), "Service bound");
        services.insert(name, handler);
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ServiceHandler>> {
        self.services.read().get(name).cloned()
    }

    /// Names of all bound services, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexrpc_common::service::{Arguments, MethodDescriptor};
    use nexrpc_common::Result;

    struct Named(&'static str);

    impl ServiceHandler for Named {
        fn service_name(&self) -> &str {
            self.0
        }

        fn methods(&self) -> Vec<MethodDescriptor> {
            vec![]
        }

        fn call(&self, _method: &str, args: Arguments<'_>) -> Result<Vec<u8>> {
            args.encode_return(&self.0)
        }
    }

    #[test]
    fn test_add_and_get() {
        let provider = ServiceProvider::new();
        assert!(provider.add("a.Service", Arc::new(Named("first"))));
        assert!(provider.get("a.Service").is_some());
        assert!(provider.get("b.Service").is_none());
        assert_eq!(provider.len(), 1);
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let provider = ServiceProvider::new();
        assert!(provider.add("a.Service", Arc::new(Named("first"))));
        assert!(!provider.add("a.Service", Arc::new(Named("second"))));

        let bound = provider.get("a.Service").unwrap();
        assert_eq!(bound.service_name(), "first");
    }

    #[test]
    fn test_names_sorted() {
        let provider = ServiceProvider::new();
        provider.add("b", Arc::new(Named("b")));
        provider.add("a", Arc::new(Named("a")));
        assert_eq!(provider.names(), vec!["a".to_string(), "b".to_string()]);
    }
}
