use std::fmt;

/// Identifies a logical object across its platform and cluster representations.
///
/// Namespaced objects are keyed as `name@namespace`; cluster-scoped objects by
/// their name alone.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey(String);

// === impl ResourceKey ===

impl ResourceKey {
    pub fn new(name: impl AsRef<str>, namespace: Option<&str>) -> Self {
        match namespace {
            Some(ns) if !ns.is_empty() => Self(format!("{}@{}", name.as_ref(), ns)),
            _ => Self(name.as_ref().to_string()),
        }
    }

    /// Builds the key of a Kubernetes object from its metadata.
    ///
    /// Objects without a name produce an empty name component.
    pub fn of<K: kube::Resource>(resource: &K) -> Self {
        let meta = resource.meta();
        Self::new(
            meta.name.as_deref().unwrap_or_default(),
            meta.namespace.as_deref(),
        )
    }

    pub fn name(&self) -> &str {
        self.split().0
    }

    pub fn namespace(&self) -> Option<&str> {
        self.split().1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn split(&self) -> (&str, Option<&str>) {
        match self.0.rsplit_once('@') {
            Some((name, ns)) => (name, Some(ns)),
            None => (&self.0, None),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ResourceKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}
