use crate::Result;
use std::sync::Arc;

type UpdateTermFn<K, D, T> = dyn Fn(&K, &D) -> Result<T> + Send + Sync;
type DeleteTermFn<K, T> = dyn Fn(&K) -> Result<T> + Send + Sync;

/// Caller-supplied term builders.
///
/// The update factory names the identity a document replaces; the optional delete factory names
/// everything an item owned before it is re-indexed. Cloning shares the underlying closures, so
/// one set of factories can serve every worker of a rebuild.
pub struct TermFactories<K, D, T> {
    update: Arc<UpdateTermFn<K, D, T>>,
    delete: Option<Arc<DeleteTermFn<K, T>>>,
}

impl<K, D, T> TermFactories<K, D, T> {
    pub fn new<U>(update: U) -> Self
    where
        U: Fn(&K, &D) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            update: Arc::new(update),
            delete: None,
        }
    }

    /// Delete by `delete` before the documents of each item are written.
    #[must_use]
    pub fn with_delete<X>(mut self, delete: X) -> Self
    where
        X: Fn(&K) -> Result<T> + Send + Sync + 'static,
    {
        self.delete = Some(Arc::new(delete));
        self
    }

    pub fn update_term(&self, key: &K, document: &D) -> Result<T> {
        (self.update)(key, document)
    }

    /// `None` when no delete factory was supplied.
    pub fn delete_term(&self, key: &K) -> Option<Result<T>> {
        self.delete.as_ref().map(|delete| delete(key))
    }

    #[must_use]
    pub fn deletes_before_update(&self) -> bool {
        self.delete.is_some()
    }
}

impl<K, D, T> Clone for TermFactories<K, D, T> {
    fn clone(&self) -> Self {
        Self {
            update: Arc::clone(&self.update),
            delete: self.delete.clone(),
        }
    }
}
