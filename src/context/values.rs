//! Request-scoped values.
//!
//! Values form an immutable, singly linked chain keyed by type. Adding
//! a value creates a new head; lookups walk from the head, so the most
//! recent binding for a type shadows older ones.

use std::any::{Any, TypeId};
use std::sync::Arc;

pub(crate) struct ValueNode {
    key: TypeId,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<ValueNode>>,
}

impl ValueNode {
    pub(crate) fn push<T>(parent: Option<Arc<ValueNode>>, value: T) -> Arc<ValueNode>
    where
        T: Send + Sync + 'static,
    {
        Arc::new(ValueNode {
            key: TypeId::of::<T>(),
            value: Arc::new(value),
            parent,
        })
    }

    pub(crate) fn get<T>(&self) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        let wanted = TypeId::of::<T>();
        let mut node = Some(self);
        while let Some(current) = node {
            if current.key == wanted {
                return current.value.downcast_ref::<T>();
            }
            node = current.parent.as_deref();
        }
        None
    }

    pub(crate) fn len(&self) -> usize {
        let mut count = 0;
        let mut node = Some(self);
        while let Some(current) = node {
            count += 1;
            node = current.parent.as_deref();
        }
        count
    }
}
