use bookdb_core::{BackendError, ObjectKind};
use uuid::Uuid;

use crate::session::Session;

impl Session {
    /// Write one object through to the database if it needs it.
    ///
    /// Clean objects are skipped, except that a transaction always has its
    /// splits brought in line with memory. A destroyed object is removed
    /// from the book once its rows are gone. Nothing happens while the
    /// session is loading.
    pub fn commit_edit(&mut self, guid: &Uuid) -> Result<(), BackendError> {
        if self.loading {
            return Ok(());
        }
        let book = self.book.as_mut().ok_or(BackendError::NoBook)?;
        let instance = book.get(guid).ok_or(BackendError::ObjectNotFound(*guid))?;
        let type_tag = instance.type_tag();

        if !instance.is_dirty() && !instance.is_destroying() {
            if instance.kind() == ObjectKind::Transaction {
                let store = self.store.as_ref().ok_or(BackendError::NotConnected)?;
                if let Some(handler) = self.registry.lookup(type_tag) {
                    handler.commit_children(store, instance)?;
                }
            }
            return Ok(());
        }

        let store = self.store.as_ref().ok_or(BackendError::NotConnected)?;
        let Some(result) = self.registry.lookup(type_tag).and_then(|handler| {
            debug_assert_eq!(handler.type_tag(), type_tag);
            handler.commit(store, instance)
        }) else {
            tracing::error!(guid = %guid, type_tag, "no handler commits this object type");
            return Err(BackendError::UnknownObjectType(type_tag.to_string()));
        };
        if let Err(e) = result {
            tracing::error!(guid = %guid, type_tag, error = %e, "commit failed");
            return Err(e);
        }

        if instance.is_destroying() {
            book.remove(guid);
        } else if let Some(instance) = book.get_mut(guid) {
            instance.mark_clean();
        }
        book.mark_saved();
        tracing::debug!(guid = %guid, type_tag, "object committed");
        Ok(())
    }
}
