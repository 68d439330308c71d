//! Setlist editing through the engine
//!
//! Setlists share the engine's state lock so navigation always sees a
//! consistent setlist and position. Every edit is announced with
//! `SetlistChanged`; activation changes with `ActiveSetlistChanged`.

use super::core::NavigationEngine;
use crate::error::Result;
use crate::setlist::{Setlist, SetlistItem};
use rrc_common::events::RrcEvent;
use rrc_common::time::now;
use tracing::info;
use uuid::Uuid;

impl NavigationEngine {
    pub async fn setlists(&self) -> Vec<Setlist> {
        self.state.read().await.setlists.list().to_vec()
    }

    pub async fn setlist(&self, id: Uuid) -> Result<Setlist> {
        self.state.read().await.setlists.get(id).cloned()
    }

    pub async fn create_setlist(&self, name: &str) -> Result<Setlist> {
        let setlist = self.state.write().await.setlists.create(name)?;
        info!("Created setlist '{}' ({})", setlist.name, setlist.id);
        self.setlist_changed(setlist.id);
        Ok(setlist)
    }

    pub async fn rename_setlist(&self, id: Uuid, name: &str) -> Result<Setlist> {
        let setlist = self.state.write().await.setlists.rename(id, name)?;
        self.setlist_changed(id);
        Ok(setlist)
    }

    pub async fn delete_setlist(&self, id: Uuid) -> Result<()> {
        let mut state = self.state.write().await;
        let was_active = state.setlists.delete(id)?;
        info!("Deleted setlist {}", id);
        self.setlist_changed(id);
        if was_active {
            self.emit_active_setlist(&state);
        }
        Ok(())
    }

    pub async fn add_setlist_item(
        &self,
        setlist_id: Uuid,
        region_id: u32,
        label: Option<String>,
        position: Option<usize>,
    ) -> Result<SetlistItem> {
        let item = self
            .state
            .write()
            .await
            .setlists
            .add_item(setlist_id, region_id, label, position)?;
        self.setlist_changed(setlist_id);
        Ok(item)
    }

    pub async fn remove_setlist_item(&self, setlist_id: Uuid, item_id: Uuid) -> Result<SetlistItem> {
        let mut state = self.state.write().await;
        let before = state.setlists.active_index();
        let item = state.setlists.remove_item(setlist_id, item_id)?;
        self.setlist_changed(setlist_id);
        if state.setlists.active_index() != before {
            self.emit_active_setlist(&state);
        }
        Ok(item)
    }

    pub async fn move_setlist_item(&self, setlist_id: Uuid, from: usize, to: usize) -> Result<Setlist> {
        let mut state = self.state.write().await;
        let before = state.setlists.active_index();
        state.setlists.move_item(setlist_id, from, to)?;
        self.setlist_changed(setlist_id);
        if state.setlists.active_index() != before {
            self.emit_active_setlist(&state);
        }
        state.setlists.get(setlist_id).cloned()
    }

    /// Make a setlist drive navigation, starting at `start_index`
    ///
    /// Does not move the cursor; use `goto_item` for that.
    pub async fn activate_setlist(&self, setlist_id: Uuid, start_index: usize) -> Result<()> {
        let mut state = self.state.write().await;
        state.setlists.activate(setlist_id, start_index)?;
        info!("Activated setlist {} at item {}", setlist_id, start_index);
        self.emit_active_setlist(&state);
        Ok(())
    }

    pub async fn deactivate_setlist(&self) {
        let mut state = self.state.write().await;
        if state.setlists.active().is_some() {
            state.setlists.deactivate();
            info!("Deactivated setlist");
            self.emit_active_setlist(&state);
        }
    }

    fn setlist_changed(&self, setlist_id: Uuid) {
        self.emit(RrcEvent::SetlistChanged {
            setlist_id,
            timestamp: now(),
        });
    }
}
