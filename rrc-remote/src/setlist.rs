//! In-memory setlists
//!
//! A setlist is an ordered selection of regions, independent of timeline
//! order. At most one setlist is active; while active, navigation follows
//! its items instead of the region timeline.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One entry of a setlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetlistItem {
    pub id: Uuid,
    /// DAW region number (may refer to a region that no longer exists)
    pub region_id: u32,
    /// Display label overriding the region name
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setlist {
    pub id: Uuid,
    pub name: String,
    pub items: Vec<SetlistItem>,
}

/// Which setlist is active and where in it we are
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ActivePosition {
    setlist_id: Uuid,
    index: usize,
}

/// Setlist store with active-setlist tracking
#[derive(Debug, Default)]
pub struct SetlistManager {
    /// Creation order
    setlists: Vec<Setlist>,
    active: Option<ActivePosition>,
}

fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Setlist name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

impl SetlistManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, name: &str) -> Result<Setlist> {
        let setlist = Setlist {
            id: Uuid::new_v4(),
            name: validate_name(name)?,
            items: Vec::new(),
        };
        self.setlists.push(setlist.clone());
        Ok(setlist)
    }

    pub fn rename(&mut self, id: Uuid, name: &str) -> Result<Setlist> {
        let name = validate_name(name)?;
        let setlist = self.get_mut(id)?;
        setlist.name = name;
        Ok(setlist.clone())
    }

    /// Delete a setlist; returns true if it was the active one
    pub fn delete(&mut self, id: Uuid) -> Result<bool> {
        let index = self
            .setlists
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| not_found(id))?;
        self.setlists.remove(index);

        let was_active = self.active.is_some_and(|a| a.setlist_id == id);
        if was_active {
            self.active = None;
        }
        Ok(was_active)
    }

    pub fn get(&self, id: Uuid) -> Result<&Setlist> {
        self.setlists
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found(id))
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut Setlist> {
        self.setlists
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found(id))
    }

    pub fn list(&self) -> &[Setlist] {
        &self.setlists
    }

    /// Insert a region into a setlist (`position` None appends)
    pub fn add_item(
        &mut self,
        setlist_id: Uuid,
        region_id: u32,
        label: Option<String>,
        position: Option<usize>,
    ) -> Result<SetlistItem> {
        let active = self.active;
        let setlist = self.get_mut(setlist_id)?;

        let position = position.unwrap_or(setlist.items.len());
        if position > setlist.items.len() {
            return Err(Error::InvalidInput(format!(
                "Position {} out of range (setlist has {} items)",
                position,
                setlist.items.len()
            )));
        }

        let item = SetlistItem {
            id: Uuid::new_v4(),
            region_id,
            label: label.filter(|l| !l.trim().is_empty()),
        };
        setlist.items.insert(position, item.clone());

        // Keep the active index on the same item
        if let Some(mut a) = active.filter(|a| a.setlist_id == setlist_id) {
            if position <= a.index {
                a.index += 1;
                self.active = Some(a);
            }
        }
        Ok(item)
    }

    pub fn remove_item(&mut self, setlist_id: Uuid, item_id: Uuid) -> Result<SetlistItem> {
        let active = self.active;
        let setlist = self.get_mut(setlist_id)?;
        let index = setlist
            .items
            .iter()
            .position(|i| i.id == item_id)
            .ok_or_else(|| Error::NotFound(format!("Setlist item {}", item_id)))?;
        let removed = setlist.items.remove(index);
        let remaining = setlist.items.len();

        if let Some(mut a) = active.filter(|a| a.setlist_id == setlist_id) {
            if remaining == 0 {
                self.active = None;
            } else {
                if index < a.index {
                    a.index -= 1;
                }
                a.index = a.index.min(remaining - 1);
                self.active = Some(a);
            }
        }
        Ok(removed)
    }

    /// Move the item at `from` so that it ends up at index `to`
    pub fn move_item(&mut self, setlist_id: Uuid, from: usize, to: usize) -> Result<()> {
        let active = self.active;
        let setlist = self.get_mut(setlist_id)?;
        let len = setlist.items.len();
        if from >= len || to >= len {
            return Err(Error::InvalidInput(format!(
                "Move {} -> {} out of range (setlist has {} items)",
                from, to, len
            )));
        }

        let current_item = active
            .filter(|a| a.setlist_id == setlist_id)
            .and_then(|a| setlist.items.get(a.index).map(|i| i.id));

        let item = setlist.items.remove(from);
        setlist.items.insert(to, item);

        if let Some(item_id) = current_item {
            if let Some(index) = setlist.items.iter().position(|i| i.id == item_id) {
                self.active = Some(ActivePosition { setlist_id, index });
            }
        }
        Ok(())
    }

    pub fn activate(&mut self, setlist_id: Uuid, start_index: usize) -> Result<()> {
        let setlist = self.get(setlist_id)?;
        if start_index >= setlist.items.len() {
            return Err(Error::InvalidInput(format!(
                "Index {} out of range (setlist '{}' has {} items)",
                start_index,
                setlist.name,
                setlist.items.len()
            )));
        }
        self.active = Some(ActivePosition {
            setlist_id,
            index: start_index,
        });
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = None;
    }

    pub fn active(&self) -> Option<&Setlist> {
        let active = self.active?;
        self.setlists.iter().find(|s| s.id == active.setlist_id)
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active.map(|a| a.index)
    }

    pub fn set_active_index(&mut self, index: usize) -> Result<()> {
        let setlist = self
            .active()
            .ok_or_else(|| Error::InvalidState("No active setlist".to_string()))?;
        if index >= setlist.items.len() {
            return Err(Error::InvalidInput(format!(
                "Index {} out of range (setlist has {} items)",
                index,
                setlist.items.len()
            )));
        }
        let setlist_id = setlist.id;
        self.active = Some(ActivePosition { setlist_id, index });
        Ok(())
    }

    pub fn current_item(&self) -> Option<&SetlistItem> {
        let index = self.active_index()?;
        self.active()?.items.get(index)
    }

    pub fn next_index(&self) -> Option<usize> {
        let next = self.active_index()? + 1;
        (next < self.active()?.items.len()).then_some(next)
    }

    pub fn previous_index(&self) -> Option<usize> {
        self.active_index()?.checked_sub(1)
    }

    /// Index of `region_id` in the active setlist
    ///
    /// Prefers the first occurrence at or after the current index, so a
    /// region played twice in a set resolves to the upcoming occurrence.
    pub fn index_for_region(&self, region_id: u32) -> Option<usize> {
        let setlist = self.active()?;
        let current = self.active_index().unwrap_or(0);
        setlist
            .items
            .iter()
            .enumerate()
            .skip(current)
            .chain(setlist.items.iter().enumerate().take(current))
            .find(|(_, item)| item.region_id == region_id)
            .map(|(index, _)| index)
    }
}

fn not_found(id: Uuid) -> Error {
    Error::NotFound(format!("Setlist {}", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(regions: &[u32]) -> (SetlistManager, Uuid) {
        let mut manager = SetlistManager::new();
        let id = manager.create("Friday").unwrap().id;
        for region_id in regions {
            manager.add_item(id, *region_id, None, None).unwrap();
        }
        (manager, id)
    }

    fn region_ids(manager: &SetlistManager, id: Uuid) -> Vec<u32> {
        manager
            .get(id)
            .unwrap()
            .items
            .iter()
            .map(|i| i.region_id)
            .collect()
    }

    #[test]
    fn test_create_rejects_empty_name() {
        let mut manager = SetlistManager::new();
        assert!(matches!(manager.create("   "), Err(Error::InvalidInput(_))));
        assert_eq!(manager.create("  Set A ").unwrap().name, "Set A");
    }

    #[test]
    fn test_rename_and_unknown_ids() {
        let (mut manager, id) = manager_with(&[]);
        assert_eq!(manager.rename(id, "Saturday").unwrap().name, "Saturday");
        assert!(matches!(
            manager.rename(Uuid::new_v4(), "x"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(manager.delete(Uuid::new_v4()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_add_item_at_position() {
        let (mut manager, id) = manager_with(&[1, 3]);
        manager.add_item(id, 2, Some("Two".to_string()), Some(1)).unwrap();
        assert_eq!(region_ids(&manager, id), vec![1, 2, 3]);
        assert!(matches!(
            manager.add_item(id, 4, None, Some(9)),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_blank_label_dropped() {
        let (mut manager, id) = manager_with(&[]);
        let item = manager.add_item(id, 1, Some("  ".to_string()), None).unwrap();
        assert_eq!(item.label, None);
    }

    #[test]
    fn test_activate_and_step() {
        let (mut manager, id) = manager_with(&[5, 6, 7]);
        assert!(matches!(manager.activate(id, 3), Err(Error::InvalidInput(_))));

        manager.activate(id, 0).unwrap();
        assert_eq!(manager.current_item().unwrap().region_id, 5);
        assert_eq!(manager.previous_index(), None);
        assert_eq!(manager.next_index(), Some(1));

        manager.set_active_index(2).unwrap();
        assert_eq!(manager.next_index(), None);
        assert_eq!(manager.previous_index(), Some(1));
    }

    #[test]
    fn test_set_active_index_without_active_setlist() {
        let (mut manager, _) = manager_with(&[1]);
        assert!(matches!(
            manager.set_active_index(0),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn test_delete_active_deactivates() {
        let (mut manager, id) = manager_with(&[1]);
        manager.activate(id, 0).unwrap();
        assert!(manager.delete(id).unwrap());
        assert!(manager.active().is_none());
        assert!(manager.active_index().is_none());
    }

    #[test]
    fn test_remove_item_before_active_keeps_current() {
        let (mut manager, id) = manager_with(&[1, 2, 3]);
        manager.activate(id, 2).unwrap();
        let first = manager.get(id).unwrap().items[0].id;
        manager.remove_item(id, first).unwrap();
        assert_eq!(manager.active_index(), Some(1));
        assert_eq!(manager.current_item().unwrap().region_id, 3);
    }

    #[test]
    fn test_remove_current_last_item_clamps() {
        let (mut manager, id) = manager_with(&[1, 2]);
        manager.activate(id, 1).unwrap();
        let last = manager.get(id).unwrap().items[1].id;
        manager.remove_item(id, last).unwrap();
        assert_eq!(manager.active_index(), Some(0));

        let only = manager.get(id).unwrap().items[0].id;
        manager.remove_item(id, only).unwrap();
        assert!(manager.active().is_none());
    }

    #[test]
    fn test_insert_before_active_keeps_current() {
        let (mut manager, id) = manager_with(&[1, 2]);
        manager.activate(id, 1).unwrap();
        manager.add_item(id, 9, None, Some(0)).unwrap();
        assert_eq!(manager.active_index(), Some(2));
        assert_eq!(manager.current_item().unwrap().region_id, 2);
    }

    #[test]
    fn test_move_item_tracks_active_item() {
        let (mut manager, id) = manager_with(&[1, 2, 3, 4]);
        manager.activate(id, 1).unwrap();
        manager.move_item(id, 3, 0).unwrap();
        assert_eq!(region_ids(&manager, id), vec![4, 1, 2, 3]);
        assert_eq!(manager.current_item().unwrap().region_id, 2);

        manager.move_item(id, 2, 3).unwrap();
        assert_eq!(region_ids(&manager, id), vec![4, 1, 3, 2]);
        assert_eq!(manager.active_index(), Some(3));

        assert!(matches!(manager.move_item(id, 0, 4), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_index_for_region_prefers_upcoming_occurrence() {
        let (mut manager, id) = manager_with(&[1, 2, 1, 3]);
        manager.activate(id, 1).unwrap();
        assert_eq!(manager.index_for_region(1), Some(2));
        assert_eq!(manager.index_for_region(3), Some(3));

        manager.set_active_index(3).unwrap();
        assert_eq!(manager.index_for_region(1), Some(0));
        assert_eq!(manager.index_for_region(99), None);
    }
}
