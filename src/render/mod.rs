//! Inventory image rendering.
//!
//! A kill's victim equipment and inventory are merged into an
//! [`InventorySlotMap`], whose present items are drawn by [`GridComposer`] as a
//! fixed-column grid of icons fetched through an [`IconSource`].

pub mod grid;
pub mod icons;

use std::fmt;

use crate::killboard::{Item, KillEvent};

pub use grid::{count_label, load_font, GridComposer, GridLayout};
pub use icons::{IconError, IconSource, RenderServiceIcons};

/// Failure to produce an encoded image.
#[derive(Debug)]
pub enum RenderError {
    Encode(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Encode(msg) => write!(f, "failed to encode image: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

/// Ordered slot-key → item view of a victim's gear.
///
/// Equipment slots come first in remote order (empty slots kept as `None`),
/// followed by `Inventory_Item_{index}` for each non-empty inventory cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventorySlotMap {
    slots: Vec<(String, Option<Item>)>,
}

impl InventorySlotMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_kill(event: &KillEvent) -> Self {
        let mut map = Self::new();
        for (slot, item) in &event.victim_equipment {
            map.insert(slot.clone(), item.clone());
        }
        for (index, item) in event.victim_inventory.iter().enumerate() {
            if let Some(item) = item {
                map.insert(format!("Inventory_Item_{}", index), Some(item.clone()));
            }
        }
        map
    }

    /// Inserts or replaces a slot, keeping the original position on replace.
    pub fn insert(&mut self, slot: String, item: Option<Item>) {
        match self.slots.iter_mut().find(|(key, _)| *key == slot) {
            Some(existing) => existing.1 = item,
            None => self.slots.push((slot, item)),
        }
    }

    /// Present items in slot order.
    pub fn items(&self) -> impl Iterator<Item = (&str, &Item)> {
        self.slots
            .iter()
            .filter_map(|(slot, item)| item.as_ref().map(|i| (slot.as_str(), i)))
    }

    pub fn item_count(&self) -> usize {
        self.items().count()
    }

    pub fn has_items(&self) -> bool {
        self.items().next().is_some()
    }

    /// Number of slots including empty ones.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{item, kill};

    #[test]
    fn test_from_kill_merges_equipment_then_inventory() {
        let mut event = kill("E1", "2024-01-01T00:00:00Z");
        event.victim_equipment = vec![
            ("MainHand".to_string(), Some(item("T8_MAIN_SWORD", 1))),
            ("OffHand".to_string(), None),
            ("Potion".to_string(), Some(item("T6_POTION_HEAL", 5))),
        ];
        event.victim_inventory = vec![None, Some(item("T4_BAG", 1)), None, Some(item("T5_FISH", 3))];

        let map = InventorySlotMap::from_kill(&event);
        assert_eq!(map.len(), 5);
        assert_eq!(map.item_count(), 4);

        let keys: Vec<&str> = map.items().map(|(slot, _)| slot).collect();
        assert_eq!(
            keys,
            vec!["MainHand", "Potion", "Inventory_Item_1", "Inventory_Item_3"]
        );
    }

    #[test]
    fn test_empty_gear_has_no_items() {
        let mut event = kill("E1", "2024-01-01T00:00:00Z");
        event.victim_equipment = vec![("Head".to_string(), None)];
        event.victim_inventory = vec![None, None];

        let map = InventorySlotMap::from_kill(&event);
        assert!(!map.has_items());
        assert!(!map.is_empty());
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut map = InventorySlotMap::new();
        map.insert("A".to_string(), Some(item("X", 1)));
        map.insert("B".to_string(), Some(item("Y", 1)));
        map.insert("A".to_string(), Some(item("Z", 2)));

        let items: Vec<(&str, &str)> = map
            .items()
            .map(|(slot, i)| (slot, i.item_type.as_str()))
            .collect();
        assert_eq!(items, vec![("A", "Z"), ("B", "Y")]);
    }
}
