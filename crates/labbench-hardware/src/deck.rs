//! Deck, slots, containers and wells
//!
//! Placeables live in an arena owned by [`Deck`] and are addressed by
//! [`PlaceableId`]. The hierarchy is `Deck -> Slot -> Container -> Well`.
//!
//! Clearing the deck truncates the arena back to the root and its slots.
//! Every id carries the generation it was issued in, so an id from before a
//! clear never resolves to a newer container that reused its index.

use crate::error::DeckError;
use crate::geometry::Vector;
use crate::labware::LabwareDefinition;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Default slot footprint in mm
pub const DEFAULT_SLOT_SIZE: Vector = Vector::new(100.0, 100.0, 0.0);

const SLOT_COLUMNS: &[char] = &['A', 'B', 'C', 'D', 'E'];
const SLOT_ROWS: usize = 3;

/// Generation of the root and slots; containers start at 1
const FIXED_GENERATION: u32 = 0;

/// Arena index of a placeable, tagged with the deck generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlaceableId {
    index: usize,
    generation: u32,
}

impl PlaceableId {
    const ROOT: Self = Self {
        index: 0,
        generation: FIXED_GENERATION,
    };
}

impl Display for PlaceableId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// What a placeable is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceableKind {
    /// Root of the hierarchy
    Deck,
    /// Deck position holding at most one container
    Slot,
    /// Plate, tiprack, trough...
    Container {
        /// Labware catalog name
        container_type: String,
    },
    /// Single well (or tip position) of a container
    Well,
}

/// Node in the placeable hierarchy
#[derive(Debug, Clone)]
pub struct Placeable {
    name: String,
    kind: PlaceableKind,
    parent: Option<PlaceableId>,
    children: Vec<PlaceableId>,
    coordinates: Vector,
    size: Vector,
    max_volume: f64,
    generation: u32,
}

impl Placeable {
    fn new(name: impl Into<String>, kind: PlaceableKind, coordinates: Vector, size: Vector) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            children: Vec::new(),
            coordinates,
            size,
            max_volume: 0.0,
            generation: FIXED_GENERATION,
        }
    }

    /// Label (container), slot name (slot) or well name (well)
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &PlaceableKind {
        &self.kind
    }

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<PlaceableId> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[PlaceableId] {
        &self.children
    }

    /// Coordinates relative to the parent
    #[inline]
    #[must_use]
    pub fn coordinates(&self) -> Vector {
        self.coordinates
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> Vector {
        self.size
    }

    /// Well capacity in uL (zero for non-wells)
    #[inline]
    #[must_use]
    pub fn max_volume(&self) -> f64 {
        self.max_volume
    }

    #[inline]
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self.kind, PlaceableKind::Container { .. })
    }

    /// Labware type for containers
    #[must_use]
    pub fn container_type(&self) -> Option<&str> {
        match &self.kind {
            PlaceableKind::Container { container_type } => Some(container_type),
            _ => None,
        }
    }
}

/// Robot deck
#[derive(Debug, Clone)]
pub struct Deck {
    nodes: Vec<Placeable>,
    slots: IndexMap<String, PlaceableId>,
    /// Root plus slots; everything past this is a container or well
    fixed: usize,
    generation: u32,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_SIZE)
    }
}

impl Deck {
    /// Create deck with slots `A1..E3` of the given footprint
    #[must_use]
    pub fn new(slot_size: Vector) -> Self {
        let columns = SLOT_COLUMNS.len() as f64;
        let root_size = Vector::new(slot_size.x * columns, slot_size.y * SLOT_ROWS as f64, 0.0);
        let mut deck = Self {
            nodes: vec![Placeable::new("deck", PlaceableKind::Deck, Vector::zero(), root_size)],
            slots: IndexMap::new(),
            fixed: 0,
            generation: FIXED_GENERATION,
        };
        let root = PlaceableId::ROOT;

        for (col, letter) in SLOT_COLUMNS.iter().enumerate() {
            for row in 0..SLOT_ROWS {
                let name = format!("{}{}", letter, row + 1);
                let coordinates = Vector::new(slot_size.x * col as f64, slot_size.y * row as f64, 0.0);
                let id = deck.push(root, Placeable::new(name.clone(), PlaceableKind::Slot, coordinates, slot_size));
                deck.slots.insert(name, id);
            }
        }
        deck.fixed = deck.nodes.len();
        deck.generation = FIXED_GENERATION + 1;
        deck
    }

    fn push(&mut self, parent: PlaceableId, mut node: Placeable) -> PlaceableId {
        let id = PlaceableId {
            index: self.nodes.len(),
            generation: self.generation,
        };
        node.parent = Some(parent);
        node.generation = self.generation;
        self.nodes.push(node);
        self.nodes[parent.index].children.push(id);
        id
    }

    /// Root placeable
    #[inline]
    #[must_use]
    pub fn root(&self) -> PlaceableId {
        PlaceableId::ROOT
    }

    /// Get placeable by id
    pub fn get(&self, id: PlaceableId) -> Result<&Placeable, DeckError> {
        self.nodes
            .get(id.index)
            .filter(|node| node.generation == id.generation)
            .ok_or(DeckError::UnknownPlaceable(id))
    }

    /// Number of arena nodes, including the root and slots
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Slot id by name (`A1`, `b2`, ...)
    #[must_use]
    pub fn slot(&self, name: &str) -> Option<PlaceableId> {
        self.slots.get(&name.to_ascii_uppercase()).copied()
    }

    /// Slot names in deck order
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Place a new container into an empty slot
    pub fn add_container(
        &mut self,
        slot_name: &str,
        label: &str,
        definition: &LabwareDefinition,
    ) -> Result<PlaceableId, DeckError> {
        let slot = self
            .slot(slot_name)
            .ok_or_else(|| DeckError::UnknownSlot(slot_name.to_string()))?;

        if let Some(&occupant) = self.nodes[slot.index].children.first() {
            return Err(DeckError::SlotOccupied {
                slot: self.nodes[slot.index].name.clone(),
                occupant: self.nodes[occupant.index].name.clone(),
            });
        }
        if self.container(label).is_some() {
            return Err(DeckError::DuplicateLabel(label.to_string()));
        }

        let kind = PlaceableKind::Container {
            container_type: definition.name.to_string(),
        };
        let container = self.push(slot, Placeable::new(label, kind, Vector::zero(), definition.size()));

        let names = definition.well_names();
        for (index, name) in names.into_iter().enumerate() {
            let (column, row) = (index / definition.rows, index % definition.rows);
            let mut well = Placeable::new(
                name,
                PlaceableKind::Well,
                definition.well_origin(row, column),
                definition.well_size(),
            );
            well.max_volume = definition.well.max_volume;
            self.push(container, well);
        }

        Ok(container)
    }

    /// All attached containers, label -> id, in slot order
    #[must_use]
    pub fn containers(&self) -> IndexMap<String, PlaceableId> {
        self.slots
            .values()
            .filter_map(|slot| self.nodes[slot.index].children.first().copied())
            .map(|id| (self.nodes[id.index].name.clone(), id))
            .collect()
    }

    /// Attached container by label
    #[must_use]
    pub fn container(&self, label: &str) -> Option<PlaceableId> {
        self.slots
            .values()
            .filter_map(|slot| self.nodes[slot.index].children.first().copied())
            .find(|id| self.nodes[id.index].name == label)
    }

    /// Wells of a container, column-major
    pub fn wells(&self, container: PlaceableId) -> Result<&[PlaceableId], DeckError> {
        let node = self.get(container)?;
        if !node.is_container() {
            return Err(DeckError::NotAContainer(container));
        }
        Ok(&node.children)
    }

    /// Well by name (`A1`) within a container
    pub fn well(&self, container: PlaceableId, name: &str) -> Result<PlaceableId, DeckError> {
        let wanted = name.to_ascii_uppercase();
        self.wells(container)?
            .iter()
            .copied()
            .find(|id| self.nodes[id.index].name == wanted)
            .ok_or_else(|| DeckError::UnknownWell {
                container: self.nodes[container.index].name.clone(),
                well: name.to_string(),
            })
    }

    /// Well by zero-based column-major index
    pub fn well_at(&self, container: PlaceableId, index: usize) -> Result<PlaceableId, DeckError> {
        self.wells(container)?
            .get(index)
            .copied()
            .ok_or_else(|| DeckError::UnknownWell {
                container: self.nodes[container.index].name.clone(),
                well: index.to_string(),
            })
    }

    /// The placeable followed by each of its ancestors, up to the deck root
    #[must_use]
    pub fn trace(&self, id: PlaceableId) -> Vec<PlaceableId> {
        let mut trace = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            let Ok(placeable) = self.get(node) else {
                break;
            };
            trace.push(node);
            current = placeable.parent;
        }
        trace
    }

    /// First container found walking up from `id` (inclusive)
    #[must_use]
    pub fn enclosing_container(&self, id: PlaceableId) -> Option<PlaceableId> {
        self.trace(id)
            .into_iter()
            .find(|node| self.nodes[node.index].is_container())
    }

    /// Name of the slot a container sits in
    #[must_use]
    pub fn slot_of(&self, container: PlaceableId) -> Option<&str> {
        let parent = self.get(container).ok()?.parent?;
        let slot = &self.nodes[parent.index];
        matches!(slot.kind, PlaceableKind::Slot).then_some(slot.name.as_str())
    }

    /// Position of the placeable origin in deck coordinates
    #[must_use]
    pub fn absolute_position(&self, id: PlaceableId) -> Vector {
        self.trace(id)
            .into_iter()
            .fold(Vector::zero(), |acc, node| acc + self.nodes[node.index].coordinates)
    }

    /// Point at normalized offsets from the center of `id`, relative to `reference`
    ///
    /// Offsets run from -1 to 1 along each axis: `z = -1` is the bottom
    /// of the placeable, `z = 1` its top.
    pub fn from_center(
        &self,
        id: PlaceableId,
        x: f64,
        y: f64,
        z: f64,
        reference: PlaceableId,
    ) -> Result<Vector, DeckError> {
        let node = self.get(id)?;
        self.get(reference)?;

        let half = node.size * 0.5;
        let local = half + Vector::new(x, y, z).scale(half);
        Ok(self.absolute_position(id) + local - self.absolute_position(reference))
    }

    /// Human-readable location, e.g. `A1 of plate`
    #[must_use]
    pub fn describe(&self, id: PlaceableId) -> String {
        let Ok(node) = self.get(id) else {
            return id.to_string();
        };
        match (&node.kind, node.parent) {
            (PlaceableKind::Well, Some(parent)) => {
                format!("{} of {}", node.name, self.nodes[parent.index].name)
            }
            _ => node.name.clone(),
        }
    }

    /// Remove every container and well, invalidating their ids
    pub fn clear_containers(&mut self) {
        self.nodes.truncate(self.fixed);
        for slot in self.slots.values() {
            self.nodes[slot.index].children.clear();
        }
        self.generation += 1;
    }

    /// Check if an id still resolves to a placeable under the deck root
    #[must_use]
    pub fn is_attached(&self, id: PlaceableId) -> bool {
        self.trace(id).last() == Some(&self.root())
    }
}
