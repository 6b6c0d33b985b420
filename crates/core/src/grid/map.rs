use crate::{
    grid::{ray, Cell, Direction, Footprint, GridPoint, Rotation},
    layer::LayerId,
    module::{ModuleDescriptor, ModuleId},
    rule::{RuleId, TileSource},
};
use log::{error, trace};
use serde::{Deserialize, Serialize};

/// The grid of cells that a map is built on. Owns every [Cell]; cells refer to
/// each other only by flat index (see [Cell::parent]).
///
/// All lookups are bounds-checked. Anything outside the grid is simply "not
/// there", i.e. `None` or `false`, rather than an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridMap {
    width: u16,
    height: u16,
    /// Row-major. `cells.len() == width * height` always.
    cells: Vec<Cell>,
}

impl GridMap {
    /// Create an empty grid
    pub fn new(width: u16, height: u16) -> Self {
        let cells = (0..height as i32)
            .flat_map(|y| {
                (0..width as i32).map(move |x| Cell::new(GridPoint::new(x, y)))
            })
            .collect();
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// All cells, in row-major order
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Does this position fall inside the grid?
    pub fn contains(&self, position: GridPoint) -> bool {
        position.x >= 0
            && position.y >= 0
            && position.x < self.width as i32
            && position.y < self.height as i32
    }

    /// Flat index of a position, or `None` if it's outside the grid
    pub fn index_of(&self, position: GridPoint) -> Option<usize> {
        if self.contains(position) {
            Some(position.y as usize * self.width as usize + position.x as usize)
        } else {
            None
        }
    }

    /// Get the cell at a position. Returns `None` outside the grid.
    pub fn get(&self, position: GridPoint) -> Option<&Cell> {
        self.index_of(position).map(|i| &self.cells[i])
    }

    /// Get a cell by flat index. Returns `None` if out of range.
    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Flat index of the origin of whatever covers `index`. For empty cells
    /// and origin cells, this is `index` itself.
    pub fn origin_index(&self, index: usize) -> usize {
        self.cells
            .get(index)
            .and_then(Cell::parent)
            .unwrap_or(index)
    }

    /// The origin cell of whatever covers `position`
    pub fn origin_of(&self, position: GridPoint) -> Option<&Cell> {
        let index = self.index_of(position)?;
        self.cell(self.origin_index(index))
    }

    /// Check if a module with the given footprint can be placed with its
    /// origin at `origin`. True iff every cell of the rotated footprint exists
    /// and is empty.
    pub fn is_footprint_free(
        &self,
        origin: GridPoint,
        footprint: Footprint,
        rotation: Rotation,
    ) -> bool {
        footprint
            .cells(origin, rotation)
            .all(|pos| self.get(pos).map_or(false, Cell::is_empty))
    }

    /// Check if the rotated footprint fits within the grid bounds, ignoring
    /// whatever is already placed there
    pub fn footprint_in_bounds(
        &self,
        origin: GridPoint,
        footprint: Footprint,
        rotation: Rotation,
    ) -> bool {
        footprint.cells(origin, rotation).all(|pos| self.contains(pos))
    }

    /// Place a module. The origin cell and every other cell of the rotated
    /// footprint get the module, rotation, rule, and layer; non-origin cells
    /// point back at the origin.
    ///
    /// The caller is expected to have already checked that the space is free
    /// (see [Self::is_footprint_free]). If it isn't, this logs an error and
    /// does nothing. Returns whether the module was placed.
    pub fn place(
        &mut self,
        origin: GridPoint,
        rotation: Rotation,
        module: &ModuleDescriptor,
        rule: Option<&RuleId>,
        layer: Option<&LayerId>,
    ) -> bool {
        if !self.is_footprint_free(origin, module.footprint, rotation) {
            error!(
                "cannot place module {} at {} facing {:?}: footprint {:?} \
                does not fit",
                module.id, origin, rotation, module.footprint
            );
            return false;
        }
        self.write_footprint(origin, rotation, module, rule, layer);
        true
    }

    /// Place a module, first clearing out every existing module that overlaps
    /// the new footprint (including the parts of those modules that lie
    /// outside the new footprint). The footprint still has to be in bounds.
    /// Returns whether the module was placed.
    pub fn replace(
        &mut self,
        origin: GridPoint,
        rotation: Rotation,
        module: &ModuleDescriptor,
        rule: Option<&RuleId>,
        layer: Option<&LayerId>,
    ) -> bool {
        if !self.footprint_in_bounds(origin, module.footprint, rotation) {
            error!(
                "cannot replace with module {} at {} facing {:?}: footprint \
                {:?} is out of bounds",
                module.id, origin, rotation, module.footprint
            );
            return false;
        }
        let covered: Vec<usize> = module
            .footprint
            .cells(origin, rotation)
            .filter_map(|pos| self.index_of(pos))
            .collect();
        for index in covered {
            if !self.cells[index].is_empty() {
                self.clear_footprint(index);
            }
        }
        self.write_footprint(origin, rotation, module, rule, layer);
        true
    }

    /// Remove whatever module covers the cell at `index`, emptying every cell
    /// of its footprint. Does nothing for empty cells.
    pub fn clear_footprint(&mut self, index: usize) {
        if index >= self.cells.len() {
            return;
        }
        let origin = self.origin_index(index);
        trace!("Clearing footprint of {}", self.cells[origin].position);
        for cell in self.cells.iter_mut() {
            if cell.parent == Some(origin) {
                cell.clear();
            }
        }
        self.cells[origin].clear();
    }

    fn write_footprint(
        &mut self,
        origin: GridPoint,
        rotation: Rotation,
        module: &ModuleDescriptor,
        rule: Option<&RuleId>,
        layer: Option<&LayerId>,
    ) {
        let origin_index = match self.index_of(origin) {
            Some(index) => index,
            None => return,
        };
        let covered: Vec<usize> = module
            .footprint
            .cells(origin, rotation)
            .filter_map(|pos| self.index_of(pos))
            .collect();
        for index in covered {
            let cell = &mut self.cells[index];
            cell.rotation = rotation;
            cell.module = Some(module.id.clone());
            cell.rule = rule.cloned();
            cell.layer = layer.cloned();
            cell.parent = if index == origin_index {
                None
            } else {
                Some(origin_index)
            };
        }
    }

    /// The position to measure neighbors from. When snapping, that's the
    /// origin of the footprint containing `position`.
    fn anchor(&self, position: GridPoint, snap_to_parent: bool) -> GridPoint {
        if snap_to_parent {
            self.origin_of(position)
                .map_or(position, |origin| origin.position)
        } else {
            position
        }
    }

    /// Get the neighbor `distance` steps away in one of the four cardinal
    /// directions. With `snap_to_parent`, the step is taken from the origin of
    /// the module covering `position`, so every cell of a multi-cell module
    /// gives the same answer. Returns `None` outside the grid.
    pub fn neighbor4(
        &self,
        position: GridPoint,
        rotation: Rotation,
        distance: u32,
        snap_to_parent: bool,
    ) -> Option<&Cell> {
        self.neighbor8(position, rotation.direction(), distance, snap_to_parent)
    }

    /// Same as [Self::neighbor4], but also allows diagonal directions
    pub fn neighbor8(
        &self,
        position: GridPoint,
        direction: Direction,
        distance: u32,
        snap_to_parent: bool,
    ) -> Option<&Cell> {
        let anchor = self.anchor(position, snap_to_parent);
        self.get(anchor.step(direction, distance)?)
    }

    /// All existing cardinal neighbors at the given distance
    pub fn neighbors4(
        &self,
        position: GridPoint,
        distance: u32,
        snap_to_parent: bool,
    ) -> impl Iterator<Item = &Cell> {
        Rotation::all().filter_map(move |rotation| {
            self.neighbor4(position, rotation, distance, snap_to_parent)
        })
    }

    /// All existing neighbors (cardinal and diagonal) at the given distance
    pub fn neighbors8(
        &self,
        position: GridPoint,
        distance: u32,
        snap_to_parent: bool,
    ) -> impl Iterator<Item = &Cell> {
        Direction::all().filter_map(move |direction| {
            self.neighbor8(position, direction, distance, snap_to_parent)
        })
    }

    /// Scan outward from `position` looking for a module that belongs to any
    /// of the given sources.
    ///
    /// ## Arguments
    ///
    /// - `sources`: Anything that can claim a module (see [TileSource])
    /// - `directions`: Directions to scan in. `None` means all 8.
    /// - `rotations`: If given, a matching neighbor must also have one of
    ///   these rotations
    /// - `max_distance`: How many steps to scan in each direction
    /// - `snap_to_parent`: Scan from the origin of the module at `position`
    ///
    /// Cells belonging to the same module as `position` never match. Each scan
    /// stops at the edge of the grid, so a scan from outside the grid finds
    /// nothing.
    pub fn check_for_tiles(
        &self,
        position: GridPoint,
        sources: &[TileSource],
        directions: Option<&[Direction]>,
        rotations: Option<&[Rotation]>,
        max_distance: u32,
        snap_to_parent: bool,
    ) -> bool {
        let anchor = self.anchor(position, snap_to_parent);
        let own_origin = self
            .index_of(position)
            .filter(|i| !self.cells[*i].is_empty())
            .map(|i| self.origin_index(i));

        let matches = |cell: &Cell| -> bool {
            let index = match self.index_of(cell.position) {
                Some(index) => index,
                None => return false,
            };
            if own_origin == Some(self.origin_index(index)) {
                return false;
            }
            let rotation_ok = rotations
                .map_or(true, |rotations| rotations.contains(&cell.rotation));
            rotation_ok && sources.iter().any(|source| source.owns(cell))
        };

        let scan = |direction: Direction| {
            ray(anchor, direction, max_distance)
                .map_while(|pos| self.get(pos))
                .any(&matches)
        };
        match directions {
            Some(directions) => directions.iter().copied().any(scan),
            None => Direction::all().any(scan),
        }
    }

    /// All origin cells whose module was placed by the given rule
    pub fn find_by_rule(&self, rule: &RuleId) -> Vec<&Cell> {
        self.origins()
            .filter(|cell| cell.rule.as_ref() == Some(rule))
            .collect()
    }

    /// All origin cells whose module was placed by the given layer
    pub fn find_by_layer(&self, layer: &LayerId) -> Vec<&Cell> {
        self.origins()
            .filter(|cell| cell.layer.as_ref() == Some(layer))
            .collect()
    }

    /// All origin cells holding the given module
    pub fn find_by_module(&self, module: &ModuleId) -> Vec<&Cell> {
        self.origins()
            .filter(|cell| cell.module.as_ref() == Some(module))
            .collect()
    }

    /// Every origin cell, in row-major order
    pub fn origins(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().filter(|cell| cell.is_origin())
    }

    /// Number of cells that are still empty
    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(id: &str, width: u16, height: u16) -> ModuleDescriptor {
        ModuleDescriptor::new(id, Footprint::new(width, height))
    }

    #[test]
    fn test_get_bounds() {
        let map = GridMap::new(3, 2);
        assert_eq!(map.cells().len(), 6);
        assert_eq!(
            map.get(GridPoint::new(2, 1)).map(Cell::position),
            Some(GridPoint::new(2, 1))
        );
        assert!(map.get(GridPoint::new(3, 0)).is_none());
        assert!(map.get(GridPoint::new(0, 2)).is_none());
        assert!(map.get(GridPoint::new(-1, 0)).is_none());
    }

    #[test]
    fn test_place_multi_cell() {
        let mut map = GridMap::new(4, 4);
        let hall = module("hall", 3, 1);
        let rule = RuleId::from("halls");
        let origin = GridPoint::new(1, 1);
        assert!(map.place(origin, Rotation::East, &hall, Some(&rule), None));

        // East swaps to 1x3, covering (1,1) (1,2) (1,3)
        let origin_index = map.index_of(origin).unwrap();
        for y in 1..=3 {
            let cell = map.get(GridPoint::new(1, y)).unwrap();
            assert_eq!(cell.module(), Some(&hall.id));
            assert_eq!(cell.rotation(), Rotation::East);
            assert_eq!(cell.rule(), Some(&rule));
            let expected_parent = if y == 1 { None } else { Some(origin_index) };
            assert_eq!(cell.parent(), expected_parent);
        }
        assert!(map.get(GridPoint::new(2, 1)).unwrap().is_empty());
        assert_eq!(map.origins().count(), 1);
    }

    #[test]
    fn test_place_does_not_fit() {
        let mut map = GridMap::new(3, 3);
        let big = module("big", 2, 2);
        // Off the edge
        assert!(!map.place(
            GridPoint::new(2, 2),
            Rotation::North,
            &big,
            None,
            None
        ));
        assert_eq!(map.empty_count(), 9);

        // Overlapping
        assert!(map.place(GridPoint::ORIGIN, Rotation::North, &big, None, None));
        assert!(!map.place(
            GridPoint::new(1, 1),
            Rotation::North,
            &big,
            None,
            None
        ));
        assert_eq!(map.empty_count(), 5);
    }

    #[test]
    fn test_is_footprint_free_all_rotations() {
        let mut map = GridMap::new(4, 4);
        let tall = module("tall", 1, 3);
        map.place(
            GridPoint::new(2, 2),
            Rotation::North,
            &module("blocker", 1, 1),
            None,
            None,
        );
        for rotation in Rotation::all() {
            for y in 0..4 {
                for x in 0..4 {
                    let origin = GridPoint::new(x, y);
                    let expected = tall
                        .footprint
                        .cells(origin, rotation)
                        .all(|pos| map.get(pos).map_or(false, Cell::is_empty));
                    let free =
                        map.is_footprint_free(origin, tall.footprint, rotation);
                    assert_eq!(free, expected, "{origin} {rotation:?}");
                    // Anything reported free has to be placeable
                    if free {
                        let mut copy = map.clone();
                        assert!(copy.place(origin, rotation, &tall, None, None));
                    }
                }
            }
        }
    }

    #[test]
    fn test_replace_and_clear() {
        let mut map = GridMap::new(4, 1);
        let wide = module("wide", 2, 1);
        let small = module("small", 1, 1);
        map.place(GridPoint::ORIGIN, Rotation::North, &wide, None, None);
        map.place(GridPoint::new(2, 0), Rotation::North, &wide, None, None);
        assert_eq!(map.empty_count(), 0);

        // Replacing the middle knocks out both wide modules entirely
        assert!(map.replace(
            GridPoint::new(1, 0),
            Rotation::North,
            &wide,
            None,
            None
        ));
        assert!(map.get(GridPoint::new(0, 0)).unwrap().is_empty());
        assert!(map.get(GridPoint::new(3, 0)).unwrap().is_empty());
        assert_eq!(
            map.origin_of(GridPoint::new(2, 0)).unwrap().position(),
            GridPoint::new(1, 0)
        );

        map.clear_footprint(2);
        assert_eq!(map.empty_count(), 4);

        assert!(!map.replace(
            GridPoint::new(3, 0),
            Rotation::North,
            &wide,
            None,
            None
        ));
        assert!(map.replace(
            GridPoint::new(3, 0),
            Rotation::North,
            &small,
            None,
            None
        ));
    }

    #[test]
    fn test_neighbors_snap_to_parent() {
        let mut map = GridMap::new(5, 5);
        let square = module("square", 2, 2);
        map.place(GridPoint::new(1, 1), Rotation::North, &square, None, None);

        // Without snapping, the query is relative to the sub-cell
        let from_child = map
            .neighbor4(GridPoint::new(2, 2), Rotation::West, 1, false)
            .unwrap();
        assert_eq!(from_child.position(), GridPoint::new(1, 2));

        // With snapping, every sub-cell behaves like the origin
        for pos in square.footprint.cells(GridPoint::new(1, 1), Rotation::North)
        {
            let cell = map.neighbor4(pos, Rotation::West, 1, true).unwrap();
            assert_eq!(cell.position(), GridPoint::new(0, 1));
            let diagonal =
                map.neighbor8(pos, Direction::SouthWest, 1, true).unwrap();
            assert_eq!(diagonal.position(), GridPoint::new(0, 0));
        }

        assert!(map
            .neighbor8(GridPoint::ORIGIN, Direction::SouthWest, 1, false)
            .is_none());
        assert_eq!(map.neighbors4(GridPoint::ORIGIN, 1, false).count(), 2);
        assert_eq!(map.neighbors8(GridPoint::new(2, 2), 1, false).count(), 8);
    }

    #[test]
    fn test_check_for_tiles() {
        let mut map = GridMap::new(6, 6);
        let tree = module("tree", 1, 1);
        let rock = module("rock", 1, 1);
        let layer = LayerId::from("decor");
        map.place(GridPoint::new(3, 0), Rotation::South, &tree, None, Some(&layer));
        map.place(GridPoint::new(0, 3), Rotation::North, &rock, None, None);

        let trees = [TileSource::Module(tree.id.clone())];
        // Distance matters
        assert!(!map.check_for_tiles(GridPoint::ORIGIN, &trees, None, None, 2, false));
        assert!(map.check_for_tiles(GridPoint::ORIGIN, &trees, None, None, 3, false));
        // Direction filter
        assert!(!map.check_for_tiles(
            GridPoint::ORIGIN,
            &trees,
            Some(&[Direction::North]),
            None,
            5,
            false
        ));
        // Rotation filter
        assert!(!map.check_for_tiles(
            GridPoint::ORIGIN,
            &trees,
            None,
            Some(&[Rotation::North]),
            5,
            false
        ));
        // Layer sources
        assert!(map.check_for_tiles(
            GridPoint::ORIGIN,
            &[TileSource::Layer(layer)],
            Some(&[Direction::East]),
            Some(&[Rotation::South]),
            3,
            false
        ));
        // A module never finds itself
        assert!(!map.check_for_tiles(
            GridPoint::new(3, 0),
            &trees,
            None,
            None,
            5,
            false
        ));
    }

    #[test]
    fn test_neighbor_past_edge() {
        let mut map = GridMap::new(3, 3);
        let wall = module("wall", 1, 1);
        map.place(GridPoint::ORIGIN, Rotation::North, &wall, None, None);
        let center = GridPoint::new(1, 1);

        assert!(map.neighbor8(center, Direction::East, 2, false).is_none());
        assert!(map.neighbor4(center, Rotation::South, 3, false).is_none());
        let huge = [4, i32::MAX as u32, i32::MAX as u32 + 1, u32::MAX];
        for direction in Direction::all() {
            for distance in huge {
                assert!(
                    map.neighbor8(center, direction, distance, false).is_none(),
                    "{direction:?} {distance}"
                );
            }
        }
        assert_eq!(map.neighbors8(center, u32::MAX, true).count(), 0);
    }

    #[test]
    fn test_check_for_tiles_past_edge() {
        let mut map = GridMap::new(3, 3);
        let wall = module("wall", 1, 1);
        map.place(GridPoint::ORIGIN, Rotation::North, &wall, None, None);
        let walls = [TileSource::Module(wall.id.clone())];
        let center = GridPoint::new(1, 1);

        // Scans past the edge still see everything inside the grid
        assert!(map.check_for_tiles(
            center,
            &walls,
            None,
            None,
            u32::MAX,
            false
        ));
        assert!(map.check_for_tiles(
            center,
            &walls,
            Some(&[Direction::SouthWest]),
            None,
            200_000_000,
            false
        ));
        // But never wrap around to the other side
        assert!(!map.check_for_tiles(
            center,
            &walls,
            Some(&[Direction::East, Direction::NorthEast, Direction::North]),
            None,
            u32::MAX,
            false
        ));
        // Nothing is found from outside the grid
        assert!(!map.check_for_tiles(
            GridPoint::new(-1, 0),
            &walls,
            None,
            None,
            u32::MAX,
            false
        ));
    }

    #[test]
    fn test_find_by_rule_and_layer() {
        let mut map = GridMap::new(4, 4);
        let rule = RuleId::from("r");
        let layer = LayerId::from("l");
        let big = module("big", 2, 2);
        map.place(GridPoint::ORIGIN, Rotation::North, &big, Some(&rule), Some(&layer));
        map.place(GridPoint::new(2, 2), Rotation::North, &big, Some(&rule), None);

        let by_rule: Vec<GridPoint> =
            map.find_by_rule(&rule).iter().map(|c| c.position()).collect();
        assert_eq!(by_rule, vec![GridPoint::ORIGIN, GridPoint::new(2, 2)]);
        assert_eq!(map.find_by_layer(&layer).len(), 1);
        assert_eq!(map.find_by_module(&big.id).len(), 2);
        assert!(map.find_by_rule(&RuleId::from("other")).is_empty());
    }
}
