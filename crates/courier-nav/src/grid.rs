//! The immutable tile grid.

use courier_proto::{MapTile, Point};

/// Tile classification, decoded from the canonical wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileType {
    NonWalkable,
    ParcelGenerator,
    Delivery,
    Walkable,
}

impl TileType {
    /// Canonical dialect: `0` blocked, `1` generator, `2` delivery, `3`
    /// walkable. Unknown codes decode to `NonWalkable`.
    pub fn from_wire(code: u8) -> TileType {
        match code {
            1 => TileType::ParcelGenerator,
            2 => TileType::Delivery,
            3 => TileType::Walkable,
            _ => TileType::NonWalkable,
        }
    }

    pub fn is_walkable(self) -> bool {
        !matches!(self, TileType::NonWalkable)
    }
}

/// An immutable `width x height` matrix of tiles.
///
/// Row-major storage; `(0, 0)` is the bottom-left corner and `y` grows
/// upward, matching the simulator's coordinate system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridMap {
    width: i32,
    height: i32,
    tiles: Vec<TileType>,
}

impl GridMap {
    pub fn new(width: u32, height: u32, tiles: Vec<TileType>) -> Self {
        assert!(width > 0 && height > 0, "grid must be non-empty");
        assert_eq!(
            tiles.len(),
            (width * height) as usize,
            "tile count must match dimensions"
        );
        Self {
            width: width as i32,
            height: height as i32,
            tiles,
        }
    }

    /// Build from the `onMap` tile list. Tiles absent from the list are
    /// blocked.
    pub fn from_wire(width: u32, height: u32, tiles: &[MapTile]) -> Self {
        let mut grid = vec![TileType::NonWalkable; (width * height) as usize];
        for tile in tiles {
            if tile.x < 0 || tile.y < 0 || tile.x >= width as i32 || tile.y >= height as i32 {
                continue;
            }
            grid[(tile.y * width as i32 + tile.x) as usize] = TileType::from_wire(tile.kind);
        }
        Self::new(width, height, grid)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    fn idx(&self, p: Point) -> Option<usize> {
        if p.x < 0 || p.y < 0 || p.x >= self.width || p.y >= self.height {
            return None;
        }
        Some((p.y * self.width + p.x) as usize)
    }

    /// Out-of-bounds points read as `NonWalkable`.
    pub fn tile(&self, p: Point) -> TileType {
        self.idx(p)
            .map(|i| self.tiles[i])
            .unwrap_or(TileType::NonWalkable)
    }

    pub fn is_walkable(&self, p: Point) -> bool {
        self.tile(p).is_walkable()
    }

    /// Every delivery tile, in row-major order.
    pub fn delivery_zones(&self) -> Vec<Point> {
        self.scan(TileType::Delivery)
    }

    /// Every parcel-generator tile, in row-major order.
    pub fn generators(&self) -> Vec<Point> {
        self.scan(TileType::ParcelGenerator)
    }

    fn scan(&self, wanted: TileType) -> Vec<Point> {
        let mut out = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                let p = Point::new(x, y);
                if self.tile(p) == wanted {
                    out.push(p);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_decode_uses_canonical_dialect() {
        assert_eq!(TileType::from_wire(0), TileType::NonWalkable);
        assert_eq!(TileType::from_wire(1), TileType::ParcelGenerator);
        assert_eq!(TileType::from_wire(2), TileType::Delivery);
        assert_eq!(TileType::from_wire(3), TileType::Walkable);
        assert_eq!(TileType::from_wire(9), TileType::NonWalkable);
    }

    #[test]
    fn grid_from_wire_scans_zones_in_stable_order() {
        let tiles = vec![
            MapTile { x: 0, y: 0, kind: 3 },
            MapTile { x: 1, y: 0, kind: 1 },
            MapTile { x: 2, y: 0, kind: 2 },
            MapTile { x: 0, y: 1, kind: 2 },
            MapTile { x: 1, y: 1, kind: 3 },
            MapTile { x: 2, y: 1, kind: 0 },
        ];
        let grid = GridMap::from_wire(3, 2, &tiles);

        assert_eq!(grid.generators(), vec![Point::new(1, 0)]);
        assert_eq!(
            grid.delivery_zones(),
            vec![Point::new(2, 0), Point::new(0, 1)]
        );
        assert!(!grid.is_walkable(Point::new(2, 1)));
        assert!(!grid.is_walkable(Point::new(-1, 0)));
    }
}
