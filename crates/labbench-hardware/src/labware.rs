//! Built-in labware catalog
//!
//! Container definitions are a regular grid of identical wells. Wells are
//! named row-letter + column-number (`A1`, `B1`, ... `H12`) and ordered
//! column-major, so index 0 is always `A1`.

use crate::geometry::Vector;

/// Shape of every well in a container
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WellShape {
    /// Diameter in mm
    pub diameter: f64,
    /// Depth in mm
    pub depth: f64,
    /// Capacity in uL
    pub max_volume: f64,
}

/// Static container definition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabwareDefinition {
    /// Catalog name, also used as the container type
    pub name: &'static str,
    /// Number of rows (letters)
    pub rows: usize,
    /// Number of columns (numbers)
    pub columns: usize,
    /// Distance between adjacent well centers
    pub spacing: f64,
    /// Center of well A1 relative to the container origin
    pub first_well: Vector,
    /// Well geometry
    pub well: WellShape,
}

impl LabwareDefinition {
    /// Total number of wells
    #[inline]
    #[must_use]
    pub fn well_count(&self) -> usize {
        self.rows * self.columns
    }

    /// Footprint of the whole container
    #[must_use]
    pub fn size(&self) -> Vector {
        let span_x = self.spacing * self.columns.saturating_sub(1) as f64;
        let span_y = self.spacing * self.rows.saturating_sub(1) as f64;
        Vector::new(
            span_x + 2.0 * self.first_well.x,
            span_y + 2.0 * self.first_well.y,
            self.well.depth,
        )
    }

    /// Well names in column-major order
    #[must_use]
    pub fn well_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.well_count());
        for column in 0..self.columns {
            for row in 0..self.rows {
                names.push(well_name(row, column));
            }
        }
        names
    }

    /// Corner of the well at the given grid position, relative to the container
    #[must_use]
    pub fn well_origin(&self, row: usize, column: usize) -> Vector {
        let radius = self.well.diameter / 2.0;
        Vector::new(
            self.first_well.x + self.spacing * column as f64 - radius,
            self.first_well.y + self.spacing * row as f64 - radius,
            0.0,
        )
    }

    /// Bounding box of one well
    #[inline]
    #[must_use]
    pub fn well_size(&self) -> Vector {
        Vector::new(self.well.diameter, self.well.diameter, self.well.depth)
    }
}

fn well_name(row: usize, column: usize) -> String {
    let letter = char::from(b'A' + u8::try_from(row % 26).unwrap_or(0));
    format!("{}{}", letter, column + 1)
}

const GRID_96: (usize, usize) = (8, 12);

const CATALOG: &[LabwareDefinition] = &[
    LabwareDefinition {
        name: "96-flat",
        rows: GRID_96.0,
        columns: GRID_96.1,
        spacing: 9.0,
        first_well: Vector::new(11.24, 14.34, 0.0),
        well: WellShape {
            diameter: 6.4,
            depth: 10.5,
            max_volume: 400.0,
        },
    },
    LabwareDefinition {
        name: "96-PCR-flat",
        rows: GRID_96.0,
        columns: GRID_96.1,
        spacing: 9.0,
        first_well: Vector::new(11.24, 14.34, 0.0),
        well: WellShape {
            diameter: 5.5,
            depth: 20.0,
            max_volume: 300.0,
        },
    },
    LabwareDefinition {
        name: "tiprack-10ul",
        rows: GRID_96.0,
        columns: GRID_96.1,
        spacing: 9.0,
        first_well: Vector::new(11.24, 14.34, 0.0),
        well: WellShape {
            diameter: 3.5,
            depth: 39.0,
            max_volume: 10.0,
        },
    },
    LabwareDefinition {
        name: "tiprack-200ul",
        rows: GRID_96.0,
        columns: GRID_96.1,
        spacing: 9.0,
        first_well: Vector::new(11.24, 14.34, 0.0),
        well: WellShape {
            diameter: 3.5,
            depth: 60.0,
            max_volume: 200.0,
        },
    },
    LabwareDefinition {
        name: "tiprack-1000ul",
        rows: GRID_96.0,
        columns: GRID_96.1,
        spacing: 9.0,
        first_well: Vector::new(11.24, 14.34, 0.0),
        well: WellShape {
            diameter: 7.62,
            depth: 98.07,
            max_volume: 1000.0,
        },
    },
    LabwareDefinition {
        name: "trough-12row",
        rows: 1,
        columns: 12,
        spacing: 9.0,
        first_well: Vector::new(8.0, 8.0, 0.0),
        well: WellShape {
            diameter: 8.0,
            depth: 38.0,
            max_volume: 22_000.0,
        },
    },
    LabwareDefinition {
        name: "point",
        rows: 1,
        columns: 1,
        spacing: 0.0,
        first_well: Vector::new(0.0, 0.0, 0.0),
        well: WellShape {
            diameter: 0.0,
            depth: 0.0,
            max_volume: 0.0,
        },
    },
    LabwareDefinition {
        name: "trash",
        rows: 1,
        columns: 1,
        spacing: 0.0,
        first_well: Vector::new(40.0, 40.0, 0.0),
        well: WellShape {
            diameter: 80.0,
            depth: 60.0,
            max_volume: 0.0,
        },
    },
];

/// Look up a container definition by its exact catalog name
#[must_use]
pub fn lookup(name: &str) -> Option<&'static LabwareDefinition> {
    CATALOG.iter().find(|def| def.name == name)
}

/// Names of every built-in definition
#[must_use]
pub fn catalog_names() -> Vec<&'static str> {
    CATALOG.iter().map(|def| def.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_known_and_unknown() {
        assert!(lookup("96-flat").is_some());
        assert!(lookup("tiprack-200ul").is_some());
        assert!(lookup("96-FLAT").is_none());
        assert!(lookup("nonsense").is_none());
    }

    #[test]
    fn well_names_are_column_major() {
        let plate = lookup("96-flat").unwrap();
        let names = plate.well_names();
        assert_eq!(names.len(), 96);
        assert_eq!(names[0], "A1");
        assert_eq!(names[1], "B1");
        assert_eq!(names[8], "A2");
        assert_eq!(names[95], "H12");
    }

    #[test]
    fn trough_is_single_row() {
        let trough = lookup("trough-12row").unwrap();
        assert_eq!(trough.well_names().last().map(String::as_str), Some("A12"));
    }

    #[test]
    fn size_covers_all_wells() {
        let plate = lookup("96-flat").unwrap();
        let size = plate.size();
        let last = plate.well_origin(7, 11) + plate.well_size();
        assert!(size.x >= last.x);
        assert!(size.y >= last.y);
    }

    #[test]
    fn catalog_names_are_unique() {
        let mut names = catalog_names();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
    }
}
