//! Grid cells, masks and zones

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use crate::station::Location;
use ndarray::Array2;

/// One target cell of the output grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    pub location: Location,
    pub elevation: f64,
    /// Whether the cell receives interpolated values
    pub usable: bool,
    /// Inside the optional watershed mask
    pub in_mask: bool,
    /// Zone id; `0` or less means no zone
    pub zone: i32,
}

impl GridCell {
    pub fn new(location: Location, elevation: f64) -> Self {
        Self {
            location,
            elevation,
            usable: true,
            in_mask: false,
            zone: 0,
        }
    }
}

/// Which optional layers accompany the elevation grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Overlays {
    pub mask: bool,
    pub zones: bool,
}

/// A zone and the number of usable cells it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneSummary {
    pub zone: i32,
    pub cells: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RasterLayout {
    rows: usize,
    cols: usize,
    transform: GeoTransform,
}

/// All cells of the output grid, in row-major order when built from rasters
#[derive(Debug, Clone, PartialEq)]
pub struct CellTable {
    cells: Vec<GridCell>,
    overlays: Overlays,
    zones: Vec<ZoneSummary>,
    layout: Option<RasterLayout>,
}

impl CellTable {
    /// Build from cell records, narrowing usability by mask and zone.
    ///
    /// With only a mask, cells outside it become unusable; with only zones,
    /// cells without a zone do; with both, a cell is dropped when it is
    /// outside the mask *and* has no zone. Usability is never widened.
    pub fn from_cells(mut cells: Vec<GridCell>, overlays: Overlays) -> Self {
        for cell in cells.iter_mut() {
            let outside = match (overlays.mask, overlays.zones) {
                (true, true) => !cell.in_mask && cell.zone <= 0,
                (true, false) => !cell.in_mask,
                (false, true) => cell.zone <= 0,
                (false, false) => false,
            };
            if outside || !cell.elevation.is_finite() {
                cell.usable = false;
            }
        }

        let zones = if overlays.zones {
            summarize_zones(&cells)
        } else {
            Vec::new()
        };

        Self {
            cells,
            overlays,
            zones,
            layout: None,
        }
    }

    /// Build from an elevation raster and optional mask and zone rasters
    /// of the same shape.
    ///
    /// Cell positions are pixel centers. Elevation no-data cells are
    /// unusable; elevations are multiplied by `elevation_scale` to match
    /// station elevation units. A mask value of 1 marks cells inside the
    /// mask.
    pub fn from_rasters(
        elevation: &Raster<f64>,
        mask: Option<&Raster<u8>>,
        zones: Option<&Raster<i32>>,
        elevation_scale: f64,
    ) -> Result<Self> {
        let (rows, cols) = elevation.shape();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        for (other_rows, other_cols) in mask
            .map(Raster::shape)
            .into_iter()
            .chain(zones.map(Raster::shape))
        {
            if (other_rows, other_cols) != (rows, cols) {
                return Err(Error::SizeMismatch {
                    er: rows,
                    ec: cols,
                    ar: other_rows,
                    ac: other_cols,
                });
            }
        }

        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let (x, y) = elevation.pixel_to_geo(col, row);
                let z = elevation.data()[(row, col)];
                let mut cell = GridCell::new(Location::new(x, y), z * elevation_scale);
                cell.usable = !elevation.is_nodata(z);

                if let Some(mask) = mask {
                    let m = mask.data()[(row, col)];
                    cell.in_mask = !mask.is_nodata(m) && m == 1;
                }
                if let Some(zones) = zones {
                    let zone = zones.data()[(row, col)];
                    cell.zone = if zones.is_nodata(zone) { 0 } else { zone };
                }
                cells.push(cell);
            }
        }

        let overlays = Overlays {
            mask: mask.is_some(),
            zones: zones.is_some(),
        };
        let mut table = Self::from_cells(cells, overlays);
        table.layout = Some(RasterLayout {
            rows,
            cols,
            transform: *elevation.transform(),
        });
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[GridCell] {
        &self.cells
    }

    pub fn get(&self, index: usize) -> Option<&GridCell> {
        self.cells.get(index)
    }

    pub fn overlays(&self) -> Overlays {
        self.overlays
    }

    pub fn usable_count(&self) -> usize {
        self.cells.iter().filter(|c| c.usable).count()
    }

    /// Usable cells inside the mask
    pub fn masked_count(&self) -> usize {
        self.cells.iter().filter(|c| c.usable && c.in_mask).count()
    }

    /// Whether the cell enters the areal mean
    pub fn counts_toward_mean(&self, index: usize, use_mask: bool) -> bool {
        let cell = &self.cells[index];
        cell.usable && (!use_mask || !self.overlays.mask || cell.in_mask)
    }

    /// Zones in ascending id order
    pub fn zones(&self) -> &[ZoneSummary] {
        &self.zones
    }

    /// Position of `zone` in [`zones`](Self::zones)
    pub fn zone_index(&self, zone: i32) -> Option<usize> {
        self.zones.binary_search_by_key(&zone, |z| z.zone).ok()
    }

    /// Reshape a per-cell array into a raster with this grid's geometry.
    ///
    /// Only available for tables built with [`from_rasters`](Self::from_rasters).
    pub fn to_raster<T: RasterElement>(&self, values: &[T], nodata: T) -> Result<Raster<T>> {
        let layout = self.layout.ok_or_else(|| {
            Error::Other("cell table was not built from a raster".into())
        })?;
        if values.len() != self.cells.len() {
            return Err(Error::SizeMismatch {
                er: self.cells.len(),
                ec: 1,
                ar: values.len(),
                ac: 1,
            });
        }
        let data = Array2::from_shape_vec((layout.rows, layout.cols), values.to_vec())
            .map_err(|e| Error::Other(e.to_string()))?;
        let mut raster = Raster::from_array(data);
        raster.set_transform(layout.transform);
        raster.set_nodata(Some(nodata));
        Ok(raster)
    }
}

fn summarize_zones(cells: &[GridCell]) -> Vec<ZoneSummary> {
    let mut ids: Vec<i32> = cells
        .iter()
        .filter(|c| c.usable && c.zone > 0)
        .map(|c| c.zone)
        .collect();
    ids.sort_unstable();

    let mut zones: Vec<ZoneSummary> = Vec::new();
    for id in ids {
        match zones.last_mut() {
            Some(last) if last.zone == id => last.cells += 1,
            _ => zones.push(ZoneSummary { zone: id, cells: 1 }),
        }
    }
    zones
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(in_mask: bool, zone: i32) -> GridCell {
        GridCell {
            in_mask,
            zone,
            ..GridCell::new(Location::default(), 1.0)
        }
    }

    fn usable(table: &CellTable) -> Vec<bool> {
        table.cells().iter().map(|c| c.usable).collect()
    }

    #[test]
    fn test_narrowing_rules() {
        let cells = vec![cell(true, 0), cell(false, 2), cell(false, 0), cell(true, 1)];

        let mask_only = CellTable::from_cells(cells.clone(), Overlays { mask: true, zones: false });
        assert_eq!(usable(&mask_only), vec![true, false, false, true]);

        let zones_only = CellTable::from_cells(cells.clone(), Overlays { mask: false, zones: true });
        assert_eq!(usable(&zones_only), vec![false, true, false, true]);

        let both = CellTable::from_cells(cells, Overlays { mask: true, zones: true });
        assert_eq!(usable(&both), vec![true, true, false, true]);
    }

    #[test]
    fn test_narrowing_never_widens() {
        let mut c = cell(true, 3);
        c.usable = false;
        let table = CellTable::from_cells(vec![c], Overlays { mask: true, zones: true });
        assert!(!table.cells()[0].usable);
        assert!(table.zones().is_empty());
    }

    #[test]
    fn test_zones_sorted_with_counts() {
        let cells = vec![cell(false, 7), cell(false, 2), cell(false, 7), cell(false, -1)];
        let table = CellTable::from_cells(cells, Overlays { mask: false, zones: true });

        assert_eq!(
            table.zones(),
            &[ZoneSummary { zone: 2, cells: 1 }, ZoneSummary { zone: 7, cells: 2 }]
        );
        assert_eq!(table.zone_index(7), Some(1));
        assert_eq!(table.zone_index(3), None);
    }

    #[test]
    fn test_from_rasters() {
        let mut dem = Raster::from_vec(vec![1000.0, f64::NAN, 1500.0, 2000.0], 2, 2).unwrap();
        dem.set_transform(GeoTransform::new(0.0, 200.0, 100.0, -100.0));
        let mask = dem
            .with_same_meta(ndarray::array![[1u8, 1], [0, 1]], None)
            .unwrap();

        let table = CellTable::from_rasters(&dem, Some(&mask), None, 0.001).unwrap();

        assert_eq!(usable(&table), vec![true, false, false, true]);
        assert_eq!(table.cells()[3].location, Location::new(150.0, 50.0));
        assert!((table.cells()[2].elevation - 1.5).abs() < 1e-12);
        assert_eq!(table.masked_count(), 2);

        let raster = table.to_raster(&[1.0, 2.0, 3.0, 4.0], f64::NAN).unwrap();
        assert_eq!(raster.get(1, 0).unwrap(), 3.0);
    }

    #[test]
    fn test_from_rasters_shape_mismatch() {
        let dem: Raster<f64> = Raster::new(2, 3);
        let zones: Raster<i32> = Raster::new(3, 2);
        assert!(matches!(
            CellTable::from_rasters(&dem, None, Some(&zones), 1.0),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
