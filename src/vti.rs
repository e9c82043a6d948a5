// src/vti.rs
//
// Reusable VTK XML ImageData (.vti) reader/writer for angio-sim.
// ASCII point-data arrays only, which is what the clinical image inputs
// and the snapshot outputs use.
//
// Point order inside a DataArray is x fastest, then y, then z, matching
// the grid's linear index convention; writers and readers on both sides
// of the pipeline rely on that.

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::{SimError, SimResult};
use crate::grid::Grid3;

/// A volumetric dataset: geometry plus named scalar point arrays.
#[derive(Debug, Clone, Default)]
pub struct ImageDataset {
    pub dims: [usize; 3],
    pub spacing: f64,
    pub origin: [f64; 3],
    pub arrays: Vec<(String, Vec<f64>)>,
}

impl ImageDataset {
    /// Empty dataset over a grid, ready for arrays to be pushed.
    pub fn for_grid(grid: &Grid3) -> Self {
        Self {
            dims: [grid.nx, grid.ny, grid.nz],
            spacing: grid.spacing,
            origin: grid.origin,
            arrays: Vec::new(),
        }
    }

    #[inline]
    pub fn n_points(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Grid described by the dataset's geometry.
    pub fn grid(&self) -> SimResult<Grid3> {
        Grid3::new(
            self.dims[0],
            self.dims[1],
            self.dims[2],
            self.spacing,
            self.origin,
        )
    }

    /// Look up a point array by name.
    pub fn array(&self, name: &str) -> Option<&[f64]> {
        self.arrays
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write a dataset as ASCII VTK XML ImageData.
///
/// Every array length is checked against the dataset geometry before any
/// bytes hit the disk.
pub fn write_vti(path: &Path, dataset: &ImageDataset) -> SimResult<()> {
    let n = dataset.n_points();
    for (name, values) in &dataset.arrays {
        SimError::check_len(name, n, values.len())?;
    }

    ensure_parent_dir(path)?;
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);

    let [nx, ny, nz] = dataset.dims;
    let [ox, oy, oz] = dataset.origin;
    let s = dataset.spacing;

    writeln!(w, r#"<?xml version="1.0"?>"#)?;
    writeln!(
        w,
        r#"<VTKFile type="ImageData" version="0.1" byte_order="LittleEndian">"#
    )?;
    writeln!(
        w,
        r#"  <ImageData WholeExtent="0 {} 0 {} 0 {}" Origin="{:.16e} {:.16e} {:.16e}" Spacing="{:.16e} {:.16e} {:.16e}">"#,
        nx - 1,
        ny - 1,
        nz - 1,
        ox,
        oy,
        oz,
        s,
        s,
        s
    )?;
    writeln!(w, r#"    <Piece Extent="0 {} 0 {} 0 {}">"#, nx - 1, ny - 1, nz - 1)?;

    let scalars = dataset
        .arrays
        .first()
        .map(|(name, _)| name.as_str())
        .unwrap_or("");
    writeln!(w, r#"      <PointData Scalars="{}">"#, scalars)?;

    for (name, values) in &dataset.arrays {
        writeln!(
            w,
            r#"        <DataArray type="Float64" Name="{}" format="ascii">"#,
            name
        )?;
        // x fastest, then y, then z
        for chunk in values.chunks(nx.max(1)) {
            write!(w, "         ")?;
            for v in chunk {
                write!(w, " {:.10e}", v)?;
            }
            writeln!(w)?;
        }
        writeln!(w, r#"        </DataArray>"#)?;
    }

    writeln!(w, r#"      </PointData>"#)?;
    writeln!(w, r#"    </Piece>"#)?;
    writeln!(w, r#"  </ImageData>"#)?;
    writeln!(w, r#"</VTKFile>"#)?;
    w.flush()?;
    Ok(())
}

/// Extract the value of `key="..."` from a tag's text.
fn attr<'a>(tag: &'a str, key: &str) -> Option<&'a str> {
    let marker = format!("{}=\"", key);
    let start = tag.find(&marker)? + marker.len();
    let end = tag[start..].find('"')? + start;
    Some(&tag[start..end])
}

fn parse_floats(text: &str) -> Result<Vec<f64>, String> {
    text.split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| format!("bad numeric token '{}'", tok))
        })
        .collect()
}

/// Read an ASCII VTK XML ImageData file.
pub fn read_vti(path: &Path) -> SimResult<ImageDataset> {
    if path.as_os_str().is_empty() {
        return Err(SimError::config("input dataset path is empty"));
    }
    let mut text = String::new();
    File::open(path)
        .map_err(|e| {
            SimError::dataset(path, format!("cannot open dataset: {}", e))
        })?
        .read_to_string(&mut text)?;

    // Geometry comes from the <ImageData ...> tag.
    let image_start = text
        .find("<ImageData")
        .ok_or_else(|| SimError::dataset(path, "no <ImageData> element"))?;
    let image_end = text[image_start..]
        .find('>')
        .ok_or_else(|| SimError::dataset(path, "unterminated <ImageData> tag"))?
        + image_start;
    let image_tag = &text[image_start..image_end];

    let extent_text = attr(image_tag, "WholeExtent")
        .ok_or_else(|| SimError::dataset(path, "missing WholeExtent"))?;
    let extent = parse_floats(extent_text).map_err(|m| SimError::dataset(path, m))?;
    if extent.len() != 6 {
        return Err(SimError::dataset(path, "WholeExtent must have 6 entries"));
    }
    let dims = [
        (extent[1] - extent[0]) as usize + 1,
        (extent[3] - extent[2]) as usize + 1,
        (extent[5] - extent[4]) as usize + 1,
    ];

    let origin_text =
        attr(image_tag, "Origin").ok_or_else(|| SimError::dataset(path, "missing Origin"))?;
    let origin_vals = parse_floats(origin_text).map_err(|m| SimError::dataset(path, m))?;
    if origin_vals.len() != 3 {
        return Err(SimError::dataset(path, "Origin must have 3 entries"));
    }
    let origin = [origin_vals[0], origin_vals[1], origin_vals[2]];

    let spacing_text =
        attr(image_tag, "Spacing").ok_or_else(|| SimError::dataset(path, "missing Spacing"))?;
    let spacing_vals = parse_floats(spacing_text).map_err(|m| SimError::dataset(path, m))?;
    let spacing = *spacing_vals
        .first()
        .ok_or_else(|| SimError::dataset(path, "Spacing must have at least 1 entry"))?;

    let mut dataset = ImageDataset {
        dims,
        spacing,
        origin,
        arrays: Vec::new(),
    };
    let n = dataset.n_points();

    // Collect every named point DataArray.
    let mut rest = &text[..];
    while let Some(tag_start) = rest.find("<DataArray") {
        let tag_end = rest[tag_start..]
            .find('>')
            .ok_or_else(|| SimError::dataset(path, "unterminated <DataArray> tag"))?
            + tag_start;
        let tag = &rest[tag_start..tag_end];

        let name = attr(tag, "Name").unwrap_or("").to_string();
        if let Some(format) = attr(tag, "format") {
            if format != "ascii" {
                return Err(SimError::dataset(
                    path,
                    format!("unsupported DataArray format '{}'", format),
                ));
            }
        }

        let body_start = tag_end + 1;
        let body_end = rest[body_start..]
            .find("</DataArray>")
            .ok_or_else(|| SimError::dataset(path, "missing </DataArray>"))?
            + body_start;

        let values =
            parse_floats(&rest[body_start..body_end]).map_err(|m| SimError::dataset(path, m))?;
        if !name.is_empty() {
            SimError::check_len(&name, n, values.len())?;
            dataset.arrays.push((name, values));
        }

        rest = &rest[body_end..];
    }

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("angio_sim_vti_{}_{}", std::process::id(), name))
    }

    #[test]
    fn write_then_read_round_trips() {
        let grid = Grid3::new(3, 2, 2, 2.0, [1.0, 0.0, -1.0]).unwrap();
        let mut dataset = ImageDataset::for_grid(&grid);
        let values: Vec<f64> = (0..12).map(|i| i as f64 * 0.5).collect();
        dataset.arrays.push(("nutrient".to_string(), values.clone()));
        dataset.arrays.push(("vessel".to_string(), vec![0.25; 12]));

        let path = temp_path("roundtrip.vti");
        write_vti(&path, &dataset).unwrap();
        let back = read_vti(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.dims, [3, 2, 2]);
        assert_eq!(back.spacing, 2.0);
        assert_eq!(back.origin, [1.0, 0.0, -1.0]);
        assert_eq!(back.array("nutrient").unwrap(), values.as_slice());
        assert_eq!(back.array("vessel").unwrap(), &[0.25; 12]);
        assert!(back.array("stimulus").is_none());
    }

    #[test]
    fn wrong_length_array_is_rejected_before_writing() {
        let grid = Grid3::new(2, 2, 2, 1.0, [0.0; 3]).unwrap();
        let mut dataset = ImageDataset::for_grid(&grid);
        dataset.arrays.push(("tumour".to_string(), vec![1.0; 7]));

        let path = temp_path("badlen.vti");
        let err = write_vti(&path, &dataset).unwrap_err();
        assert!(matches!(err, SimError::DataMismatch { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_a_dataset_error() {
        let err = read_vti(Path::new("/no/such/angio_sim_input.vti")).unwrap_err();
        assert!(matches!(err, SimError::Dataset { .. }));
    }

    #[test]
    fn malformed_contents_are_reported() {
        let path = temp_path("garbage.vti");
        std::fs::write(&path, "not a dataset at all").unwrap();
        let err = read_vti(&path).unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, SimError::Dataset { .. }));
    }
}
