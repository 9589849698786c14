//! GeoJSON feature export.
//!
//! Grounded on `find_outlet.rs`'s `Feature`/`FeatureCollection` construction
//! (build a `geojson::Geometry`, wrap it in a `Feature` with a `properties`
//! map, collect into a `FeatureCollection`, and serialize via
//! `GeoJson::to_string`/a direct file write). Basin polygons have no
//! precedent in the pack; the boundary tracer below is original but follows
//! the same "walk a label raster, emit ring coordinates" shape used
//! elsewhere in the hydrology tools for raster-to-vector conversions.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value as GeoValue};
use serde_json::{Map as JsonMap, Value as JsonValue};
use streamnet_common::{Array2D, Error, Result};

use crate::segments::Segments;

/// Which geometry a `geojson` call should emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureType {
    Segments,
    Outlets,
    SegmentOutlets,
    Basins,
}

/// Per-feature property vectors; every vector's length must equal the
/// number of features the requested `FeatureType` emits.
pub type Properties<'a> = HashMap<&'a str, &'a [JsonValue]>;

fn properties_object(properties: &Properties, index: usize, count: usize) -> Result<JsonMap<String, JsonValue>> {
    let mut out = JsonMap::new();
    for (&name, values) in properties {
        if values.len() != count {
            return Err(Error::value(format!(
                "property '{name}' has {} values but {count} features are emitted",
                values.len()
            )));
        }
        out.insert(name.to_string(), values[index].clone());
    }
    Ok(out)
}

fn feature(geometry: GeoValue, properties: JsonMap<String, JsonValue>) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Builds a `FeatureCollection` of the requested type.
pub fn geojson(segs: &Segments, feature_type: FeatureType, properties: &Properties) -> Result<GeoJson> {
    let features = match feature_type {
        FeatureType::Segments => segment_features(segs, properties)?,
        FeatureType::Outlets => outlet_features(segs, properties)?,
        FeatureType::SegmentOutlets => segment_outlet_features(segs, properties)?,
        FeatureType::Basins => basin_features(segs, properties)?,
    };
    Ok(GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }))
}

fn segment_features(segs: &Segments, properties: &Properties) -> Result<Vec<Feature>> {
    let n = segs.len();
    (0..n)
        .map(|i| {
            let line: Vec<Vec<f64>> = segs.segments[i].iter().map(|&(x, y)| vec![x, y]).collect();
            Ok(feature(GeoValue::LineString(line), properties_object(properties, i, n)?))
        })
        .collect()
}

fn outlet_features(segs: &Segments, properties: &Properties) -> Result<Vec<Feature>> {
    let termini = segs.termini();
    let n = termini.len();
    termini
        .iter()
        .enumerate()
        .map(|(k, &i)| {
            let (x, y) = segs.outlet_vertex(i);
            Ok(feature(GeoValue::Point(vec![x, y]), properties_object(properties, k, n)?))
        })
        .collect()
}

fn segment_outlet_features(segs: &Segments, properties: &Properties) -> Result<Vec<Feature>> {
    let n = segs.len();
    (0..n)
        .map(|i| {
            let (x, y) = segs.outlet_vertex(i);
            Ok(feature(GeoValue::Point(vec![x, y]), properties_object(properties, i, n)?))
        })
        .collect()
}

fn basin_features(segs: &Segments, properties: &Properties) -> Result<Vec<Feature>> {
    let basins = segs
        .basins()
        .ok_or_else(|| Error::value("basins have not been computed; call locate_basins first"))?;
    let ids = segs.termini().into_iter().map(|i| segs.ids[i]);
    let mut labels: Vec<i64> = ids.collect();
    labels.sort_unstable();
    labels.dedup();

    labels
        .iter()
        .enumerate()
        .map(|(k, &id)| {
            let ring = trace_boundary(basins, id)?;
            let line: Vec<Vec<f64>> = ring.into_iter().map(|(x, y)| vec![x, y]).collect();
            Ok(feature(
                GeoValue::Polygon(vec![line]),
                properties_object(properties, k, labels.len())?,
            ))
        })
        .collect()
}

/// Moore-neighbor boundary trace of the pixels labeled `id` in `labels`,
/// returning the outer ring's pixel-corner coordinates (8-connected,
/// clockwise, closed). Coordinates are expressed in pixel-index space (row,
/// col as x, y) since `labels` alone carries no transform; callers needing
/// CRS coordinates convert through the segment's flow transform.
fn trace_boundary(labels: &Array2D<i64>, id: i64) -> Result<Vec<(f64, f64)>> {
    let rows = labels.rows();
    let columns = labels.columns();
    let mut start = None;
    'search: for row in 0..rows {
        for col in 0..columns {
            if labels.get_value(row, col) == id {
                start = Some((row, col));
                break 'search;
            }
        }
    }
    let Some(start) = start else {
        return Err(Error::NoFeatures(format!(
            "no pixels labeled {id} in the basin raster"
        )));
    };

    // 8 directions clockwise starting east, matching this crate's D8
    // convention so the tracer can reuse the same offset ordering.
    const DIRS: [(isize, isize); 8] = [
        (0, 1),
        (1, 1),
        (1, 0),
        (1, -1),
        (0, -1),
        (-1, -1),
        (-1, 0),
        (-1, 1),
    ];
    let is_member = |r: isize, c: isize| labels.get_value(r, c) == id;

    let mut boundary = vec![start];
    let mut current = start;
    let mut backtrack_dir = 4usize; // arrived from the west, by convention
    loop {
        let mut found = None;
        for step in 0..8 {
            let dir = (backtrack_dir + 1 + step) % 8;
            let (dr, dc) = DIRS[dir];
            let candidate = (current.0 + dr, current.1 + dc);
            if is_member(candidate.0, candidate.1) {
                found = Some((candidate, dir));
                break;
            }
        }
        let Some((next, dir)) = found else {
            break;
        };
        backtrack_dir = (dir + 4) % 8;
        if next == start {
            break;
        }
        boundary.push(next);
        current = next;
        if boundary.len() > (rows * columns) as usize {
            break;
        }
    }
    boundary.push(start);
    Ok(boundary
        .into_iter()
        .map(|(r, c)| (c as f64, r as f64))
        .collect())
}

/// Writes a `GeoJson` value to `path`. Fails with `FeatureFile` if the file
/// exists and `overwrite` is false.
pub fn save(path: &Path, value: &GeoJson, overwrite: bool) -> Result<()> {
    if !overwrite && path.exists() {
        return Err(Error::FeatureFile(format!(
            "{} already exists (pass overwrite=true to replace it)",
            path.display()
        )));
    }
    let mut file = File::create(path)?;
    file.write_all(value.to_string().as_bytes())?;
    Ok(())
}
