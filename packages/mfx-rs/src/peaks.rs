//! Local-maximum tables: reading the cluster tool's output and writing the
//! canonical peak table.

use crate::error::{MfxError, Result};
use crate::locator::PeakLocator;
use crate::naming;
use crate::types::{CanonicalPeak, Peak, PeakTable};
use std::path::{Path, PathBuf};

const CLUSTER_COLUMN: &str = "Cluster Index";
const VALUE_COLUMN: &str = "Value";
const AXES: [&str; 3] = ["x", "y", "z"];

/// Parse a tab-separated local-maximum table.
///
/// Requires the `Cluster Index`, `Value`, `x`, `y` and `z` columns; extra
/// columns and trailing tabs are tolerated. `source` names the table in
/// error messages.
pub fn parse_peak_table(content: &str, source: &str) -> Result<PeakTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| MfxError::MissingColumn {
                file: source.to_string(),
                column: name.to_string(),
            })
    };
    let cluster_idx = column(CLUSTER_COLUMN)?;
    let value_idx = column(VALUE_COLUMN)?;
    let axis_idx = [column(AXES[0])?, column(AXES[1])?, column(AXES[2])?];

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let cluster_field = field(&record, cluster_idx, CLUSTER_COLUMN, source, line)?;
        let cluster = parse_integer(cluster_field, source, line)?;
        let value = field(&record, value_idx, VALUE_COLUMN, source, line)?
            .parse::<f64>()
            .map_err(|e| MfxError::Parse(format!("{} row {}: Value: {}", source, line + 1, e)))?;

        let mut voxel = [0usize; 3];
        for (a, &idx) in axis_idx.iter().enumerate() {
            let v = parse_integer(field(&record, idx, AXES[a], source, line)?, source, line)?;
            voxel[a] = usize::try_from(v).map_err(|_| {
                MfxError::Parse(format!(
                    "{} row {}: negative voxel coordinate {}={}",
                    source,
                    line + 1,
                    AXES[a],
                    v
                ))
            })?;
        }

        rows.push(Peak {
            voxel,
            cluster,
            value,
        });
    }

    log::info!("Loaded {} peaks from {}", rows.len(), source);
    Ok(PeakTable::new(rows))
}

fn field<'r>(
    record: &'r csv::StringRecord,
    idx: usize,
    name: &str,
    source: &str,
    line: usize,
) -> Result<&'r str> {
    record
        .get(idx)
        .filter(|f| !f.is_empty())
        .ok_or_else(|| MfxError::Parse(format!("{} row {}: empty '{}'", source, line + 1, name)))
}

// Integers may be written as "12" or "12.0"
fn parse_integer(s: &str, source: &str, line: usize) -> Result<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
        _ => Err(MfxError::Parse(format!(
            "{} row {}: '{}' is not an integer",
            source,
            line + 1,
            s
        ))),
    }
}

/// Read a local-maximum table from disk
pub fn read_peak_table(path: &Path) -> Result<PeakTable> {
    if !path.exists() {
        return Err(MfxError::FileNotFound(path.display().to_string()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_peak_table(&content, &path.display().to_string())
}

/// Reshape peaks into the canonical schema.
///
/// A non-empty table gets anatomical regions and millimetre coordinates from
/// `locator`; an empty one keeps the bare schema.
pub fn format_peak_table(
    table: &PeakTable,
    locator: &dyn PeakLocator,
) -> Result<Vec<CanonicalPeak>> {
    let mut rows: Vec<CanonicalPeak> = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, p)| CanonicalPeak {
            peak: i,
            cluster: p.cluster,
            value: p.value,
            coords: [p.voxel[0] as f64, p.voxel[1] as f64, p.voxel[2] as f64],
            region: None,
        })
        .collect();

    if table.is_empty() {
        return Ok(rows);
    }

    let voxels = table.voxels();
    let regions = locator.locate(&voxels)?;
    let world = locator.vox_to_world(&voxels)?;
    if regions.len() != rows.len() || world.len() != rows.len() {
        return Err(MfxError::shape(
            "locator output",
            rows.len(),
            (regions.len(), world.len()),
        ));
    }

    for ((row, region), mm) in rows.iter_mut().zip(regions).zip(world) {
        row.region = Some(region);
        row.coords = mm;
    }
    Ok(rows)
}

fn format_coord(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Write canonical rows as CSV: `Peak,Cluster,Value,x,y,z[,MaxProb Region,Prob]`
pub fn write_canonical_table(path: &Path, rows: &[CanonicalPeak]) -> Result<()> {
    let with_regions = rows.iter().any(|r| r.region.is_some());
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["Peak", "Cluster", "Value", "x", "y", "z"];
    if with_regions {
        header.extend(["MaxProb Region", "Prob"]);
    }
    writer.write_record(&header)?;

    for row in rows {
        let mut record = vec![
            row.peak.to_string(),
            row.cluster.to_string(),
            row.value.to_string(),
            format_coord(row.coords[0]),
            format_coord(row.coords[1]),
            format_coord(row.coords[2]),
        ];
        if with_regions {
            let region = row.region.clone().unwrap_or_else(crate::types::PeakRegion::unknown);
            record.push(region.region);
            record.push(region.prob.to_string());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Format a cluster tool peak file into `<out_dir>/<name>.csv`
pub fn cluster_table(
    localmax_file: &Path,
    out_dir: &Path,
    locator: &dyn PeakLocator,
) -> Result<PathBuf> {
    crate::profile_scope!("peak table");
    let table = read_peak_table(localmax_file)?;
    let rows = format_peak_table(&table, locator)?;
    let out_file = naming::swap_ext(out_dir, localmax_file, "csv")?;
    write_canonical_table(&out_file, &rows)?;
    log::info!("Wrote peak table {} ({} rows)", out_file.display(), rows.len());
    Ok(out_file)
}
