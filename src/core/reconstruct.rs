use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::info;

use crate::core::chain::ChainRecord;
use crate::core::diff::composite_into;
use crate::core::error::{Error, Result};
use crate::core::materialize::artifact_stem;
use crate::core::raster::Raster;

/// Rebuild the full raster described by a chain record, resolving the parent
/// chain recursively. Records and rasters are resolved relative to the
/// record's own directory.
pub fn reconstruct(record_path: &Path) -> Result<Raster> {
    let mut visiting = Vec::new();
    resolve(record_path, &mut visiting)
}

/// Reconstruct several chains into `out_dir`, one `<stem>.png` per record.
/// Chains are independent of each other and run in parallel; within one
/// chain the parent must complete before the child composites over it.
pub fn reconstruct_all(records: &[PathBuf], out_dir: &Path) -> Result<()> {
    records.par_iter().try_for_each(|record_path| {
        let raster = reconstruct(record_path)?;
        let stem = artifact_stem(&record_path.to_string_lossy());
        let out_path = out_dir.join(format!("{stem}.png"));
        raster.write_png(&out_path)?;
        info!(
            "reconstructed {} ({}x{})",
            out_path.display(),
            raster.width(),
            raster.height()
        );
        Ok(())
    })
}

fn resolve(path: &Path, visiting: &mut Vec<PathBuf>) -> Result<Raster> {
    // canonical paths double as the cycle-detection key
    let key = path.canonicalize().map_err(|e| Error::read(path, e))?;
    if visiting.contains(&key) {
        return Err(Error::InvalidInput(format!(
            "chain records loop through \"{}\"",
            path.display()
        )));
    }
    visiting.push(key);

    let record = ChainRecord::load(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let Some(link) = record.link else {
        return Raster::load(&dir.join(&record.raster));
    };

    let mut base = resolve(&dir.join(&link.parent), visiting)?;
    if record.raster.is_empty() {
        // empty diff: the node is pixel-identical to its parent
        return Ok(base);
    }

    let crop_path = dir.join(&record.raster);
    let crop = Raster::load(&crop_path)?;
    let fits = link.left as u64 + crop.width() as u64 <= base.width() as u64
        && link.top as u64 + crop.height() as u64 <= base.height() as u64;
    if !fits {
        return Err(Error::DimensionMismatch {
            path: crop_path,
            detail: format!(
                "{}x{} crop at ({}, {}) exceeds {}x{} canvas",
                crop.width(),
                crop.height(),
                link.left,
                link.top,
                base.width(),
                base.height()
            ),
        });
    }

    composite_into(&mut base, &crop, link.left, link.top);
    Ok(base)
}
