use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::core::chain::{ChainRecord, CHAIN_EXT};
use crate::core::diff::diff_crop;
use crate::core::error::{Error, Result};
use crate::core::raster::Raster;
use crate::core::solution::chain_length;

/// Artifact stem for an image identifier: the file name minus directory and
/// extension.
pub fn artifact_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

/// Write one derivation artifact per node into `out_dir`: a full PNG for
/// self-parented roots, a bounding-box diff crop for derived nodes, plus a
/// chain record either way. A derived node identical to its parent gets a
/// record with an empty artifact name and no crop file.
pub fn materialize(
    images: &[Raster],
    names: &[String],
    parents: &[usize],
    out_dir: &Path,
) -> Result<()> {
    assert_eq!(images.len(), names.len());
    assert_eq!(images.len(), parents.len());
    let n = images.len();

    let stems: Vec<String> = names.iter().map(|name| artifact_stem(name)).collect();
    let mut seen = HashSet::new();
    for stem in &stems {
        if !seen.insert(stem) {
            return Err(Error::InvalidInput(format!(
                "duplicate artifact stem \"{stem}\"; input names must have distinct file stems"
            )));
        }
    }

    // refuse to write artifacts for a solution that is not a forest
    for node in 0..n {
        chain_length(parents, node, n)?;
    }

    let mut roots = 0usize;
    let mut empty_diffs = 0usize;
    for node in 0..n {
        let parent = parents[node];
        let record = if parent == node {
            roots += 1;
            let raster_name = format!("{}.png", stems[node]);
            images[node].write_png(&out_dir.join(&raster_name))?;
            ChainRecord::root(raster_name)
        } else {
            let parent_record = format!("{}.{}", stems[parent], CHAIN_EXT);
            match diff_crop(&images[parent], &images[node]) {
                Some(d) => {
                    let raster_name = format!("{}.png", stems[node]);
                    d.crop.write_png(&out_dir.join(&raster_name))?;
                    ChainRecord::derived(raster_name, parent_record, d.left, d.top)
                }
                None => {
                    empty_diffs += 1;
                    ChainRecord::derived("", parent_record, 0, 0)
                }
            }
        };
        record.store(&out_dir.join(format!("{}.{}", stems[node], CHAIN_EXT)))?;
    }

    info!(
        "materialized {} nodes into {} ({} roots, {} empty diffs)",
        n,
        out_dir.display(),
        roots,
        empty_diffs
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn textured(seed: u8) -> Raster {
        let mut r = Raster::zeroed(8, 8);
        for y in 0..8 {
            for x in 0..8 {
                let v = (x * 8 + y) as u8;
                r.set_pixel(x, y, [v.wrapping_add(seed), v, seed, 255]);
            }
        }
        r
    }

    #[test]
    fn test_artifact_stem() {
        assert_eq!(artifact_stem("shots/frame01.png"), "frame01");
        assert_eq!(artifact_stem("frame01.png"), "frame01");
        assert_eq!(artifact_stem("frame01"), "frame01");
    }

    #[test]
    fn test_root_and_derived_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let base = textured(0);
        let mut derived = base.clone();
        derived.set_pixel(3, 3, [250, 0, 0, 255]);

        let names = vec!["shots/a.png".to_string(), "shots/b.png".to_string()];
        materialize(&[base, derived], &names, &[0, 0], dir.path()).unwrap();

        assert!(dir.path().join("a.png").exists());
        assert!(dir.path().join("b.png").exists());

        let root = ChainRecord::load(&dir.path().join("a.chain")).unwrap();
        assert_eq!(root, ChainRecord::root("a.png"));

        let child = ChainRecord::load(&dir.path().join("b.chain")).unwrap();
        assert_eq!(child, ChainRecord::derived("b.png", "a.chain", 3, 3));

        // the crop is 1x1 and keeps its stored alpha
        let crop = Raster::load(&dir.path().join("b.png")).unwrap();
        assert_eq!((crop.width(), crop.height()), (1, 1));
        assert_eq!(crop.pixel(0, 0), [250, 0, 0, 255]);
    }

    #[test]
    fn test_identical_child_writes_no_crop() {
        let dir = tempfile::tempdir().unwrap();
        let base = textured(1);
        let twin = base.clone();

        let names = vec!["a.png".to_string(), "b.png".to_string()];
        materialize(&[base, twin], &names, &[0, 0], dir.path()).unwrap();

        assert!(!dir.path().join("b.png").exists());
        let record = ChainRecord::load(&dir.path().join("b.chain")).unwrap();
        assert_eq!(record, ChainRecord::derived("", "a.chain", 0, 0));
    }

    #[test]
    fn test_duplicate_stems_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["x/frame.png".to_string(), "y/frame.png".to_string()];
        let err =
            materialize(&[textured(0), textured(9)], &names, &[0, 0], dir.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_cyclic_solution_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let names = vec!["a.png".to_string(), "b.png".to_string()];
        let err =
            materialize(&[textured(0), textured(9)], &names, &[1, 0], dir.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
