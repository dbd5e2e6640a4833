use std::io::{BufRead, Write};
use std::path::Path;

use rayon::prelude::*;

use crate::core::diff::diff_crop;
use crate::core::error::{Error, Result};
use crate::core::raster::Raster;

/// N×N encoding-cost grid plus the image identifiers it was computed from.
///
/// Row i holds image i as the diff base: the diagonal is image i's standalone
/// PNG byte length, cell (i, j) the byte length of encoding j as a crop
/// against i. Square by construction.
#[derive(Debug)]
pub struct CostMatrix {
    names: Vec<String>,
    cells: Vec<u64>,
}

impl CostMatrix {
    /// Measure every cell. Rows are independent and filled in parallel over
    /// disjoint slices of one preallocated grid; rasters are shared read-only.
    pub fn compute(names: Vec<String>, images: &[Raster]) -> Result<CostMatrix> {
        if names.len() != images.len() {
            return Err(Error::InvalidInput(format!(
                "{} names for {} images",
                names.len(),
                images.len()
            )));
        }
        let n = images.len();
        if n == 0 {
            return Err(Error::InvalidInput("no images to scan".into()));
        }

        let mut cells = vec![0u64; n * n];
        cells
            .par_chunks_mut(n)
            .enumerate()
            .try_for_each(|(from, row)| -> Result<()> {
                for (to, cell) in row.iter_mut().enumerate() {
                    *cell = if from == to {
                        images[from].encode_png()?.len() as u64
                    } else {
                        pair_cost(&images[from], &images[to])?
                    };
                }
                Ok(())
            })?;

        Ok(CostMatrix { names, cells })
    }

    pub fn n(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn cost(&self, from: usize, to: usize) -> u64 {
        self.cells[from * self.n() + to]
    }

    /// Serialize as the matrix exchange text: N, the N image identifiers,
    /// then N tab-separated rows.
    pub fn write_to<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        let n = self.n();
        writeln!(out, "{}", n)?;
        for name in &self.names {
            writeln!(out, "{}", name)?;
        }
        for from in 0..n {
            let row: Vec<String> = (0..n).map(|to| self.cost(from, to).to_string()).collect();
            writeln!(out, "{}", row.join("\t"))?;
        }
        Ok(())
    }

    /// Parse the matrix exchange text produced by `write_to`.
    pub fn parse<R: BufRead>(reader: R) -> Result<CostMatrix> {
        let mut lines = reader.lines();
        let mut next_line = |what: &str| -> Result<String> {
            match lines.next() {
                Some(Ok(line)) => Ok(line),
                Some(Err(e)) => Err(Error::InvalidInput(format!("unreadable {what}: {e}"))),
                None => Err(Error::InvalidInput(format!("missing {what}"))),
            }
        };

        let header = next_line("image count")?;
        let n: usize = header
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInput(format!("bad image count \"{header}\"")))?;
        if n == 0 {
            return Err(Error::InvalidInput("empty cost matrix".into()));
        }

        let mut names = Vec::with_capacity(n);
        for i in 0..n {
            let name = next_line(&format!("image name {i}"))?;
            if name.trim().is_empty() {
                return Err(Error::InvalidInput(format!("empty image name at index {i}")));
            }
            names.push(name.trim().to_string());
        }

        let mut cells = Vec::with_capacity(n * n);
        for row in 0..n {
            let line = next_line(&format!("matrix row {row}"))?;
            let parsed: std::result::Result<Vec<u64>, _> =
                line.split_whitespace().map(str::parse::<u64>).collect();
            let values = parsed
                .map_err(|_| Error::InvalidInput(format!("bad cost in matrix row {row}")))?;
            if values.len() != n {
                return Err(Error::InvalidInput(format!(
                    "matrix row {row} has {} cells, expected {n}",
                    values.len()
                )));
            }
            cells.extend(values);
        }

        Ok(CostMatrix { names, cells })
    }

    pub fn load(path: &Path) -> Result<CostMatrix> {
        let file = std::fs::File::open(path).map_err(|e| Error::read(path, e))?;
        Self::parse(std::io::BufReader::new(file))
    }
}

/// Diff cost of one ordered pair: zero when pixel-identical, else the PNG
/// byte length of the minimal bounding-box crop.
fn pair_cost(base: &Raster, target: &Raster) -> Result<u64> {
    match diff_crop(base, target) {
        None => Ok(0),
        Some(d) => Ok(d.crop.encode_png()?.len() as u64),
    }
}
