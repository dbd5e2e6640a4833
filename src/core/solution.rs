use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::core::error::{Error, Result};

/// Parse a solver report into a parent map of length `n`.
///
/// Report lines carry `name value magnitude`; only arc-selection names
/// (`X_<h>_<i>_<j>`) with a solved value of 1 matter. When duplicate lines
/// name the same destination (possible across hop layers), the greatest
/// magnitude wins, later lines winning ties. Lines that do not parse are
/// skipped. A destination left without any arc is an `UnresolvedParent`
/// failure, never a silent default.
pub fn parse_report<R: BufRead>(reader: R, n: usize) -> Result<Vec<usize>> {
    let mut parents: Vec<Option<(usize, u64)>> = vec![None; n];

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => continue,
        };
        let Some(arc) = parse_arc_line(&line, n) else {
            continue;
        };
        let (from, to, magnitude) = arc;
        match parents[to] {
            Some((_, best)) if magnitude < best => {}
            _ => parents[to] = Some((from, magnitude)),
        }
    }

    parents
        .into_iter()
        .enumerate()
        .map(|(node, parent)| match parent {
            Some((from, _)) => Ok(from),
            None => Err(Error::UnresolvedParent(node)),
        })
        .collect()
}

pub fn load_report(path: &Path, n: usize) -> Result<Vec<usize>> {
    let file = std::fs::File::open(path).map_err(|e| Error::read(path, e))?;
    parse_report(std::io::BufReader::new(file), n)
}

/// One selected arc from one report line, or `None` for anything else
/// (non-arc variables, unselected arcs, malformed lines).
fn parse_arc_line(line: &str, n: usize) -> Option<(usize, usize, u64)> {
    let mut fields = line.split_whitespace();
    let name = fields.next()?;
    let value = fields.next()?;
    let magnitude = fields.next()?;

    let mut parts = name.split('_');
    if parts.next()? != "X" {
        return None;
    }
    let _hop: usize = parts.next()?.parse().ok()?;
    let from: usize = parts.next()?.parse().ok()?;
    let to: usize = parts.next()?.parse().ok()?;
    if parts.next().is_some() || from >= n || to >= n {
        return None;
    }

    // solvers print the binary as "1" or "1.000000"
    let value: f64 = value.parse().ok()?;
    if (value - 1.0).abs() > 1e-6 {
        if value != 0.0 {
            debug!("ignoring fractional arc value {value} in \"{line}\"");
        }
        return None;
    }

    let magnitude: u64 = magnitude.parse().ok()?;
    Some((from, to, magnitude))
}

/// Walk a parent map, verifying it reaches a self-parented root from `node`
/// within `max_steps` links. Used by callers that want to fail fast on a
/// solution that is not a forest.
pub fn chain_length(parents: &[usize], node: usize, max_steps: usize) -> Result<usize> {
    let mut current = node;
    for steps in 0..=max_steps {
        if parents[current] == current {
            return Ok(steps);
        }
        current = parents[current];
    }
    Err(Error::InvalidInput(format!(
        "derivation chain from node {node} exceeds {max_steps} steps"
    )))
}
