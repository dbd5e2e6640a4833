//! Minimum-arborescence ILP emission.
//!
//! The derivation tree is encoded with a single-commodity-flow formulation:
//! every node k is a "commodity" that must receive one unit of its own flow,
//! and flow may only travel along selected arcs, so any feasible selection is
//! a functional graph whose only cycles are root self-loops, with no need for
//! exponential subtour-elimination rows.
//!
//! One builder serves both variants, parameterized by layer count:
//!
//! * 1 layer (unconstrained): every ordered pair (i, j) is an arc at layer 0,
//!   the self-loop (i, i) meaning "i is a root". Flow moves within the layer.
//! * H+1 layers (hop limit H): layer 0 holds only root self-loops; each layer
//!   h in 1..=H holds one diff step, its arcs linking commodity presence at
//!   the tail in layer h-1 to presence at the head in layer h. Uncoupled
//!   "hold" flows carry a commodity that already arrived straight to the last
//!   layer, where the demand sits, so chains shorter than H stay feasible
//!   while nothing can exceed H steps.

use std::io::Write;

use crate::core::cost::CostMatrix;
use crate::core::error::{Error, Result};

/// Arc-selection variables are named `X_<h>_<i>_<j>`; the materializer splits
/// the name on `_` to recover the arc, so the scheme must stay in sync with
/// `solution::parse_report`.
pub fn arc_variable(h: usize, i: usize, j: usize) -> String {
    format!("X_{h}_{i}_{j}")
}

/// Hop-layered minimum-arborescence model over a cost matrix.
pub struct ArborescenceModel<'a> {
    cost: &'a CostMatrix,
    layers: usize,
}

impl<'a> ArborescenceModel<'a> {
    /// Variant selector: a hop limit of 0 means unconstrained.
    pub fn with_hop_limit(cost: &'a CostMatrix, hops: usize) -> Result<Self> {
        if hops == 0 {
            Self::unconstrained(cost)
        } else {
            Self::hop_constrained(cost, hops)
        }
    }

    pub fn unconstrained(cost: &'a CostMatrix) -> Result<Self> {
        Self::new(cost, 1)
    }

    /// Limit every derivation chain to at most `hops` diff steps. The layered
    /// network gets `hops + 1` layers: the root layer plus one per step.
    pub fn hop_constrained(cost: &'a CostMatrix, hops: usize) -> Result<Self> {
        if hops == 0 {
            return Err(Error::InvalidInput(
                "hop-constrained variant needs at least one hop layer".into(),
            ));
        }
        Self::new(cost, hops + 1)
    }

    fn new(cost: &'a CostMatrix, layers: usize) -> Result<Self> {
        if cost.n() == 0 {
            return Err(Error::InvalidInput("empty cost matrix".into()));
        }
        Ok(ArborescenceModel { cost, layers })
    }

    fn n(&self) -> usize {
        self.cost.n()
    }

    fn layered(&self) -> bool {
        self.layers > 1
    }

    /// All selectable arcs as (layer, tail, head).
    fn arc_space(&self) -> Vec<(usize, usize, usize)> {
        let n = self.n();
        let mut arcs = Vec::new();
        if !self.layered() {
            for i in 0..n {
                for j in 0..n {
                    arcs.push((0, i, j));
                }
            }
        } else {
            for i in 0..n {
                arcs.push((0, i, i));
            }
            for h in 1..self.layers {
                for i in 0..n {
                    for j in 0..n {
                        if i != j {
                            arcs.push((h, i, j));
                        }
                    }
                }
            }
        }
        arcs
    }

    /// Flow variables mirror the arc space; the layered variant adds the
    /// uncoupled hold arcs (h, i, i) for h >= 1.
    fn flow_space(&self) -> Vec<(usize, usize, usize)> {
        let mut flows = self.arc_space();
        if self.layered() {
            for h in 1..self.layers {
                for i in 0..self.n() {
                    flows.push((h, i, i));
                }
            }
        }
        flows
    }

    /// Whether flow on (h, i, j) is capacity-coupled to an arc variable.
    fn coupled(&self, h: usize, i: usize, j: usize) -> bool {
        !self.layered() || h == 0 || i != j
    }

    /// Flow-balance coefficients of one flow arc for commodity k, as
    /// (row name, coefficient) pairs.
    fn balance_terms(&self, k: usize, h: usize, i: usize, j: usize) -> Vec<(String, i64)> {
        if !self.layered() {
            if i == j {
                vec![(balance_row(k, 0, i), -1)]
            } else {
                vec![(balance_row(k, 0, i), 1), (balance_row(k, 0, j), -1)]
            }
        } else if h == 0 {
            vec![(balance_row(k, 0, i), -1)]
        } else if i != j {
            vec![(balance_row(k, h - 1, i), 1), (balance_row(k, h, j), -1)]
        } else {
            // hold: a commodity at i after h-1 steps jumps to the demand layer
            vec![
                (balance_row(k, h - 1, i), 1),
                (balance_row(k, self.layers - 1, i), -1),
            ]
        }
    }

    /// Emit the model as MPS: ROWS, COLUMNS (arc variables bracketed by
    /// integrality markers), RHS, BOUNDS.
    pub fn write_mps<W: Write>(&self, mut out: W) -> std::io::Result<()> {
        let n = self.n();
        let arcs = self.arc_space();
        let flows = self.flow_space();

        if self.layered() {
            writeln!(out, "NAME HOP-CONSTRAINED-DERIVATION-ARBORESCENCE")?;
        } else {
            writeln!(out, "NAME DERIVATION-ARBORESCENCE")?;
        }

        writeln!(out, "ROWS")?;
        writeln!(out, " N COST")?;
        for k in 0..n {
            for h in 0..self.layers {
                for i in 0..n {
                    writeln!(out, " E {}", balance_row(k, h, i))?;
                }
            }
        }
        for k in 0..n {
            for &(h, i, j) in &arcs {
                writeln!(out, " G {}", capacity_row(k, h, i, j))?;
            }
        }

        writeln!(out, "COLUMNS")?;
        writeln!(out, " INT1 'MARKER' 'INTORG'")?;
        for &(h, i, j) in &arcs {
            let x = arc_variable(h, i, j);
            writeln!(out, " {} COST {}", x, self.cost.cost(i, j))?;
            for k in 0..n {
                writeln!(out, " {} {} 1", x, capacity_row(k, h, i, j))?;
            }
        }
        writeln!(out, " INT1END 'MARKER' 'INTEND'")?;
        for k in 0..n {
            for &(h, i, j) in &flows {
                let f = flow_variable(k, h, i, j);
                if self.coupled(h, i, j) {
                    writeln!(out, " {} {} -1", f, capacity_row(k, h, i, j))?;
                }
                let terms = self.balance_terms(k, h, i, j);
                let rendered: Vec<String> = terms
                    .iter()
                    .map(|(row, coeff)| format!("{row} {coeff}"))
                    .collect();
                writeln!(out, " {} {}", f, rendered.join(" "))?;
            }
        }

        writeln!(out, "RHS")?;
        for k in 0..n {
            writeln!(out, " RHS {} -1", balance_row(k, self.layers - 1, k))?;
        }

        writeln!(out, "BOUNDS")?;
        for &(h, i, j) in &arcs {
            writeln!(out, " UP BND {} 1", arc_variable(h, i, j))?;
        }
        for k in 0..n {
            for &(h, i, j) in &flows {
                writeln!(out, " UP BND {} 1", flow_variable(k, h, i, j))?;
            }
        }
        writeln!(out, "ENDATA")?;
        Ok(())
    }
}

fn flow_variable(k: usize, h: usize, i: usize, j: usize) -> String {
    format!("F_{k}_{h}_{i}_{j}")
}

fn balance_row(k: usize, h: usize, i: usize) -> String {
    format!("BAL_{k}_{h}_{i}")
}

fn capacity_row(k: usize, h: usize, i: usize, j: usize) -> String {
    format!("CAP_{k}_{h}_{i}_{j}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(text: &str) -> CostMatrix {
        CostMatrix::parse(text.as_bytes()).unwrap()
    }

    fn render(model: &ArborescenceModel) -> String {
        let mut buf = Vec::new();
        model.write_mps(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_unconstrained_sections() {
        let cost = matrix("2\na.png\nb.png\n10\t3\n4\t20\n");
        let model = ArborescenceModel::unconstrained(&cost).unwrap();
        let mps = render(&model);

        assert!(mps.starts_with("NAME DERIVATION-ARBORESCENCE"));
        for section in ["ROWS", "COLUMNS", "RHS", "BOUNDS", "ENDATA"] {
            assert!(mps.contains(section), "missing section {section}");
        }
        assert!(mps.contains(" INT1 'MARKER' 'INTORG'"));
        assert!(mps.contains(" INT1END 'MARKER' 'INTEND'"));

        // objective carries the matrix cells, self-loops the diagonal
        assert!(mps.contains(" X_0_0_0 COST 10"));
        assert!(mps.contains(" X_0_0_1 COST 3"));
        assert!(mps.contains(" X_0_1_0 COST 4"));
        assert!(mps.contains(" X_0_1_1 COST 20"));

        // each commodity demands one unit at its own node, single layer
        assert!(mps.contains(" RHS BAL_0_0_0 -1"));
        assert!(mps.contains(" RHS BAL_1_0_1 -1"));
    }

    #[test]
    fn test_unconstrained_flow_balance_shape() {
        let cost = matrix("2\na\nb\n10\t3\n4\t20\n");
        let mps = render(&ArborescenceModel::unconstrained(&cost).unwrap());

        // real arc: +1 at tail, -1 at head; self-loop: injection only
        assert!(mps.contains(" F_0_0_0_1 BAL_0_0_0 1 BAL_0_0_1 -1"));
        assert!(mps.contains(" F_0_0_0_0 BAL_0_0_0 -1"));
        // every flow is capacity-coupled to its arc
        assert!(mps.contains(" F_1_0_0_1 CAP_1_0_0_1 -1"));
    }

    #[test]
    fn test_hop_one_model_is_a_star() {
        let cost = matrix("4\na\nb\nc\nd\n9\t1\t1\t1\n1\t9\t1\t1\n1\t1\t9\t1\n1\t1\t1\t9\n");
        let model = ArborescenceModel::hop_constrained(&cost, 1).unwrap();
        let mps = render(&model);

        // layer 0 is root selection only
        assert!(mps.contains(" X_0_0_0 COST 9"));
        assert!(!mps.contains("X_0_0_1"));
        // layer 1 holds the single permitted diff step
        assert!(mps.contains(" X_1_0_1 COST 1"));
        // no second hop layer exists anywhere in the model
        assert!(!mps.contains("X_2_"), "hop limit 1 must not emit layer 2 arcs");
        assert!(!mps.contains("BAL_0_2_"), "no layer-2 balance rows either");
        // demand sits in the last layer
        assert!(mps.contains(" RHS BAL_2_1_2 -1"));
    }

    #[test]
    fn test_hold_flows_are_uncoupled() {
        let cost = matrix("3\na\nb\nc\n5\t1\t1\n1\t5\t1\n1\t1\t5\n");
        let mps = render(&ArborescenceModel::hop_constrained(&cost, 2).unwrap());

        // hold flow exists without a matching arc variable or capacity row
        assert!(mps.contains(" F_0_1_2_2 BAL_0_0_2 1 BAL_0_2_2 -1"));
        assert!(!mps.contains("X_1_2_2"));
        assert!(!mps.contains("CAP_0_1_2_2"));
        // but it is still bounded
        assert!(mps.contains(" UP BND F_0_1_2_2 1"));
    }

    #[test]
    fn test_hop_arc_links_adjacent_layers() {
        let cost = matrix("3\na\nb\nc\n5\t1\t1\n1\t5\t1\n1\t1\t5\n");
        let mps = render(&ArborescenceModel::hop_constrained(&cost, 2).unwrap());

        // layer-2 arc: presence at tail after layer 1, head at layer 2
        assert!(mps.contains(" F_1_2_0_1 BAL_1_1_0 1 BAL_1_2_1 -1"));
        assert!(mps.contains(" F_1_2_0_1 CAP_1_2_0_1 -1"));
    }

    #[test]
    fn test_every_variable_is_bounded() {
        let cost = matrix("2\na\nb\n10\t3\n4\t20\n");
        let mps = render(&ArborescenceModel::hop_constrained(&cost, 1).unwrap());

        for line in mps.lines() {
            if let Some(name) = line.strip_prefix(" ").and_then(|l| l.split(' ').next()) {
                if name.starts_with("X_") || name.starts_with("F_") {
                    assert!(
                        mps.contains(&format!(" UP BND {name} 1")),
                        "{name} has no upper bound"
                    );
                }
            }
        }
    }

    #[test]
    fn test_zero_hops_is_not_a_layered_model() {
        let cost = matrix("2\na\nb\n10\t3\n4\t20\n");
        assert!(ArborescenceModel::hop_constrained(&cost, 0).is_err());
    }
}
