//! Variable layout for saddle problems.
//!
//! A saddle problem partitions its variables into a convex (minimization)
//! group and a concave (maximization) group. The layout assigns each
//! variable of a group a contiguous slice in that group's stacked vector,
//! so affine maps over a whole group can be expressed as matrices.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::{DspError, Result};
use crate::expr::{ExprId, VariableData};

/// Which role a variable group plays in the current pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The minimization group.
    Convex,
    /// The maximization group.
    Concave,
}

impl Side {
    pub fn flip(self) -> Side {
        match self {
            Side::Convex => Side::Concave,
            Side::Concave => Side::Convex,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct SideLayout {
    vars: Vec<VariableData>,
    slices: HashMap<ExprId, Range<usize>>,
    size: usize,
}

impl SideLayout {
    fn new(vars: Vec<VariableData>) -> Self {
        let mut slices = HashMap::new();
        let mut offset = 0;
        for v in &vars {
            let size = v.shape.size();
            slices.insert(v.id, offset..offset + size);
            offset += size;
        }
        SideLayout {
            vars,
            slices,
            size: offset,
        }
    }
}

/// Assignment of variables to the two sides of a saddle pass.
#[derive(Debug, Clone)]
pub struct VariableLayout {
    convex: SideLayout,
    concave: SideLayout,
}

impl VariableLayout {
    /// Build a layout from the two variable groups.
    ///
    /// The groups must be disjoint; slices follow the given ordering.
    pub fn new(convex: Vec<VariableData>, concave: Vec<VariableData>) -> Result<Self> {
        for cv in &convex {
            if concave.iter().any(|cc| cc.id == cv.id) {
                return Err(DspError::InvalidProblem(format!(
                    "variable `{}` appears in both the convex and the concave group",
                    cv.display_name()
                )));
            }
        }
        Ok(VariableLayout {
            convex: SideLayout::new(convex),
            concave: SideLayout::new(concave),
        })
    }

    /// Append a variable to a side, returning its slice.
    ///
    /// Registration only appends, so existing slices never move. Atoms use
    /// this to add precomposition variables while a pass is being parsed.
    pub fn register(&mut self, side: Side, var: VariableData) -> Result<Range<usize>> {
        if self.side_of(var.id).is_some() {
            return Err(DspError::InvalidProblem(format!(
                "variable `{}` is already registered",
                var.display_name()
            )));
        }
        let layout = match side {
            Side::Convex => &mut self.convex,
            Side::Concave => &mut self.concave,
        };
        let size = var.shape.size();
        let slice = layout.size..layout.size + size;
        layout.slices.insert(var.id, slice.clone());
        layout.vars.push(var);
        layout.size += size;
        Ok(slice)
    }

    /// The same variables with the two roles swapped.
    pub fn flipped(&self) -> VariableLayout {
        VariableLayout {
            convex: self.concave.clone(),
            concave: self.convex.clone(),
        }
    }

    fn side_layout(&self, side: Side) -> &SideLayout {
        match side {
            Side::Convex => &self.convex,
            Side::Concave => &self.concave,
        }
    }

    /// Total width of a side's stacked vector.
    pub fn size(&self, side: Side) -> usize {
        self.side_layout(side).size
    }

    /// Variables registered on a side, in slice order.
    pub fn vars(&self, side: Side) -> &[VariableData] {
        &self.side_layout(side).vars
    }

    /// Which side a variable sits on, if registered.
    pub fn side_of(&self, id: ExprId) -> Option<Side> {
        if self.convex.slices.contains_key(&id) {
            Some(Side::Convex)
        } else if self.concave.slices.contains_key(&id) {
            Some(Side::Concave)
        } else {
            None
        }
    }

    /// The slice of a variable within its side's stacked vector.
    pub fn slice_of(&self, side: Side, id: ExprId) -> Result<Range<usize>> {
        self.side_layout(side)
            .slices
            .get(&id)
            .cloned()
            .ok_or_else(|| DspError::UnknownVariable(format!("var{}", id.raw())))
    }

    /// Whether a variable is registered on the given side.
    pub fn contains(&self, side: Side, id: ExprId) -> bool {
        self.side_layout(side).slices.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::variable;

    fn data(e: &crate::expr::Expr) -> VariableData {
        match e {
            crate::expr::Expr::Variable(v) => v.clone(),
            _ => panic!("not a variable"),
        }
    }

    #[test]
    fn test_layout_slices() {
        let x = variable(2);
        let y = variable(3);
        let z = variable(());
        let layout =
            VariableLayout::new(vec![data(&x)], vec![data(&y), data(&z)]).unwrap();

        assert_eq!(layout.size(Side::Convex), 2);
        assert_eq!(layout.size(Side::Concave), 4);
        assert_eq!(
            layout
                .slice_of(Side::Concave, y.variable_id().unwrap())
                .unwrap(),
            0..3
        );
        assert_eq!(
            layout
                .slice_of(Side::Concave, z.variable_id().unwrap())
                .unwrap(),
            3..4
        );
        assert_eq!(layout.side_of(x.variable_id().unwrap()), Some(Side::Convex));
    }

    #[test]
    fn test_layout_rejects_overlap() {
        let x = variable(2);
        let result = VariableLayout::new(vec![data(&x)], vec![data(&x)]);
        assert!(matches!(result, Err(DspError::InvalidProblem(_))));
    }

    #[test]
    fn test_flipped_layout() {
        let x = variable(2);
        let y = variable(3);
        let layout = VariableLayout::new(vec![data(&x)], vec![data(&y)]).unwrap();
        let flipped = layout.flipped();
        assert_eq!(
            flipped.side_of(x.variable_id().unwrap()),
            Some(Side::Concave)
        );
        assert_eq!(flipped.size(Side::Convex), 3);
    }

    #[test]
    fn test_unknown_variable() {
        let x = variable(2);
        let y = variable(3);
        let layout = VariableLayout::new(vec![data(&x)], vec![]).unwrap();
        let result = layout.slice_of(Side::Concave, y.variable_id().unwrap());
        assert!(matches!(result, Err(DspError::UnknownVariable(_))));
    }
}
