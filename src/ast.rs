//! The expression tree model: a tagged variant of node kinds, arena
//! allocated so a tree can be built bottom-up without an owning `Box` per
//! node and evaluated many times without cloning.

use crate::intern::Symbol;
use crate::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Gte,
    Lte,
    Eq,
    Neq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Debug)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub span: Span,
}

#[derive(Debug)]
pub enum ExprKind<'a> {
    Primitive { name: Symbol },
    Function { name: Symbol, args: &'a [&'a Expr<'a>] },
    BinaryOp { op: ArithOp, left: &'a Expr<'a>, right: &'a Expr<'a> },
    DurationLit { minutes: f64, raw: Symbol },
    NumberLit { value: f64 },
    StringLit { value: Symbol },
    Reference { key: Symbol },
    Conditional { cond: &'a Expr<'a>, true_branch: &'a Expr<'a>, false_branch: Option<&'a Expr<'a>> },
    Comparison { op: CompareOp, left: &'a Expr<'a>, right: &'a Expr<'a> },
    LogicalOp { op: LogicalOp, left: &'a Expr<'a>, right: &'a Expr<'a> },
    Not { operand: &'a Expr<'a> },
    ConditionVar { name: Symbol },
    DateLiteral { day: u32, month: u32 },
    Direction { name: Symbol },
    Base { name: Symbol, custom_args: Option<(&'a Expr<'a>, &'a Expr<'a>)> },
}

impl<'a> Expr<'a> {
    pub fn new(kind: ExprKind<'a>, span: Span) -> Self {
        Expr { kind, span }
    }
}

/// Coarse value kind used by the validator's type-inference helper and the
/// arithmetic/branch-unification rules. Distinct from `crate::value::Value`,
/// which carries the actual runtime payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Time,
    Duration,
    Number,
    String,
    Boolean,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::intern::Interner;

    #[test]
    fn expr_node_carries_span() {
        let expr = Expr::new(ExprKind::NumberLit { value: 3.0 }, Span::new(0, 1));
        assert_eq!(expr.span, Span::new(0, 1));
    }

    #[test]
    fn arena_can_allocate_nested_exprs() {
        let arena: Arena<Expr<'_>> = Arena::new();
        let left = arena.alloc(Expr::new(ExprKind::NumberLit { value: 1.0 }, Span::new(0, 1)));
        let right = arena.alloc(Expr::new(ExprKind::NumberLit { value: 2.0 }, Span::new(4, 5)));
        let sum = arena.alloc(Expr::new(
            ExprKind::BinaryOp { op: ArithOp::Add, left, right },
            Span::new(0, 5),
        ));
        match &sum.kind {
            ExprKind::BinaryOp { op, .. } => assert_eq!(*op, ArithOp::Add),
            _ => panic!("expected BinaryOp"),
        }
    }

    #[test]
    fn reference_holds_interned_symbol() {
        let mut interner = Interner::new();
        let key = interner.intern("b");
        let expr = ExprKind::Reference { key };
        match expr {
            ExprKind::Reference { key: k } => assert_eq!(interner.resolve(k), "b"),
            _ => unreachable!(),
        }
    }
}
