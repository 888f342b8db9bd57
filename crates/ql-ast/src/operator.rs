//! Binary and unary operators, ordered lowest-to-highest precedence per
//! spec.md §4.1.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Implies,
    Or,
    Xor,
    And,
    Equal,
    NotEqual,
    Equivalent,
    NotEquivalent,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    In,
    Contains,
    Overlaps,
    Before,
    After,
    Meets,
    Starts,
    Ends,
    During,
    Includes,
    Is,
    As,
    Union,
    Between,
    Add,
    Subtract,
    Concat,
    Multiply,
    Divide,
    IntegerDivide,
    Modulo,
    Power,
}

impl BinaryOperator {
    /// Binding power used by the Pratt parser; higher binds tighter.
    /// Mirrors spec.md §4.1's precedence table exactly.
    pub fn binding_power(self) -> (u8, u8) {
        use BinaryOperator::*;
        let level = match self {
            Implies => 1,
            Or | Xor => 2,
            And => 3,
            Equal | NotEqual | Equivalent | NotEquivalent => 4,
            Less | LessOrEqual | Greater | GreaterOrEqual => 5,
            In | Contains | Overlaps | Before | After | Meets | Starts | Ends | During
            | Includes => 6,
            Is | As => 7,
            Union => 8,
            Between => 9,
            Add | Subtract | Concat => 10,
            Multiply | Divide | IntegerDivide | Modulo => 11,
            Power => 12,
        };
        (level * 2, level * 2 + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Positive,
    Not,
}
