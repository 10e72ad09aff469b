//! Compiled expression tree

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    BitAnd,
    BitOr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Assignment flavours; `Set` is plain `=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sqrt,
    Exp,
    Log,
    Log10,
    Abs,
    Min,
    Max,
    Floor,
    Ceil,
    Sign,
    Pow,
    InvSqrt,
    Loop,
    While,
    Printf,
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "atan2" => Self::Atan2,
            "sqrt" => Self::Sqrt,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "log10" => Self::Log10,
            "abs" => Self::Abs,
            "min" => Self::Min,
            "max" => Self::Max,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "sign" => Self::Sign,
            "pow" => Self::Pow,
            "invsqrt" => Self::InvSqrt,
            "loop" => Self::Loop,
            "while" => Self::While,
            "printf" => Self::Printf,
            _ => return None,
        })
    }

    /// Accepted argument count as `(min, max)`
    pub fn arity(self) -> (usize, usize) {
        match self {
            Self::Atan2 | Self::Min | Self::Max | Self::Pow | Self::Loop => (2, 2),
            Self::While => (1, 1),
            Self::Printf => (1, usize::MAX),
            _ => (1, 1),
        }
    }
}

/// Assignable location
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Var(usize),
    /// `base[index]`
    Mem(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    /// Index into the program's string table
    Str(usize),
    Var(usize),
    Index(Box<Expr>, Box<Expr>),
    Assign(Target, AssignOp, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// `a; b; c`, value of the last
    Seq(Vec<Expr>),
    Call(Builtin, Vec<Expr>),
}
