//! Structured shader IR.
//!
//! Generators build [`Function`]s and [`Block`]s out of typed nodes and hand them to a
//! [`crate::writer`] renderer. Identifiers, literals and types are kept apart until rendering so
//! each dialect can apply its own spelling (literal suffixes, vector type names, `select` vs `?:`).

use std::fmt;

use crate::xf::BitField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    Int,
    Uint,
    Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ty {
    Scalar(Scalar),
    /// Vector of 2, 3 or 4 components.
    Vector(Scalar, u8),
}

impl Ty {
    pub const BOOL: Ty = Ty::Scalar(Scalar::Bool);
    pub const INT: Ty = Ty::Scalar(Scalar::Int);
    pub const UINT: Ty = Ty::Scalar(Scalar::Uint);
    pub const FLOAT: Ty = Ty::Scalar(Scalar::Float);
    pub const INT3: Ty = Ty::Vector(Scalar::Int, 3);
    pub const INT4: Ty = Ty::Vector(Scalar::Int, 4);
    pub const UINT4: Ty = Ty::Vector(Scalar::Uint, 4);
    pub const FLOAT3: Ty = Ty::Vector(Scalar::Float, 3);
    pub const FLOAT4: Ty = Ty::Vector(Scalar::Float, 4);

    pub fn scalar(self) -> Scalar {
        match self {
            Ty::Scalar(s) | Ty::Vector(s, _) => s,
        }
    }

    pub fn width(self) -> usize {
        match self {
            Ty::Scalar(_) => 1,
            Ty::Vector(_, n) => n as usize,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    X,
    Y,
    Z,
    W,
}

impl Component {
    pub fn index(self) -> usize {
        match self {
            Component::X => 0,
            Component::Y => 1,
            Component::Z => 2,
            Component::W => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Some(match index {
            0 => Component::X,
            1 => Component::Y,
            2 => Component::Z,
            3 => Component::W,
            _ => return None,
        })
    }

    pub fn letter(self) -> char {
        match self {
            Component::X => 'x',
            Component::Y => 'y',
            Component::Z => 'z',
            Component::W => 'w',
        }
    }
}

/// Up to four component selectors, e.g. `.xyz` or `.w`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle {
    components: [Component; 4],
    len: u8,
}

impl Swizzle {
    pub const X: Swizzle = Swizzle::single(Component::X);
    pub const Y: Swizzle = Swizzle::single(Component::Y);
    pub const Z: Swizzle = Swizzle::single(Component::Z);
    pub const W: Swizzle = Swizzle::single(Component::W);
    pub const XYZ: Swizzle = Swizzle {
        components: [Component::X, Component::Y, Component::Z, Component::X],
        len: 3,
    };

    const fn single(c: Component) -> Self {
        Swizzle {
            components: [c; 4],
            len: 1,
        }
    }

    pub fn new(components: &[Component]) -> Option<Self> {
        if components.is_empty() || components.len() > 4 {
            return None;
        }
        let mut out = [Component::X; 4];
        out[..components.len()].copy_from_slice(components);
        Some(Swizzle {
            components: out,
            len: components.len() as u8,
        })
    }

    pub fn components(&self) -> &[Component] {
        &self.components[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// `x`, `xy`, `xyz` or `xyzw`.
    pub fn is_prefix(&self) -> bool {
        self.components()
            .iter()
            .enumerate()
            .all(|(i, c)| c.index() == i)
    }
}

impl fmt::Display for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.components() {
            write!(f, "{}", c.letter())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        }
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinOp::Shl | BinOp::Shr)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Lit(Literal),
    Ident(String),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    /// Builtin (`dot`, `normalize`, ...) or user function call.
    Call(String, Vec<Expr>),
    /// Typed construction; doubles as a numeric conversion when given a single vector argument.
    Construct(Ty, Vec<Expr>),
    /// Broadcast of a scalar to `Ty`. C-like dialects rely on implicit promotion instead.
    Splat(Ty, Box<Expr>),
    Swizzle(Box<Expr>, Swizzle),
    Field(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Select {
        cond: Box<Expr>,
        accept: Box<Expr>,
        reject: Box<Expr>,
    },
    /// Unsigned extraction of `field` from a `uint` value.
    BitfieldExtract { value: Box<Expr>, field: BitField },
}

pub fn ident(name: impl Into<String>) -> Expr {
    Expr::Ident(name.into())
}

pub fn int(v: i32) -> Expr {
    Expr::Lit(Literal::Int(v))
}

pub fn uint(v: u32) -> Expr {
    Expr::Lit(Literal::Uint(v))
}

pub fn float(v: f32) -> Expr {
    Expr::Lit(Literal::Float(v))
}

pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Call(name.into(), args.into_iter().collect())
}

pub fn construct(ty: Ty, args: impl IntoIterator<Item = Expr>) -> Expr {
    Expr::Construct(ty, args.into_iter().collect())
}

pub fn splat(ty: Ty, value: Expr) -> Expr {
    Expr::Splat(ty, Box::new(value))
}

pub fn select(cond: Expr, accept: Expr, reject: Expr) -> Expr {
    Expr::Select {
        cond: Box::new(cond),
        accept: Box::new(accept),
        reject: Box::new(reject),
    }
}

pub fn bitfield_extract(value: Expr, field: BitField) -> Expr {
    Expr::BitfieldExtract {
        value: Box::new(value),
        field,
    }
}

macro_rules! impl_binary_op {
    ($($trait:ident::$method:ident => $op:ident),* $(,)?) => {
        $(
            impl std::ops::$trait for Expr {
                type Output = Expr;

                fn $method(self, rhs: Expr) -> Expr {
                    self.binary(BinOp::$op, rhs)
                }
            }
        )*
    };
}

impl_binary_op! {
    Add::add => Add,
    Sub::sub => Sub,
    Mul::mul => Mul,
    Div::div => Div,
    Shl::shl => Shl,
    Shr::shr => Shr,
    BitAnd::bitand => BitAnd,
    BitOr::bitor => BitOr,
}

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary(UnOp::Neg, Box::new(self))
    }
}

impl Expr {
    fn binary(self, op: BinOp, rhs: Expr) -> Expr {
        Expr::Binary(op, Box::new(self), Box::new(rhs))
    }

    pub fn cmp_eq(self, rhs: Expr) -> Expr {
        self.binary(BinOp::Eq, rhs)
    }

    pub fn cmp_ne(self, rhs: Expr) -> Expr {
        self.binary(BinOp::Ne, rhs)
    }

    pub fn cmp_lt(self, rhs: Expr) -> Expr {
        self.binary(BinOp::Lt, rhs)
    }

    pub fn cmp_ge(self, rhs: Expr) -> Expr {
        self.binary(BinOp::Ge, rhs)
    }

    pub fn swizzle(self, swizzle: Swizzle) -> Expr {
        Expr::Swizzle(Box::new(self), swizzle)
    }

    pub fn field(self, name: impl Into<String>) -> Expr {
        Expr::Field(Box::new(self), name.into())
    }

    pub fn index(self, index: Expr) -> Expr {
        Expr::Index(Box::new(self), Box::new(index))
    }
}

/// Assignment destination: a local variable, optionally write-masked.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub var: String,
    pub mask: Option<Swizzle>,
}

impl Place {
    pub fn var(name: impl Into<String>) -> Self {
        Self {
            var: name.into(),
            mask: None,
        }
    }

    pub fn masked(name: impl Into<String>, mask: Swizzle) -> Self {
        Self {
            var: name.into(),
            mask: Some(mask),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopHint {
    None,
    /// Ask the compiler to keep the loop rolled (`[loop]` in HLSL).
    DontUnroll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub labels: Vec<Literal>,
    pub comment: Option<String>,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Comment(String),
    Blank,
    Declare {
        name: String,
        ty: Ty,
        init: Option<Expr>,
        mutable: bool,
    },
    Assign {
        place: Place,
        /// `Some(op)` renders as `place op= value`.
        op: Option<BinOp>,
        value: Expr,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
    },
    /// Cases never fall through into each other.
    Switch {
        selector: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Block>,
    },
    /// `for (var = start; var < bound; var++)`.
    For {
        var: String,
        ty: Ty,
        start: Expr,
        bound: Expr,
        hint: LoopHint,
        body: Block,
    },
    Return(Expr),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block(pub Vec<Stmt>);

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stmt: Stmt) {
        self.0.push(stmt);
    }

    pub fn stmts(&self) -> &[Stmt] {
        &self.0
    }

    pub fn ends_with_return(&self) -> bool {
        matches!(self.0.last(), Some(Stmt::Return(_)))
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.push(Stmt::Comment(text.into()));
    }

    pub fn blank(&mut self) {
        self.push(Stmt::Blank);
    }

    pub fn var(&mut self, name: impl Into<String>, ty: Ty, init: Option<Expr>) {
        self.push(Stmt::Declare {
            name: name.into(),
            ty,
            init,
            mutable: true,
        });
    }

    pub fn let_(&mut self, name: impl Into<String>, ty: Ty, init: Expr) {
        self.push(Stmt::Declare {
            name: name.into(),
            ty,
            init: Some(init),
            mutable: false,
        });
    }

    pub fn assign(&mut self, place: Place, value: Expr) {
        self.push(Stmt::Assign {
            place,
            op: None,
            value,
        });
    }

    pub fn add_assign(&mut self, place: Place, value: Expr) {
        self.push(Stmt::Assign {
            place,
            op: Some(BinOp::Add),
            value,
        });
    }

    pub fn if_(&mut self, cond: Expr, then_block: Block, else_block: Option<Block>) {
        self.push(Stmt::If {
            cond,
            then_block,
            else_block,
        });
    }

    pub fn ret(&mut self, value: Expr) {
        self.push(Stmt::Return(value));
    }
}

impl FromIterator<Stmt> for Block {
    fn from_iter<I: IntoIterator<Item = Stmt>>(iter: I) -> Self {
        Block(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Ty,
    pub body: Block,
}
