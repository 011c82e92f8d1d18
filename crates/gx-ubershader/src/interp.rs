//! CPU evaluation of shader IR.
//!
//! Runs generated functions and blocks against host-supplied uniforms so emitted programs can be
//! checked numerically without a GPU. Integer arithmetic wraps, shift amounts are masked to the
//! lane width and `round` breaks ties to even, as shader compilers do.

use hashbrown::HashMap;
use thiserror::Error;
use tracing::trace;

use crate::bitfield::bitfield_extract;
use crate::ir::{
    BinOp, Block, Expr, Function, Literal, Place, Scalar, Stmt, Swizzle, Ty, UnOp,
};

/// Iterations a single `for` loop may run before evaluation is abandoned.
pub const DEFAULT_LOOP_LIMIT: u32 = 1 << 16;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown identifier `{0}`")]
    UnknownIdent(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("unknown field `{0}`")]
    UnknownField(String),
    #[error("`{name}` expects {expected} arguments, got {got}")]
    ArgumentCount {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("type mismatch in {context}: {detail}")]
    TypeMismatch {
        context: &'static str,
        detail: String,
    },
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("condition is not a boolean scalar")]
    NonBoolCondition,
    #[error("integer division by zero")]
    DivisionByZero,
    #[error("cannot assign to uniform `{0}`")]
    AssignToUniform(String),
    #[error("loop exceeded {0} iterations")]
    IterationLimit(u32),
    #[error("function `{0}` finished without returning a value")]
    MissingReturn(String),
}

fn mismatch(context: &'static str, detail: impl Into<String>) -> EvalError {
    EvalError::TypeMismatch {
        context,
        detail: detail.into(),
    }
}

/// A runtime value. Scalars are one-lane vectors.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(Vec<bool>),
    Int(Vec<i32>),
    Uint(Vec<u32>),
    Float(Vec<f32>),
    Array(Vec<Value>),
    Struct(HashMap<String, Value>),
}

impl Value {
    pub fn bool(v: bool) -> Self {
        Value::Bool(vec![v])
    }

    pub fn int(v: i32) -> Self {
        Value::Int(vec![v])
    }

    pub fn uint(v: u32) -> Self {
        Value::Uint(vec![v])
    }

    pub fn float(v: f32) -> Self {
        Value::Float(vec![v])
    }

    pub fn float3(v: [f32; 3]) -> Self {
        Value::Float(v.to_vec())
    }

    pub fn float4(v: [f32; 4]) -> Self {
        Value::Float(v.to_vec())
    }

    pub fn int4(v: [i32; 4]) -> Self {
        Value::Int(v.to_vec())
    }

    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(items.into_iter().collect())
    }

    pub fn record<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Value::Struct(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_owned(), value))
                .collect(),
        )
    }

    pub fn zero(ty: Ty) -> Self {
        let n = ty.width();
        match ty.scalar() {
            Scalar::Bool => Value::Bool(vec![false; n]),
            Scalar::Int => Value::Int(vec![0; n]),
            Scalar::Uint => Value::Uint(vec![0; n]),
            Scalar::Float => Value::Float(vec![0.0; n]),
        }
    }

    fn from_literal(lit: Literal) -> Self {
        match lit {
            Literal::Bool(v) => Value::bool(v),
            Literal::Int(v) => Value::int(v),
            Literal::Uint(v) => Value::uint(v),
            Literal::Float(v) => Value::float(v),
        }
    }

    /// Type of a scalar or vector value; `None` for arrays and structs.
    pub fn ty(&self) -> Option<Ty> {
        let (scalar, n) = match self {
            Value::Bool(v) => (Scalar::Bool, v.len()),
            Value::Int(v) => (Scalar::Int, v.len()),
            Value::Uint(v) => (Scalar::Uint, v.len()),
            Value::Float(v) => (Scalar::Float, v.len()),
            Value::Array(_) | Value::Struct(_) => return None,
        };
        Some(match n {
            1 => Ty::Scalar(scalar),
            n => Ty::Vector(scalar, n as u8),
        })
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_ints(&self) -> Option<&[i32]> {
        match self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u32> {
        match self {
            Value::Uint(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Value::Float(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    fn lanes(&self) -> Result<Vec<Lane>, EvalError> {
        Ok(match self {
            Value::Bool(v) => v.iter().map(|&x| Lane::Bool(x)).collect(),
            Value::Int(v) => v.iter().map(|&x| Lane::Int(x)).collect(),
            Value::Uint(v) => v.iter().map(|&x| Lane::Uint(x)).collect(),
            Value::Float(v) => v.iter().map(|&x| Lane::Float(x)).collect(),
            Value::Array(_) | Value::Struct(_) => {
                return Err(mismatch("lanes", "aggregate used as a vector"))
            }
        })
    }

    fn from_lanes(scalar: Scalar, lanes: impl IntoIterator<Item = Lane>) -> Self {
        let lanes = lanes.into_iter().map(|l| l.convert(scalar));
        match scalar {
            Scalar::Bool => Value::Bool(
                lanes
                    .map(|l| matches!(l, Lane::Bool(true)))
                    .collect(),
            ),
            Scalar::Int => Value::Int(
                lanes
                    .map(|l| if let Lane::Int(x) = l { x } else { 0 })
                    .collect(),
            ),
            Scalar::Uint => Value::Uint(
                lanes
                    .map(|l| if let Lane::Uint(x) = l { x } else { 0 })
                    .collect(),
            ),
            Scalar::Float => Value::Float(
                lanes
                    .map(|l| if let Lane::Float(x) = l { x } else { 0.0 })
                    .collect(),
            ),
        }
    }

    fn scalar(&self) -> Result<Scalar, EvalError> {
        self.ty()
            .map(Ty::scalar)
            .ok_or_else(|| mismatch("scalar", "aggregate used as a vector"))
    }

    /// Repeats a one-lane value `n` times.
    fn splat(&self, n: usize) -> Result<Value, EvalError> {
        let lanes = self.lanes()?;
        if lanes.len() != 1 {
            return Err(mismatch("splat", format!("{} lanes", lanes.len())));
        }
        Ok(Value::from_lanes(self.scalar()?, std::iter::repeat(lanes[0]).take(n)))
    }

    fn width(&self) -> Option<usize> {
        self.ty().map(Ty::width)
    }
}

#[derive(Debug, Clone, Copy)]
enum Lane {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f32),
}

impl Lane {
    /// Shader conversion rules: float to integer truncates, integer casts reinterpret bits.
    fn convert(self, to: Scalar) -> Lane {
        match (self, to) {
            (Lane::Bool(b), Scalar::Bool) => Lane::Bool(b),
            (Lane::Bool(b), Scalar::Int) => Lane::Int(b as i32),
            (Lane::Bool(b), Scalar::Uint) => Lane::Uint(b as u32),
            (Lane::Bool(b), Scalar::Float) => Lane::Float(if b { 1.0 } else { 0.0 }),
            (Lane::Int(x), Scalar::Bool) => Lane::Bool(x != 0),
            (Lane::Int(x), Scalar::Int) => Lane::Int(x),
            (Lane::Int(x), Scalar::Uint) => Lane::Uint(x as u32),
            (Lane::Int(x), Scalar::Float) => Lane::Float(x as f32),
            (Lane::Uint(x), Scalar::Bool) => Lane::Bool(x != 0),
            (Lane::Uint(x), Scalar::Int) => Lane::Int(x as i32),
            (Lane::Uint(x), Scalar::Uint) => Lane::Uint(x),
            (Lane::Uint(x), Scalar::Float) => Lane::Float(x as f32),
            (Lane::Float(x), Scalar::Bool) => Lane::Bool(x != 0.0),
            (Lane::Float(x), Scalar::Int) => Lane::Int(x as i32),
            (Lane::Float(x), Scalar::Uint) => Lane::Uint(x as u32),
            (Lane::Float(x), Scalar::Float) => Lane::Float(x),
        }
    }
}

fn zip<A: Copy, B: Copy, R>(a: &[A], b: &[B], f: impl Fn(A, B) -> R) -> Vec<R> {
    a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
}

/// Widens a scalar operand to the other operand's width.
fn broadcast(lhs: Value, rhs: Value) -> Result<(Value, Value), EvalError> {
    let (l, r) = match (lhs.width(), rhs.width()) {
        (Some(l), Some(r)) => (l, r),
        _ => return Err(mismatch("binary", "aggregate operand")),
    };
    Ok(match (l, r) {
        (l, r) if l == r => (lhs, rhs),
        (1, r) => (lhs.splat(r)?, rhs),
        (l, 1) => {
            let rhs = rhs.splat(l)?;
            (lhs, rhs)
        }
        (l, r) => return Err(mismatch("binary", format!("{l} lanes against {r}"))),
    })
}

macro_rules! integer_binary {
    ($variant:ident, $op:expr, $a:expr, $b:expr) => {{
        let (a, b) = ($a, $b);
        match $op {
            BinOp::Add => Value::$variant(zip(&a, &b, |x, y| x.wrapping_add(y))),
            BinOp::Sub => Value::$variant(zip(&a, &b, |x, y| x.wrapping_sub(y))),
            BinOp::Mul => Value::$variant(zip(&a, &b, |x, y| x.wrapping_mul(y))),
            BinOp::Div => {
                if b.contains(&0) {
                    return Err(EvalError::DivisionByZero);
                }
                Value::$variant(zip(&a, &b, |x, y| x.wrapping_div(y)))
            }
            BinOp::Shl => Value::$variant(zip(&a, &b, |x, y| x.wrapping_shl(y as u32))),
            BinOp::Shr => Value::$variant(zip(&a, &b, |x, y| x.wrapping_shr(y as u32))),
            BinOp::BitAnd => Value::$variant(zip(&a, &b, |x, y| x & y)),
            BinOp::BitOr => Value::$variant(zip(&a, &b, |x, y| x | y)),
            BinOp::Eq => Value::Bool(zip(&a, &b, |x, y| x == y)),
            BinOp::Ne => Value::Bool(zip(&a, &b, |x, y| x != y)),
            BinOp::Lt => Value::Bool(zip(&a, &b, |x, y| x < y)),
            BinOp::Le => Value::Bool(zip(&a, &b, |x, y| x <= y)),
            BinOp::Gt => Value::Bool(zip(&a, &b, |x, y| x > y)),
            BinOp::Ge => Value::Bool(zip(&a, &b, |x, y| x >= y)),
        }
    }};
}

fn binary(op: BinOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    let (lhs, rhs) = broadcast(lhs, rhs)?;
    Ok(match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => integer_binary!(Int, op, a, b),
        (Value::Uint(a), Value::Uint(b)) => integer_binary!(Uint, op, a, b),
        // Shift amounts may differ in signedness from the shifted value.
        (Value::Int(a), Value::Uint(b)) if op.is_shift() => {
            let b: Vec<i32> = b.iter().map(|&x| x as i32).collect();
            integer_binary!(Int, op, a, b)
        }
        (Value::Uint(a), Value::Int(b)) if op.is_shift() => {
            let b: Vec<u32> = b.iter().map(|&x| x as u32).collect();
            integer_binary!(Uint, op, a, b)
        }
        (Value::Float(a), Value::Float(b)) => match op {
            BinOp::Add => Value::Float(zip(&a, &b, |x, y| x + y)),
            BinOp::Sub => Value::Float(zip(&a, &b, |x, y| x - y)),
            BinOp::Mul => Value::Float(zip(&a, &b, |x, y| x * y)),
            BinOp::Div => Value::Float(zip(&a, &b, |x, y| x / y)),
            BinOp::Eq => Value::Bool(zip(&a, &b, |x, y| x == y)),
            BinOp::Ne => Value::Bool(zip(&a, &b, |x, y| x != y)),
            BinOp::Lt => Value::Bool(zip(&a, &b, |x, y| x < y)),
            BinOp::Le => Value::Bool(zip(&a, &b, |x, y| x <= y)),
            BinOp::Gt => Value::Bool(zip(&a, &b, |x, y| x > y)),
            BinOp::Ge => Value::Bool(zip(&a, &b, |x, y| x >= y)),
            BinOp::Shl | BinOp::Shr | BinOp::BitAnd | BinOp::BitOr => {
                return Err(mismatch("binary", format!("`{}` on floats", op.symbol())))
            }
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinOp::Eq => Value::Bool(zip(&a, &b, |x, y| x == y)),
            BinOp::Ne => Value::Bool(zip(&a, &b, |x, y| x != y)),
            BinOp::BitAnd => Value::Bool(zip(&a, &b, |x, y| x & y)),
            BinOp::BitOr => Value::Bool(zip(&a, &b, |x, y| x | y)),
            _ => return Err(mismatch("binary", format!("`{}` on bools", op.symbol()))),
        },
        (l, r) => {
            return Err(mismatch(
                "binary",
                format!("{:?} {} {:?}", l.ty(), op.symbol(), r.ty()),
            ))
        }
    })
}

fn expect_args(name: &str, args: &[Value], expected: usize) -> Result<(), EvalError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::ArgumentCount {
            name: name.to_owned(),
            expected,
            got: args.len(),
        })
    }
}

fn floats<'a>(name: &'static str, v: &'a Value) -> Result<&'a [f32], EvalError> {
    v.as_floats()
        .ok_or_else(|| mismatch(name, format!("expected floats, got {:?}", v.ty())))
}

fn min_max(lhs: &Value, rhs: &Value, want_max: bool) -> Result<Value, EvalError> {
    let (lhs, rhs) = broadcast(lhs.clone(), rhs.clone())?;
    Ok(match (lhs, rhs) {
        (Value::Float(a), Value::Float(b)) => Value::Float(zip(&a, &b, |x, y| {
            if want_max {
                x.max(y)
            } else {
                x.min(y)
            }
        })),
        (Value::Int(a), Value::Int(b)) => Value::Int(zip(&a, &b, |x, y| {
            if want_max {
                x.max(y)
            } else {
                x.min(y)
            }
        })),
        (Value::Uint(a), Value::Uint(b)) => Value::Uint(zip(&a, &b, |x, y| {
            if want_max {
                x.max(y)
            } else {
                x.min(y)
            }
        })),
        (l, r) => return Err(mismatch("min/max", format!("{:?}, {:?}", l.ty(), r.ty()))),
    })
}

/// Shared-language builtins. `None` when `name` is not one.
fn builtin(name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    let arity = match name {
        "dot" | "max" | "min" => 2,
        "clamp" => 3,
        "length" | "normalize" | "sqrt" | "round" | "abs" => 1,
        _ => return None,
    };
    Some(expect_args(name, args, arity).and_then(|()| match name {
        "dot" => {
            let (a, b) = (floats("dot", &args[0])?, floats("dot", &args[1])?);
            if a.len() != b.len() {
                return Err(mismatch("dot", format!("{} lanes against {}", a.len(), b.len())));
            }
            Ok(Value::float(zip(a, b, |x, y| x * y).into_iter().sum()))
        }
        "length" => {
            let a = floats("length", &args[0])?;
            Ok(Value::float(a.iter().map(|x| x * x).sum::<f32>().sqrt()))
        }
        "normalize" => {
            let a = floats("normalize", &args[0])?;
            let len = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            Ok(Value::Float(a.iter().map(|x| x / len).collect()))
        }
        "sqrt" => Ok(Value::Float(
            floats("sqrt", &args[0])?.iter().map(|x| x.sqrt()).collect(),
        )),
        "round" => Ok(Value::Float(
            floats("round", &args[0])?
                .iter()
                .map(|x| x.round_ties_even())
                .collect(),
        )),
        "abs" => match &args[0] {
            Value::Float(a) => Ok(Value::Float(a.iter().map(|x| x.abs()).collect())),
            Value::Int(a) => Ok(Value::Int(a.iter().map(|x| x.wrapping_abs()).collect())),
            other => Err(mismatch("abs", format!("{:?}", other.ty()))),
        },
        "max" => min_max(&args[0], &args[1], true),
        "min" => min_max(&args[0], &args[1], false),
        "clamp" => min_max(&min_max(&args[0], &args[1], true)?, &args[2], false),
        _ => Err(EvalError::UnknownFunction(name.to_owned())),
    }))
}

fn index_of(v: &Value) -> Result<usize, EvalError> {
    match v {
        Value::Uint(x) if x.len() == 1 => Ok(x[0] as usize),
        Value::Int(x) if x.len() == 1 && x[0] >= 0 => Ok(x[0] as usize),
        other => Err(mismatch("index", format!("{other:?}"))),
    }
}

fn read_swizzle(base: &Value, mask: &Swizzle) -> Result<Value, EvalError> {
    let lanes = base.lanes()?;
    let picked = mask
        .components()
        .iter()
        .map(|c| {
            lanes.get(c.index()).copied().ok_or(EvalError::IndexOutOfBounds {
                index: c.index(),
                len: lanes.len(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::from_lanes(base.scalar()?, picked))
}

/// Host implementation of a function the IR calls but does not define.
pub type NativeFn = Box<dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync>;

enum Flow {
    Next,
    Return(Value),
}

#[derive(Default)]
struct Frame {
    scopes: Vec<HashMap<String, Value>>,
}

impl Frame {
    fn lookup(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.scopes.iter_mut().rev().find_map(|s| s.get_mut(name))
    }

    fn declare(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_owned(), value);
        }
    }
}

pub struct Interpreter {
    functions: HashMap<String, Function>,
    natives: HashMap<String, NativeFn>,
    globals: HashMap<String, Value>,
    loop_limit: u32,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self {
            functions: HashMap::new(),
            natives: HashMap::new(),
            globals: HashMap::new(),
            loop_limit: DEFAULT_LOOP_LIMIT,
        }
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn add_native(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    ) {
        self.natives.insert(name.into(), Box::new(f));
    }

    /// Read-only value visible to every function and block (a uniform).
    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name.into(), value);
    }

    pub fn set_loop_limit(&mut self, limit: u32) {
        self.loop_limit = limit;
    }

    /// Calls a function added with [`Interpreter::add_function`], a native or a builtin.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        if let Some(function) = self.functions.get(name) {
            return self.call_function(function, args);
        }
        if let Some(native) = self.natives.get(name) {
            trace!(function = name, "native call");
            return native(args);
        }
        builtin(name, args).unwrap_or_else(|| Err(EvalError::UnknownFunction(name.to_owned())))
    }

    fn call_function(&self, function: &Function, args: &[Value]) -> Result<Value, EvalError> {
        trace!(function = %function.name, "call");
        expect_args(&function.name, args, function.params.len())?;
        let mut params = HashMap::new();
        for (param, arg) in function.params.iter().zip(args) {
            if arg.ty() != Some(param.ty) {
                return Err(mismatch(
                    "argument",
                    format!("`{}` expects {:?}, got {:?}", param.name, param.ty, arg.ty()),
                ));
            }
            params.insert(param.name.clone(), arg.clone());
        }
        let mut frame = Frame {
            scopes: vec![params],
        };
        match self.exec(&mut frame, &function.body)? {
            Flow::Return(value) if value.ty() == Some(function.ret) => Ok(value),
            Flow::Return(value) => Err(mismatch(
                "return",
                format!("`{}` returns {:?}, got {:?}", function.name, function.ret, value.ty()),
            )),
            Flow::Next => Err(EvalError::MissingReturn(function.name.clone())),
        }
    }

    /// Runs a statement-level block with `bindings` as its enclosing locals and returns their
    /// final values.
    pub fn exec_block(
        &self,
        block: &Block,
        bindings: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>, EvalError> {
        let mut frame = Frame {
            scopes: vec![bindings],
        };
        self.exec(&mut frame, block)?;
        Ok(frame.scopes.pop().unwrap_or_default())
    }

    fn exec(&self, frame: &mut Frame, block: &Block) -> Result<Flow, EvalError> {
        frame.scopes.push(HashMap::new());
        let mut flow = Flow::Next;
        for stmt in block.stmts() {
            if let Flow::Return(value) = self.stmt(frame, stmt)? {
                flow = Flow::Return(value);
                break;
            }
        }
        frame.scopes.pop();
        Ok(flow)
    }

    fn stmt(&self, frame: &mut Frame, stmt: &Stmt) -> Result<Flow, EvalError> {
        match stmt {
            Stmt::Comment(_) | Stmt::Blank => {}
            Stmt::Declare { name, ty, init, .. } => {
                let value = match init {
                    Some(init) => self.eval(frame, init)?,
                    None => Value::zero(*ty),
                };
                if value.ty() != Some(*ty) {
                    return Err(mismatch(
                        "declaration",
                        format!("`{name}` is {ty:?}, initialiser is {:?}", value.ty()),
                    ));
                }
                frame.declare(name, value);
            }
            Stmt::Assign { place, op, value } => {
                let mut value = self.eval(frame, value)?;
                if let Some(op) = op {
                    let current = self.read_place(frame, place)?;
                    value = binary(*op, current, value)?;
                }
                self.write_place(frame, place, value)?;
            }
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                let taken = if self.condition(frame, cond)? {
                    Some(then_block)
                } else {
                    else_block.as_ref()
                };
                if let Some(block) = taken {
                    return self.exec(frame, block);
                }
            }
            Stmt::Switch {
                selector,
                cases,
                default,
            } => {
                let selector = self.eval(frame, selector)?;
                let body = cases
                    .iter()
                    .find(|case| {
                        case.labels
                            .iter()
                            .any(|&label| Value::from_literal(label) == selector)
                    })
                    .map(|case| &case.body)
                    .or(default.as_ref());
                if let Some(body) = body {
                    return self.exec(frame, body);
                }
            }
            Stmt::For {
                var,
                ty,
                start,
                bound,
                body,
                ..
            } => {
                let start = self.eval(frame, start)?;
                let one = Value::from_lanes(ty.scalar(), [Lane::Int(1)]);
                frame.scopes.push(HashMap::new());
                frame.declare(var, start);
                let mut iterations = 0u32;
                let result = loop {
                    if !self.condition(frame, &Expr::Ident(var.clone()).cmp_lt(bound.clone()))? {
                        break Flow::Next;
                    }
                    iterations += 1;
                    if iterations > self.loop_limit {
                        return Err(EvalError::IterationLimit(self.loop_limit));
                    }
                    if let Flow::Return(value) = self.exec(frame, body)? {
                        break Flow::Return(value);
                    }
                    let current = self.read_place(frame, &Place::var(var.clone()))?;
                    let next = binary(BinOp::Add, current, one.clone())?;
                    self.write_place(frame, &Place::var(var.clone()), next)?;
                };
                frame.scopes.pop();
                return Ok(result);
            }
            Stmt::Return(value) => return Ok(Flow::Return(self.eval(frame, value)?)),
        }
        Ok(Flow::Next)
    }

    fn condition(&self, frame: &mut Frame, cond: &Expr) -> Result<bool, EvalError> {
        self.eval(frame, cond)?
            .as_bool()
            .ok_or(EvalError::NonBoolCondition)
    }

    fn read_place(&self, frame: &Frame, place: &Place) -> Result<Value, EvalError> {
        let value = frame
            .lookup(&place.var)
            .or_else(|| self.globals.get(&place.var))
            .ok_or_else(|| EvalError::UnknownIdent(place.var.clone()))?;
        match &place.mask {
            Some(mask) => read_swizzle(value, mask),
            None => Ok(value.clone()),
        }
    }

    fn write_place(&self, frame: &mut Frame, place: &Place, value: Value) -> Result<(), EvalError> {
        let Some(slot) = frame.lookup_mut(&place.var) else {
            return Err(if self.globals.contains_key(&place.var) {
                EvalError::AssignToUniform(place.var.clone())
            } else {
                EvalError::UnknownIdent(place.var.clone())
            });
        };
        let Some(mask) = &place.mask else {
            if slot.ty() != value.ty() {
                return Err(mismatch(
                    "assignment",
                    format!("`{}` is {:?}, value is {:?}", place.var, slot.ty(), value.ty()),
                ));
            }
            *slot = value;
            return Ok(());
        };

        let scalar = slot.scalar()?;
        if value.scalar()? != scalar || value.width() != Some(mask.len()) {
            return Err(mismatch(
                "masked assignment",
                format!("`{}.{mask}` = {:?}", place.var, value.ty()),
            ));
        }
        let mut lanes = slot.lanes()?;
        for (c, lane) in mask.components().iter().zip(value.lanes()?) {
            let len = lanes.len();
            let dst = lanes.get_mut(c.index()).ok_or(EvalError::IndexOutOfBounds {
                index: c.index(),
                len,
            })?;
            *dst = lane;
        }
        *slot = Value::from_lanes(scalar, lanes);
        Ok(())
    }

    fn eval(&self, frame: &mut Frame, expr: &Expr) -> Result<Value, EvalError> {
        Ok(match expr {
            Expr::Lit(lit) => Value::from_literal(*lit),
            Expr::Ident(name) => frame
                .lookup(name)
                .or_else(|| self.globals.get(name))
                .cloned()
                .ok_or_else(|| EvalError::UnknownIdent(name.clone()))?,
            Expr::Unary(op, operand) => match (op, self.eval(frame, operand)?) {
                (UnOp::Neg, Value::Int(v)) => Value::Int(v.iter().map(|x| x.wrapping_neg()).collect()),
                (UnOp::Neg, Value::Float(v)) => Value::Float(v.iter().map(|x| -x).collect()),
                (UnOp::Not, Value::Bool(v)) => Value::Bool(v.iter().map(|x| !x).collect()),
                (op, v) => return Err(mismatch("unary", format!("{op:?} on {:?}", v.ty()))),
            },
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(frame, lhs)?;
                let rhs = self.eval(frame, rhs)?;
                binary(*op, lhs, rhs)?
            }
            Expr::Call(name, args) => {
                let args = args
                    .iter()
                    .map(|a| self.eval(frame, a))
                    .collect::<Result<Vec<_>, _>>()?;
                self.call(name, &args)?
            }
            Expr::Construct(ty, args) => {
                let mut lanes = Vec::new();
                for arg in args {
                    lanes.extend(self.eval(frame, arg)?.lanes()?);
                }
                if lanes.len() == 1 && ty.width() > 1 {
                    lanes = vec![lanes[0]; ty.width()];
                }
                if lanes.len() != ty.width() {
                    return Err(mismatch(
                        "construction",
                        format!("{ty:?} from {} lanes", lanes.len()),
                    ));
                }
                Value::from_lanes(ty.scalar(), lanes)
            }
            Expr::Splat(ty, value) => {
                let value = self.eval(frame, value)?;
                let scalar = value.splat(ty.width())?;
                Value::from_lanes(ty.scalar(), scalar.lanes()?)
            }
            Expr::Swizzle(base, mask) => read_swizzle(&self.eval(frame, base)?, mask)?,
            Expr::Field(base, name) => match self.eval(frame, base)? {
                Value::Struct(mut fields) => fields
                    .remove(name)
                    .ok_or_else(|| EvalError::UnknownField(name.clone()))?,
                other => return Err(mismatch("field", format!("`.{name}` on {:?}", other.ty()))),
            },
            Expr::Index(base, index) => {
                let index = index_of(&self.eval(frame, index)?)?;
                match self.eval(frame, base)? {
                    Value::Array(mut items) => {
                        let len = items.len();
                        if index >= len {
                            return Err(EvalError::IndexOutOfBounds { index, len });
                        }
                        items.swap_remove(index)
                    }
                    other => return Err(mismatch("index", format!("{:?}", other.ty()))),
                }
            }
            Expr::Select {
                cond,
                accept,
                reject,
            } => {
                let cond = self.condition(frame, cond)?;
                let accept = self.eval(frame, accept)?;
                let reject = self.eval(frame, reject)?;
                if cond {
                    accept
                } else {
                    reject
                }
            }
            Expr::BitfieldExtract { value, field } => {
                let bits = match self.eval(frame, value)? {
                    Value::Uint(v) if v.len() == 1 => v[0],
                    Value::Int(v) if v.len() == 1 => v[0] as u32,
                    other => return Err(mismatch("bitfield extract", format!("{:?}", other.ty()))),
                };
                Value::uint(bitfield_extract(bits, field.offset, field.size))
            }
        })
    }
}
