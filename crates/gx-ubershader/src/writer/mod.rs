//! IR → source text.
//!
//! Expressions render the same way in every dialect apart from type names, literal suffixes,
//! ternaries and scalar broadcasts; those differences live in this module. Statement layout
//! differs more (switch syntax, declarations, masked writes) and lives in [`hlsl`] and [`wgsl`].
//!
//! Binary sub-expressions are always parenthesised, which sidesteps WGSL's refusal to mix
//! bitwise and relational operators without explicit grouping.

use std::fmt::{self, Write};

use crate::ir::{Block, Expr, Function, Literal, Scalar, Ty, UnOp};
use crate::ShaderDialect;

pub mod hlsl;
pub mod wgsl;

const INDENT: &str = "  ";

/// Appends `function` followed by a newline.
pub fn write_function(out: &mut String, dialect: ShaderDialect, function: &Function) {
    match dialect {
        ShaderDialect::Hlsl => hlsl::write_function(out, function),
        ShaderDialect::Wgsl => wgsl::write_function(out, function),
    }
}

/// Appends the statements of `block`, each line indented by `indent` levels.
pub fn write_block(out: &mut String, dialect: ShaderDialect, block: &Block, indent: usize) {
    match dialect {
        ShaderDialect::Hlsl => hlsl::write_block(out, block, indent),
        ShaderDialect::Wgsl => wgsl::write_block(out, block, indent),
    }
}

pub fn expr_to_string(dialect: ShaderDialect, expr: &Expr) -> String {
    display_expr(dialect, expr).to_string()
}

pub fn type_name(dialect: ShaderDialect, ty: Ty) -> String {
    let scalar = |s: Scalar| match (dialect, s) {
        (_, Scalar::Bool) => "bool",
        (ShaderDialect::Hlsl, Scalar::Int) => "int",
        (ShaderDialect::Hlsl, Scalar::Uint) => "uint",
        (ShaderDialect::Hlsl, Scalar::Float) => "float",
        (ShaderDialect::Wgsl, Scalar::Int) => "i32",
        (ShaderDialect::Wgsl, Scalar::Uint) => "u32",
        (ShaderDialect::Wgsl, Scalar::Float) => "f32",
    };
    match (dialect, ty) {
        (_, Ty::Scalar(s)) => scalar(s).to_owned(),
        (ShaderDialect::Hlsl, Ty::Vector(s, n)) => format!("{}{}", scalar(s), n),
        (ShaderDialect::Wgsl, Ty::Vector(s, n)) => format!("vec{}<{}>", n, scalar(s)),
    }
}

pub fn literal(dialect: ShaderDialect, lit: Literal) -> String {
    match lit {
        Literal::Bool(b) => b.to_string(),
        Literal::Int(v) => match dialect {
            ShaderDialect::Hlsl => v.to_string(),
            ShaderDialect::Wgsl => format!("{v}i"),
        },
        Literal::Uint(v) => format!("{v}u"),
        // `Debug` always keeps a decimal point or exponent (`1.0`, `0.5`, `1e-7`).
        Literal::Float(v) => format!("{v:?}"),
    }
}

pub(crate) fn display_expr(dialect: ShaderDialect, expr: &Expr) -> ExprDisplay<'_> {
    ExprDisplay {
        dialect,
        expr,
        nested: false,
    }
}

pub(crate) struct ExprDisplay<'a> {
    dialect: ShaderDialect,
    expr: &'a Expr,
    nested: bool,
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expr(f, self.dialect, self.expr, self.nested)
    }
}

fn fmt_args(f: &mut fmt::Formatter<'_>, dialect: ShaderDialect, args: &[Expr]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        fmt_expr(f, dialect, arg, false)?;
    }
    Ok(())
}

fn fmt_expr(
    f: &mut fmt::Formatter<'_>,
    dialect: ShaderDialect,
    expr: &Expr,
    nested: bool,
) -> fmt::Result {
    match expr {
        Expr::Lit(lit) => {
            let text = literal(dialect, *lit);
            if nested && text.starts_with('-') {
                write!(f, "({text})")
            } else {
                f.write_str(&text)
            }
        }
        Expr::Ident(name) => f.write_str(name),
        Expr::Unary(op, operand) => {
            let symbol = match op {
                UnOp::Neg => '-',
                UnOp::Not => '!',
            };
            if nested {
                f.write_char('(')?;
            }
            f.write_char(symbol)?;
            fmt_expr(f, dialect, operand, true)?;
            if nested {
                f.write_char(')')?;
            }
            Ok(())
        }
        Expr::Binary(op, lhs, rhs) => {
            if nested {
                f.write_char('(')?;
            }
            fmt_expr(f, dialect, lhs, true)?;
            write!(f, " {} ", op.symbol())?;
            fmt_expr(f, dialect, rhs, true)?;
            if nested {
                f.write_char(')')?;
            }
            Ok(())
        }
        Expr::Call(name, args) => {
            write!(f, "{name}(")?;
            fmt_args(f, dialect, args)?;
            f.write_char(')')
        }
        Expr::Construct(ty, args) => {
            write!(f, "{}(", type_name(dialect, *ty))?;
            fmt_args(f, dialect, args)?;
            f.write_char(')')
        }
        Expr::Splat(ty, value) => match dialect {
            // Scalars promote implicitly in C-like dialects.
            ShaderDialect::Hlsl => fmt_expr(f, dialect, value, nested),
            ShaderDialect::Wgsl => {
                write!(f, "{}(", type_name(dialect, *ty))?;
                fmt_expr(f, dialect, value, false)?;
                f.write_char(')')
            }
        },
        Expr::Swizzle(base, swizzle) => {
            fmt_expr(f, dialect, base, true)?;
            write!(f, ".{swizzle}")
        }
        Expr::Field(base, name) => {
            fmt_expr(f, dialect, base, true)?;
            write!(f, ".{name}")
        }
        Expr::Index(base, index) => {
            fmt_expr(f, dialect, base, true)?;
            f.write_char('[')?;
            fmt_expr(f, dialect, index, false)?;
            f.write_char(']')
        }
        Expr::Select {
            cond,
            accept,
            reject,
        } => match dialect {
            ShaderDialect::Hlsl => {
                if nested {
                    f.write_char('(')?;
                }
                fmt_expr(f, dialect, cond, true)?;
                f.write_str(" ? ")?;
                fmt_expr(f, dialect, accept, true)?;
                f.write_str(" : ")?;
                fmt_expr(f, dialect, reject, true)?;
                if nested {
                    f.write_char(')')?;
                }
                Ok(())
            }
            ShaderDialect::Wgsl => {
                f.write_str("select(")?;
                fmt_expr(f, dialect, reject, false)?;
                f.write_str(", ")?;
                fmt_expr(f, dialect, accept, false)?;
                f.write_str(", ")?;
                fmt_expr(f, dialect, cond, false)?;
                f.write_char(')')
            }
        },
        Expr::BitfieldExtract { value, field } => {
            let (name, offset, size) = match dialect {
                ShaderDialect::Hlsl => (
                    crate::bitfield::BITFIELD_EXTRACT_FN,
                    Literal::Int(field.offset as i32),
                    Literal::Int(field.size as i32),
                ),
                ShaderDialect::Wgsl => (
                    "extractBits",
                    Literal::Uint(field.offset),
                    Literal::Uint(field.size),
                ),
            };
            write!(f, "{name}(")?;
            fmt_expr(f, dialect, value, false)?;
            write!(
                f,
                ", {}, {})",
                literal(dialect, offset),
                literal(dialect, size)
            )
        }
    }
}

/// Line-oriented output with two-space indentation.
pub(crate) struct SourceWriter<'a> {
    out: &'a mut String,
    indent: usize,
}

impl<'a> SourceWriter<'a> {
    pub(crate) fn new(out: &'a mut String, indent: usize) -> Self {
        Self { out, indent }
    }

    pub(crate) fn line(&mut self, args: fmt::Arguments<'_>) {
        for _ in 0..self.indent {
            self.out.push_str(INDENT);
        }
        let _ = self.out.write_fmt(args);
        self.out.push('\n');
    }

    pub(crate) fn blank(&mut self) {
        self.out.push('\n');
    }

    pub(crate) fn indent(&mut self) {
        self.indent += 1;
    }

    pub(crate) fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }
}
