//! HLSL-flavoured statement layout.
//!
//! Switch cases are written as fallthrough labels followed by `break;`, matching what the GL
//! backends also accept once the driver has aliased the vector types.

use crate::ir::{Block, Function, LoopHint, Stmt};
use crate::writer::{display_expr, literal, type_name, SourceWriter};
use crate::ShaderDialect;

const DIALECT: ShaderDialect = ShaderDialect::Hlsl;

pub fn write_function(out: &mut String, function: &Function) {
    let params = function
        .params
        .iter()
        .map(|p| format!("{} {}", type_name(DIALECT, p.ty), p.name))
        .collect::<Vec<_>>()
        .join(", ");
    let mut w = SourceWriter::new(out, 0);
    w.line(format_args!(
        "{} {}({}) {{",
        type_name(DIALECT, function.ret),
        function.name,
        params
    ));
    w.indent();
    write_stmts(&mut w, &function.body);
    w.dedent();
    w.line(format_args!("}}"));
}

pub fn write_block(out: &mut String, block: &Block, indent: usize) {
    let mut w = SourceWriter::new(out, indent);
    write_stmts(&mut w, block);
}

fn write_stmts(w: &mut SourceWriter<'_>, block: &Block) {
    for stmt in block.stmts() {
        write_stmt(w, stmt);
    }
}

fn write_nested(w: &mut SourceWriter<'_>, block: &Block) {
    w.indent();
    write_stmts(w, block);
    w.dedent();
}

fn write_stmt(w: &mut SourceWriter<'_>, stmt: &Stmt) {
    match stmt {
        Stmt::Comment(text) => w.line(format_args!("// {text}")),
        Stmt::Blank => w.blank(),
        Stmt::Declare { name, ty, init, .. } => match init {
            Some(init) => w.line(format_args!(
                "{} {} = {};",
                type_name(DIALECT, *ty),
                name,
                display_expr(DIALECT, init)
            )),
            None => w.line(format_args!("{} {};", type_name(DIALECT, *ty), name)),
        },
        Stmt::Assign { place, op, value } => {
            let mask = place.mask.map(|m| format!(".{m}")).unwrap_or_default();
            let op = op.map(|op| op.symbol()).unwrap_or("");
            w.line(format_args!(
                "{}{} {}= {};",
                place.var,
                mask,
                op,
                display_expr(DIALECT, value)
            ));
        }
        Stmt::If {
            cond,
            then_block,
            else_block,
        } => {
            w.line(format_args!("if ({}) {{", display_expr(DIALECT, cond)));
            write_nested(w, then_block);
            write_else_chain(w, else_block.as_ref());
        }
        Stmt::Switch {
            selector,
            cases,
            default,
        } => {
            w.line(format_args!("switch ({}) {{", display_expr(DIALECT, selector)));
            for case in cases {
                let last = case.labels.len().saturating_sub(1);
                for (i, label) in case.labels.iter().enumerate() {
                    match (&case.comment, i == last) {
                        (Some(comment), true) => w.line(format_args!(
                            "case {}: // {}",
                            literal(DIALECT, *label),
                            comment
                        )),
                        _ => w.line(format_args!("case {}:", literal(DIALECT, *label))),
                    }
                }
                write_case_body(w, &case.body);
            }
            if let Some(default) = default {
                w.line(format_args!("default:"));
                write_case_body(w, default);
            }
            w.line(format_args!("}}"));
        }
        Stmt::For {
            var,
            ty,
            start,
            bound,
            hint,
            body,
        } => {
            let attribute = match hint {
                LoopHint::DontUnroll => "[loop] ",
                LoopHint::None => "",
            };
            w.line(format_args!(
                "{}for ({} {} = {}; {} < {}; {}++) {{",
                attribute,
                type_name(DIALECT, *ty),
                var,
                display_expr(DIALECT, start),
                var,
                display_expr(DIALECT, bound),
                var
            ));
            write_nested(w, body);
            w.line(format_args!("}}"));
        }
        Stmt::Return(value) => w.line(format_args!("return {};", display_expr(DIALECT, value))),
    }
}

fn write_case_body(w: &mut SourceWriter<'_>, body: &Block) {
    w.indent();
    write_stmts(w, body);
    if !body.ends_with_return() {
        w.line(format_args!("break;"));
    }
    w.dedent();
}

fn write_else_chain(w: &mut SourceWriter<'_>, else_block: Option<&Block>) {
    match else_block {
        None => w.line(format_args!("}}")),
        Some(block) => match block.stmts() {
            [Stmt::If {
                cond,
                then_block,
                else_block,
            }] => {
                w.line(format_args!("}} else if ({}) {{", display_expr(DIALECT, cond)));
                write_nested(w, then_block);
                write_else_chain(w, else_block.as_ref());
            }
            _ => {
                w.line(format_args!("}} else {{"));
                write_nested(w, block);
                w.line(format_args!("}}"));
            }
        },
    }
}
