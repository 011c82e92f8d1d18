//! WGSL statement layout.
//!
//! WGSL has no fallthrough, requires a `default` clause, and cannot assign through a
//! multi-component swizzle. Masked writes such as `lacc.xyz += e` are rewritten as a whole-vector
//! construction (`lacc = vec4<i32>(lacc.xyz + e, lacc.w)`), which needs the declared type of the
//! destination, so declarations are tracked while writing.

use hashbrown::HashMap;

use crate::ir::{
    construct, ident, BinOp, Block, Component, Expr, Function, Place, Stmt, Swizzle, Ty,
};
use crate::writer::{display_expr, literal, type_name, SourceWriter};
use crate::ShaderDialect;

const DIALECT: ShaderDialect = ShaderDialect::Wgsl;

/// Temporary used for masked writes whose shape cannot be expressed as a single construction.
const MASKED_TEMP: &str = "masked_value";

pub fn write_function(out: &mut String, function: &Function) {
    let mut writer = WgslWriter {
        w: SourceWriter::new(out, 0),
        types: HashMap::new(),
    };
    let params = function
        .params
        .iter()
        .map(|p| format!("{}: {}", p.name, type_name(DIALECT, p.ty)))
        .collect::<Vec<_>>()
        .join(", ");
    for p in &function.params {
        writer.types.insert(p.name.clone(), p.ty);
    }
    writer.w.line(format_args!(
        "fn {}({}) -> {} {{",
        function.name,
        params,
        type_name(DIALECT, function.ret)
    ));
    writer.nested(&function.body);
    writer.w.line(format_args!("}}"));
}

/// Variables the block assigns through a multi-component mask without declaring them are
/// written with a temporary, since their type is unknown here.
pub fn write_block(out: &mut String, block: &Block, indent: usize) {
    let mut writer = WgslWriter {
        w: SourceWriter::new(out, indent),
        types: HashMap::new(),
    };
    writer.stmts(block);
}

struct WgslWriter<'a> {
    w: SourceWriter<'a>,
    types: HashMap<String, Ty>,
}

impl WgslWriter<'_> {
    fn stmts(&mut self, block: &Block) {
        for stmt in block.stmts() {
            self.stmt(stmt);
        }
    }

    fn nested(&mut self, block: &Block) {
        self.w.indent();
        self.stmts(block);
        self.w.dedent();
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Comment(text) => self.w.line(format_args!("// {text}")),
            Stmt::Blank => self.w.blank(),
            Stmt::Declare {
                name,
                ty,
                init,
                mutable,
            } => {
                self.types.insert(name.clone(), *ty);
                let keyword = if *mutable { "var" } else { "let" };
                match init {
                    Some(init) => self.w.line(format_args!(
                        "{} {}: {} = {};",
                        keyword,
                        name,
                        type_name(DIALECT, *ty),
                        display_expr(DIALECT, init)
                    )),
                    None => self.w.line(format_args!(
                        "var {}: {};",
                        name,
                        type_name(DIALECT, *ty)
                    )),
                }
            }
            Stmt::Assign { place, op, value } => self.assign(place, *op, value),
            Stmt::If {
                cond,
                then_block,
                else_block,
            } => {
                self.w
                    .line(format_args!("if ({}) {{", display_expr(DIALECT, cond)));
                self.nested(then_block);
                self.else_chain(else_block.as_ref());
            }
            Stmt::Switch {
                selector,
                cases,
                default,
            } => {
                self.w.line(format_args!(
                    "switch ({}) {{",
                    display_expr(DIALECT, selector)
                ));
                self.w.indent();
                for case in cases {
                    let labels = case
                        .labels
                        .iter()
                        .map(|l| literal(DIALECT, *l))
                        .collect::<Vec<_>>()
                        .join(", ");
                    match &case.comment {
                        Some(comment) => self
                            .w
                            .line(format_args!("case {labels}: {{ // {comment}")),
                        None => self.w.line(format_args!("case {labels}: {{")),
                    }
                    self.nested(&case.body);
                    self.w.line(format_args!("}}"));
                }
                match default {
                    Some(default) => {
                        self.w.line(format_args!("default: {{"));
                        self.nested(default);
                        self.w.line(format_args!("}}"));
                    }
                    None => self.w.line(format_args!("default: {{}}")),
                }
                self.w.dedent();
                self.w.line(format_args!("}}"));
            }
            Stmt::For {
                var,
                ty,
                start,
                bound,
                body,
                ..
            } => {
                self.types.insert(var.clone(), *ty);
                self.w.line(format_args!(
                    "for (var {}: {} = {}; {} < {}; {}++) {{",
                    var,
                    type_name(DIALECT, *ty),
                    display_expr(DIALECT, start),
                    var,
                    display_expr(DIALECT, bound),
                    var
                ));
                self.nested(body);
                self.w.line(format_args!("}}"));
            }
            Stmt::Return(value) => self
                .w
                .line(format_args!("return {};", display_expr(DIALECT, value))),
        }
    }

    fn assign(&mut self, place: &Place, op: Option<BinOp>, value: &Expr) {
        let mask = match place.mask {
            Some(mask) if mask.len() > 1 => mask,
            _ => {
                let mask = place.mask.map(|m| format!(".{m}")).unwrap_or_default();
                let op = op.map(|op| op.symbol()).unwrap_or("");
                self.w.line(format_args!(
                    "{}{} {}= {};",
                    place.var,
                    mask,
                    op,
                    display_expr(DIALECT, value)
                ));
                return;
            }
        };

        let rhs = match op {
            Some(op) => Expr::Binary(
                op,
                Box::new(ident(place.var.clone()).swizzle(mask)),
                Box::new(value.clone()),
            ),
            None => value.clone(),
        };

        if let Some(ty @ Ty::Vector(_, width)) = self.types.get(&place.var).copied() {
            if mask.is_prefix() {
                let mut args = vec![rhs];
                for i in mask.len()..width as usize {
                    if let Some(c) = Component::from_index(i) {
                        args.push(ident(place.var.clone()).swizzle(single(c)));
                    }
                }
                let rebuilt = construct(ty, args);
                self.w.line(format_args!(
                    "{} = {};",
                    place.var,
                    display_expr(DIALECT, &rebuilt)
                ));
                return;
            }
        }

        self.w.line(format_args!("{{"));
        self.w.indent();
        self.w.line(format_args!(
            "let {} = {};",
            MASKED_TEMP,
            display_expr(DIALECT, &rhs)
        ));
        for (i, c) in mask.components().iter().enumerate() {
            let src = Component::from_index(i).map(|c| c.letter()).unwrap_or('x');
            self.w.line(format_args!(
                "{}.{} = {}.{};",
                place.var,
                c.letter(),
                MASKED_TEMP,
                src
            ));
        }
        self.w.dedent();
        self.w.line(format_args!("}}"));
    }

    fn else_chain(&mut self, else_block: Option<&Block>) {
        match else_block {
            None => self.w.line(format_args!("}}")),
            Some(block) => match block.stmts() {
                [Stmt::If {
                    cond,
                    then_block,
                    else_block,
                }] => {
                    self.w.line(format_args!(
                        "}} else if ({}) {{",
                        display_expr(DIALECT, cond)
                    ));
                    self.nested(then_block);
                    self.else_chain(else_block.as_ref());
                }
                _ => {
                    self.w.line(format_args!("}} else {{"));
                    self.nested(block);
                    self.w.line(format_args!("}}"));
                }
            },
        }
    }
}

fn single(c: Component) -> Swizzle {
    match c {
        Component::X => Swizzle::X,
        Component::Y => Swizzle::Y,
        Component::Z => Swizzle::Z,
        Component::W => Swizzle::W,
    }
}
