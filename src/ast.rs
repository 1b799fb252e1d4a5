//! The simulation DSL's abstract syntax tree ("Language AST") plus the
//! `lr::NodeBuilder` impl the parser reduces into it by `Construct` name.
//!
//! Grounded on `examples/original_source/interpreter/ast_crypto.py`'s node
//! classes (`Program`, `AgentDec`, `FunDef`, `Fcall`, `If`, `While`, `Ret`,
//! the per-operator `BinaryAtom`/`UnaryAtom` leaves) and `_dsl_gen.py`'s
//! attribute constructors, which name the exact shape each `Construct` produces.
//! Unlike the original, which gives every binary operator its own dataclass
//! (`Sum`, `Sub`, `Mul`, ...), this uses one `BinaryOp { lhs, rhs, op }` /
//! `UnaryOp { operand, op }` pair with an operator tag instead. The grammar's
//! `Construct` names still
//! carry the per-operator spelling (`"Sum"`, `"Mul"`, ...); `DslAst::construct`
//! is where those names collapse into the single tagged variant.
use crate::lr::NodeBuilder;
use ptree::{Style, TreeItem};
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Exp,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    Coin,
    Trader,
}

impl AgentKind {
    fn from_keyword(kw: &str) -> AgentKind {
        match kw {
            "coin" => AgentKind::Coin,
            "trader" => AgentKind::Trader,
            other => panic!("unknown agent keyword '{}' - grammar should reject this", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrRoot {
    My,
    Market,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
}

/// One variant per AST node kind, plus a handful of transient "sequence"
/// variants (`ArgList`, `StatementList`, `ExpressionList`, `OptList`,
/// `BehaviorList`, `TopLevelList`) that only ever exist mid-reduction - a parent
/// `Construct` always unpacks them into a plain `Vec`/`HashMap` field of a real
/// node before the parse tree settles. `Token` is the leaf projection: a bare
/// terminal's lexeme, consumed immediately by the `Construct` one level up.
#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Simulation {
        functions: Vec<AstNode>,
        agents: Vec<AstNode>,
    },
    FunDef {
        name: String,
        params: Vec<String>,
        body: Vec<AstNode>,
    },
    /// A single named behavior body - not itself a top-level variant (behaviors
    /// fold into `AgentDec`'s `behaviors` field), but needed as an intermediate
    /// node so `BehaviorList` can accumulate them. `Behavior := ID '{' Stmt+ '}'`
    /// takes no parameter list at all (confirmed by the worked example
    /// `trade { say('hi'); }`), so unlike `FunDef` there is no `params` field here.
    Behavior {
        name: String,
        body: Vec<AstNode>,
    },
    AgentDec {
        kind: AgentKind,
        name: String,
        subtype: String,
        options: Vec<(String, AstNode)>,
        behaviors: Vec<(String, Vec<AstNode>)>,
    },
    Identifier(String),
    Literal(Literal),
    BinaryOp {
        lhs: Box<AstNode>,
        rhs: Box<AstNode>,
        op: BinOp,
    },
    UnaryOp {
        operand: Box<AstNode>,
        op: UnOp,
    },
    FunCall {
        name: String,
        args: Vec<AstNode>,
    },
    AttrRes {
        parent: AttrRoot,
        attr: Box<AstNode>,
    },
    If {
        cond: Box<AstNode>,
        then_body: Vec<AstNode>,
        else_body: Option<Vec<AstNode>>,
    },
    While {
        cond: Box<AstNode>,
        body: Vec<AstNode>,
    },
    Assign {
        target: Box<AstNode>,
        value: Box<AstNode>,
    },
    Ret(Option<Box<AstNode>>),
    Break,

    // transient sequence nodes, never observed past the `Construct` that
    // consumes them.
    ArgList(Vec<String>),
    StatementList(Vec<AstNode>),
    ExpressionList(Vec<AstNode>),
    OptList(Vec<(String, AstNode)>),
    BehaviorList(Vec<(String, Vec<AstNode>)>),
    TopLevelList(Vec<AstNode>),

    /// A raw terminal's lexeme, still waiting to be wrapped by `Identifier`,
    /// `String`, `Number`, or consumed directly (e.g. `FunDef`'s own name).
    Token(String),
}

impl Default for AstNode {
    fn default() -> Self {
        AstNode::Token(String::new())
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl AstNode {
    fn into_token(self) -> String {
        match self {
            AstNode::Token(s) => s,
            other => panic!("expected a leaf token, found {:?}", other),
        }
    }

    fn into_statements(self) -> Vec<AstNode> {
        match self {
            AstNode::StatementList(v) => v,
            other => panic!("expected a StatementList, found {:?}", other),
        }
    }

    fn into_expressions(self) -> Vec<AstNode> {
        match self {
            AstNode::ExpressionList(v) => v,
            other => panic!("expected an ExpressionList, found {:?}", other),
        }
    }

    fn into_params(self) -> Vec<String> {
        match self {
            AstNode::ArgList(v) => v,
            other => panic!("expected an ArgList, found {:?}", other),
        }
    }
}

/// Debug-tree printing via `ptree`, the same facility `lang-pt`'s
/// `ASTNode<TNode>` gets from its own `TreeItem` impl in `ast_node.rs`.
/// `AstNode` is a flat enum rather than a uniform node-plus-children struct,
/// so `label`/`child_nodes` do the per-variant unpacking `ASTNode::node`/
/// `ASTNode::children` get for free there.
impl AstNode {
    fn label(&self) -> String {
        match self {
            AstNode::Simulation { .. } => "Simulation".to_string(),
            AstNode::FunDef { name, params, .. } => format!("FunDef {}({:?})", name, params),
            AstNode::Behavior { name, .. } => format!("Behavior {}", name),
            AstNode::AgentDec { kind, name, subtype, .. } => format!("AgentDec {:?} {}: {}", kind, name, subtype),
            AstNode::Identifier(s) => format!("Identifier({})", s),
            AstNode::Literal(l) => format!("Literal({:?})", l),
            AstNode::BinaryOp { op, .. } => format!("BinaryOp({:?})", op),
            AstNode::UnaryOp { op, .. } => format!("UnaryOp({:?})", op),
            AstNode::FunCall { name, .. } => format!("FunCall {}", name),
            AstNode::AttrRes { parent, .. } => format!("AttrRes({:?})", parent),
            AstNode::If { .. } => "If".to_string(),
            AstNode::While { .. } => "While".to_string(),
            AstNode::Assign { .. } => "Assign".to_string(),
            AstNode::Ret(_) => "Ret".to_string(),
            AstNode::Break => "Break".to_string(),
            AstNode::ArgList(v) => format!("ArgList({:?})", v),
            AstNode::StatementList(_) => "StatementList".to_string(),
            AstNode::ExpressionList(_) => "ExpressionList".to_string(),
            AstNode::OptList(_) => "OptList".to_string(),
            AstNode::BehaviorList(_) => "BehaviorList".to_string(),
            AstNode::TopLevelList(_) => "TopLevelList".to_string(),
            AstNode::Token(s) => format!("Token({:?})", s),
        }
    }

    fn child_nodes(&self) -> Vec<AstNode> {
        match self {
            AstNode::Simulation { functions, agents } => functions.iter().chain(agents).cloned().collect(),
            AstNode::FunDef { body, .. } => body.clone(),
            AstNode::Behavior { body, .. } => body.clone(),
            AstNode::AgentDec { options, behaviors, .. } => options
                .iter()
                .map(|(_, expr)| expr.clone())
                .chain(behaviors.iter().flat_map(|(_, body)| body.iter().cloned()))
                .collect(),
            AstNode::Identifier(_) | AstNode::Literal(_) | AstNode::Break | AstNode::Token(_) => Vec::new(),
            AstNode::BinaryOp { lhs, rhs, .. } => vec![lhs.as_ref().clone(), rhs.as_ref().clone()],
            AstNode::UnaryOp { operand, .. } => vec![operand.as_ref().clone()],
            AstNode::FunCall { args, .. } => args.clone(),
            AstNode::AttrRes { attr, .. } => vec![attr.as_ref().clone()],
            AstNode::If { cond, then_body, else_body } => std::iter::once(cond.as_ref().clone())
                .chain(then_body.iter().cloned())
                .chain(else_body.iter().flatten().cloned())
                .collect(),
            AstNode::While { cond, body } => std::iter::once(cond.as_ref().clone()).chain(body.iter().cloned()).collect(),
            AstNode::Assign { target, value } => vec![target.as_ref().clone(), value.as_ref().clone()],
            AstNode::Ret(value) => value.iter().map(|v| v.as_ref().clone()).collect(),
            AstNode::ArgList(_) => Vec::new(),
            AstNode::StatementList(v) | AstNode::ExpressionList(v) | AstNode::TopLevelList(v) => v.clone(),
            AstNode::OptList(v) => v.iter().map(|(_, expr)| expr.clone()).collect(),
            AstNode::BehaviorList(v) => v.iter().flat_map(|(_, body)| body.iter().cloned()).collect(),
        }
    }

    /// Pretty-print this node and its subtree to stdout, the way
    /// `ASTNode::print` does for a parsed program during development.
    pub fn print(&self) -> std::io::Result<()> {
        ptree::print_tree(self)
    }
}

impl TreeItem for AstNode {
    type Child = AstNode;

    fn write_self<W: std::io::Write>(&self, f: &mut W, _style: &Style) -> std::io::Result<()> {
        write!(f, "{}", self.label())
    }

    fn children(&self) -> Cow<[Self::Child]> {
        Cow::Owned(self.child_nodes())
    }
}

fn strip_string_quotes(raw: &str) -> String {
    raw.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(raw)
        .to_string()
}

fn parse_number(raw: &str) -> Literal {
    if raw.contains('.') {
        Literal::Float(raw.parse().unwrap_or(0.0))
    } else {
        match raw.parse::<i64>() {
            Ok(n) => Literal::Int(n),
            Err(_) => Literal::Float(raw.parse().unwrap_or(0.0)),
        }
    }
}

/// The `lr::NodeBuilder` for this grammar: resolves a production's `Construct`
/// name into an `AstNode` constructor call by looking it up against this
/// module at load time.
pub struct DslAst;

impl NodeBuilder<AstNode> for DslAst {
    fn construct(&self, name: &str, mut args: Vec<AstNode>) -> AstNode {
        match name {
            "Program" => {
                let items = match args.remove(0) {
                    AstNode::TopLevelList(v) => v,
                    other => panic!("Program expects a TopLevelList, found {:?}", other),
                };
                let mut functions = Vec::new();
                let mut agents = Vec::new();
                for item in items {
                    match item {
                        f @ AstNode::FunDef { .. } => functions.push(f),
                        a @ AstNode::AgentDec { .. } => agents.push(a),
                        other => panic!("unexpected top-level item {:?}", other),
                    }
                }
                AstNode::Simulation { functions, agents }
            }
            "TopLevelList" => {
                let mut items = match args.len() {
                    1 => Vec::new(),
                    2 => match args.remove(0) {
                        AstNode::TopLevelList(v) => v,
                        other => panic!("TopLevelList expects a TopLevelList prefix, found {:?}", other),
                    },
                    n => panic!("TopLevelList got {} args", n),
                };
                items.push(args.pop().expect("TopLevelList always has a trailing item"));
                AstNode::TopLevelList(items)
            }
            "FunDef" => {
                let body = args.pop().unwrap().into_statements();
                let params = args.pop().unwrap().into_params();
                let name = args.pop().unwrap().into_token();
                AstNode::FunDef { name, params, body }
            }
            "Behavior" => {
                let body = args.pop().unwrap().into_statements();
                let name = args.pop().unwrap().into_token();
                AstNode::Behavior { name, body }
            }
            "AgentDec" => {
                let behaviors = match args.pop().unwrap() {
                    AstNode::BehaviorList(v) => v,
                    other => panic!("AgentDec expects a BehaviorList, found {:?}", other),
                };
                let options = match args.pop().unwrap() {
                    AstNode::OptList(v) => v,
                    other => panic!("AgentDec expects an OptList, found {:?}", other),
                };
                let subtype = args.pop().unwrap().into_token();
                let name = args.pop().unwrap().into_token();
                let kind = AgentKind::from_keyword(&args.pop().unwrap().into_token());
                AstNode::AgentDec {
                    kind,
                    name,
                    subtype,
                    options,
                    behaviors,
                }
            }
            "OptList" => {
                let mut opts = match args.len() {
                    0 => Vec::new(),
                    1 => Vec::new(),
                    2 => match args.remove(0) {
                        AstNode::OptList(v) => v,
                        other => panic!("OptList expects an OptList prefix, found {:?}", other),
                    },
                    n => panic!("OptList got {} args", n),
                };
                if let Some(last) = args.pop() {
                    match last {
                        AstNode::Assign { target, value } => match *target {
                            AstNode::Identifier(n) => opts.push((n, *value)),
                            other => panic!("option assignment target must be an identifier, found {:?}", other),
                        },
                        other => panic!("OptList expects an Assign, found {:?}", other),
                    }
                }
                AstNode::OptList(opts)
            }
            "BehaviorList" => {
                let mut behaviors = match args.len() {
                    0 => Vec::new(),
                    1 => Vec::new(),
                    2 => match args.remove(0) {
                        AstNode::BehaviorList(v) => v,
                        other => panic!("BehaviorList expects a BehaviorList prefix, found {:?}", other),
                    },
                    n => panic!("BehaviorList got {} args", n),
                };
                if let Some(last) = args.pop() {
                    match last {
                        AstNode::Behavior { name, body } => behaviors.push((name, body)),
                        other => panic!("BehaviorList expects a Behavior, found {:?}", other),
                    }
                }
                AstNode::BehaviorList(behaviors)
            }
            "ArgList" => {
                let mut params = match args.len() {
                    0 => Vec::new(),
                    1 => Vec::new(),
                    2 => match args.remove(0) {
                        AstNode::ArgList(v) => v,
                        other => panic!("ArgList expects an ArgList prefix, found {:?}", other),
                    },
                    n => panic!("ArgList got {} args", n),
                };
                if let Some(last) = args.pop() {
                    params.push(last.into_token());
                }
                AstNode::ArgList(params)
            }
            "StatementList" => {
                let mut stmts = match args.len() {
                    0 => Vec::new(),
                    1 => Vec::new(),
                    2 => match args.remove(0) {
                        AstNode::StatementList(v) => v,
                        other => panic!("StatementList expects a StatementList prefix, found {:?}", other),
                    },
                    n => panic!("StatementList got {} args", n),
                };
                if let Some(last) = args.pop() {
                    stmts.push(last);
                }
                AstNode::StatementList(stmts)
            }
            "ExpressionList" => {
                let mut exprs = match args.len() {
                    0 => Vec::new(),
                    1 => Vec::new(),
                    2 => match args.remove(0) {
                        AstNode::ExpressionList(v) => v,
                        other => panic!("ExpressionList expects an ExpressionList prefix, found {:?}", other),
                    },
                    n => panic!("ExpressionList got {} args", n),
                };
                if let Some(last) = args.pop() {
                    exprs.push(last);
                }
                AstNode::ExpressionList(exprs)
            }
            "If" => {
                let else_body = if args.len() == 3 {
                    Some(args.pop().unwrap().into_statements())
                } else {
                    None
                };
                let then_body = args.pop().unwrap().into_statements();
                let cond = Box::new(args.pop().unwrap());
                AstNode::If { cond, then_body, else_body }
            }
            "While" => {
                let body = args.pop().unwrap().into_statements();
                let cond = Box::new(args.pop().unwrap());
                AstNode::While { cond, body }
            }
            "Ret" => {
                let value = args.pop().map(Box::new);
                AstNode::Ret(value)
            }
            "Break" => AstNode::Break,
            "Assign" => {
                let value = Box::new(args.pop().unwrap());
                let target = Box::new(args.pop().unwrap());
                AstNode::Assign { target, value }
            }
            "Identifier" => AstNode::Identifier(args.pop().unwrap().into_token()),
            "String" => AstNode::Literal(Literal::Str(strip_string_quotes(&args.pop().unwrap().into_token()))),
            "Number" => AstNode::Literal(parse_number(&args.pop().unwrap().into_token())),
            "FunCall" => {
                let call_args = args.pop().unwrap().into_expressions();
                let name = args.pop().unwrap().into_token();
                AstNode::FunCall { name, args: call_args }
            }
            "AttrResMy" | "AttrResMarket" => {
                let attr = Box::new(args.pop().unwrap());
                let parent = if name == "AttrResMy" { AttrRoot::My } else { AttrRoot::Market };
                AstNode::AttrRes { parent, attr }
            }
            "Pow" => {
                let rhs = Box::new(args.pop().unwrap());
                let lhs = Box::new(args.pop().unwrap());
                AstNode::BinaryOp { lhs, rhs, op: BinOp::Exp }
            }
            "Neg" => AstNode::UnaryOp {
                operand: Box::new(args.pop().unwrap()),
                op: UnOp::Neg,
            },
            "Not" => AstNode::UnaryOp {
                operand: Box::new(args.pop().unwrap()),
                op: UnOp::Not,
            },
            binop_name => {
                let op = match binop_name {
                    "Sum" => BinOp::Add,
                    "Sub" => BinOp::Sub,
                    "Mul" => BinOp::Mul,
                    "Div" => BinOp::Div,
                    "Fdiv" => BinOp::FloorDiv,
                    "Mod" => BinOp::Mod,
                    "Eq" => BinOp::Eq,
                    "Neq" => BinOp::Neq,
                    "Lt" => BinOp::Lt,
                    "Leq" => BinOp::Le,
                    "Gt" => BinOp::Gt,
                    "Geq" => BinOp::Ge,
                    "And" => BinOp::And,
                    "Or" => BinOp::Or,
                    other => panic!("unknown AST constructor '{}'", other),
                };
                let rhs = Box::new(args.pop().unwrap());
                let lhs = Box::new(args.pop().unwrap());
                AstNode::BinaryOp { lhs, rhs, op }
            }
        }
    }
}
