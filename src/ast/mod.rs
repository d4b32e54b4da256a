/// Abstract Syntax Tree for worksheet job files
/// A job is a list of shop settings and parts, read top to bottom

use crate::worksheet::{OperationType, Pass, ToolType};
use logos::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub items: Vec<Item>,
}

impl Job {
    pub fn parts(&self) -> impl Iterator<Item = &PartDecl> {
        self.items.iter().filter_map(|item| match item {
            Item::Part(part) => Some(part),
            Item::Setting(_) => None,
        })
    }
}

/// Top-level statement. Settings apply to every part declared after them.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Setting(Spanned<Setting>),
    Part(PartDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Setting {
    Material(MaterialRef),
    Tool(ToolType),
    Power(f64),      // hp
    Wear(f64),       // Taylor exponent n
    Stock { length: f64, diameter: f64 }, // in.
    Cost(f64),       // $/lb
    Rate(f64),       // $/hr
    Batch(f64),      // parts per setup, whole number
    Setup(f64),      // hours per setup
    Load(f64),       // seconds per part
    Position(f64),   // seconds per part
}

impl Setting {
    pub fn keyword(&self) -> &'static str {
        match self {
            Setting::Material(_) => "material",
            Setting::Tool(_) => "tool",
            Setting::Power(_) => "power",
            Setting::Wear(_) => "wear",
            Setting::Stock { .. } => "stock",
            Setting::Cost(_) => "cost",
            Setting::Rate(_) => "rate",
            Setting::Batch(_) => "batch",
            Setting::Setup(_) => "setup",
            Setting::Load(_) => "load",
            Setting::Position(_) => "position",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaterialRef {
    Preset(String),
    Custom { density: f64, p_s: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartDecl {
    pub name: String,
    pub span: Span, // name span, used for part-level diagnostics
    pub settings: Vec<Spanned<Setting>>,
    pub passes: Vec<Spanned<PassDecl>>,
}

/// One `rough` or `finish` line
#[derive(Debug, Clone, PartialEq)]
pub struct PassDecl {
    pub pass: Pass,
    pub operation: OperationType,
    pub length: f64,
    pub from: Option<f64>, // defaults to stock diameter
    pub to: f64,
    pub v_f: f64,
    pub p_s: Option<f64>,
}
