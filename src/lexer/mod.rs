use crate::worksheet::{OperationType, ToolType};
use logos::Logos;

/// Tokens for the worksheet job language
/// One statement per line, parts grouped in braces

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Line comments
#[logos(skip r";[^\n]*")]
#[logos(error = LexerError)]
pub enum Token {
    // Literals
    #[regex(r"-?([0-9]+(\.[0-9]*)?|\.[0-9]+)", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r#""[^"\n]*""#, |lex| lex.slice()[1..lex.slice().len()-1].to_string())]
    String(String),

    // Keywords - Material
    #[token("material")]
    Material,

    #[token("custom")]
    Custom,

    #[token("density")]
    Density,

    #[token("ps")]
    Ps,

    // Keywords - Tooling and machine
    #[token("tool")]
    Tool,

    #[token("hss", |_| ToolType::Hss)]
    #[token("carbide", |_| ToolType::Carbide)]
    #[token("diamond", |_| ToolType::Diamond)]
    #[token("cbn", |_| ToolType::Diamond)]
    #[token("pcd", |_| ToolType::Diamond)]
    ToolKind(ToolType),

    #[token("power")]
    Power,

    #[token("wear")]
    Wear,

    // Keywords - Stock
    #[token("stock")]
    Stock,

    #[token("length")]
    Length,

    #[token("dia")]
    #[token("diameter")]
    Diameter,

    // Keywords - Costing
    #[token("cost")]
    Cost,

    #[token("rate")]
    Rate,

    #[token("batch")]
    Batch,

    #[token("setup")]
    Setup,

    #[token("load")]
    Load,

    #[token("position")]
    Position,

    // Keywords - Parts and passes
    #[token("part")]
    Part,

    #[token("rough")]
    Rough,

    #[token("finish")]
    Finish,

    #[token("turn", |_| OperationType::Turn)]
    #[token("face", |_| OperationType::Face)]
    #[token("bore", |_| OperationType::Bore)]
    #[token("drill", |_| OperationType::Drill)]
    #[token("tap", |_| OperationType::Tap)]
    #[token("ream", |_| OperationType::Ream)]
    #[token("thread", |_| OperationType::Thread)]
    #[token("cutoff", |_| OperationType::Cutoff)]
    #[token("mill", |_| OperationType::Mill)]
    Operation(OperationType),

    #[token("from")]
    #[token("width")]
    From,

    #[token("to")]
    #[token("depth")]
    To,

    #[token("vf")]
    Vf,

    // Anything else that looks like a word
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string(), priority = 1)]
    Word(String),

    // Punctuation
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[regex(r"(\r?\n)+")]
    Newline,
}

impl Token {
    /// Short description for diagnostics
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::String(s) => format!("\"{}\"", s),
            Token::ToolKind(t) => format!("tool type '{}'", t),
            Token::Operation(op) => format!("operation '{}'", op),
            Token::Word(w) => format!("'{}'", w),
            Token::Newline => "end of line".to_string(),
            Token::LBrace => "'{'".to_string(),
            Token::RBrace => "'}'".to_string(),
            other => format!("'{}'", format!("{:?}", other).to_lowercase()),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq)]
pub struct LexerError;

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lexer error")
    }
}

impl std::error::Error for LexerError {}

/// Lex the input string into tokens. Stops at the first character no
/// token accepts and returns its span.
pub fn lex(input: &str) -> Result<Vec<(Token, logos::Span)>, logos::Span> {
    Token::lexer(input)
        .spanned()
        .map(|(result, span)| match result {
            Ok(token) => Ok((token, span)),
            Err(LexerError) => Err(span),
        })
        .collect()
}
