//! Recursive descent parser for worksheet job files
//! Converts tokens into an AST

use crate::ast::*;
use crate::lexer::{lex, Token};
use crate::worksheet::Pass;
use logos::Span;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unrecognized character")]
    UnrecognizedCharacter { span: Span },

    #[error("unexpected token: expected {expected}, got {got}")]
    UnexpectedToken { expected: String, got: String, span: Span },

    #[error("unexpected end of input: expected {expected}")]
    UnexpectedEOF { expected: String, span: Span },

    #[error("unknown keyword '{word}'")]
    UnknownKeyword { word: String, span: Span },

    #[error("'{keyword}' needs a '{field}' value")]
    MissingField {
        keyword: &'static str,
        field: &'static str,
        span: Span,
    },

    #[error("'{field}' given more than once")]
    DuplicateField { field: &'static str, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnrecognizedCharacter { span }
            | ParseError::UnexpectedToken { span, .. }
            | ParseError::UnexpectedEOF { span, .. }
            | ParseError::UnknownKeyword { span, .. }
            | ParseError::MissingField { span, .. }
            | ParseError::DuplicateField { span, .. } => span.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// Lex and parse a job file
pub fn parse_job(source: &str) -> Result<Job> {
    let tokens = lex(source).map_err(|span| ParseError::UnrecognizedCharacter { span })?;
    Parser::new(tokens).parse()
}

// Keyword/value pairs on a `stock`, `material custom` or pass line
const STOCK_FIELDS: &[(Token, &str)] = &[(Token::Length, "length"), (Token::Diameter, "dia")];
const CUSTOM_FIELDS: &[(Token, &str)] = &[(Token::Density, "density"), (Token::Ps, "ps")];
const PASS_FIELDS: &[(Token, &str)] = &[
    (Token::Length, "length"),
    (Token::From, "from"),
    (Token::Diameter, "from"),
    (Token::To, "to"),
    (Token::Vf, "vf"),
    (Token::Ps, "ps"),
];

struct Fields {
    keyword: &'static str,
    span: Span,
    values: Vec<(&'static str, f64)>,
}

impl Fields {
    fn get(&self, field: &str) -> Option<f64> {
        self.values.iter().find(|(name, _)| *name == field).map(|(_, v)| *v)
    }

    fn require(&self, field: &'static str) -> Result<f64> {
        self.get(field).ok_or_else(|| ParseError::MissingField {
            keyword: self.keyword,
            field,
            span: self.span.clone(),
        })
    }
}

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    position: usize,
    end: usize,
}

impl Parser {
    pub fn new(tokens: Vec<(Token, Span)>) -> Self {
        let end = tokens.last().map(|(_, span)| span.end).unwrap_or(0);
        Self {
            tokens,
            position: 0,
            end,
        }
    }

    /// Parse the full job
    pub fn parse(&mut self) -> Result<Job> {
        let mut items = Vec::new();

        loop {
            self.skip_newlines();
            match self.peek() {
                None => break,
                Some(Token::Part) => items.push(Item::Part(self.parse_part()?)),
                Some(_) => items.push(Item::Setting(self.parse_setting()?)),
            }
        }

        Ok(Job { items })
    }

    fn parse_setting(&mut self) -> Result<Spanned<Setting>> {
        let start = self.span().start;
        let (token, span) = self.next_token("a setting")?;

        let setting = match token {
            Token::Material => {
                if self.peek() == Some(&Token::Custom) {
                    self.advance();
                    let fields = self.parse_fields("material custom", CUSTOM_FIELDS)?;
                    Setting::Material(MaterialRef::Custom {
                        density: fields.require("density")?,
                        p_s: fields.require("ps")?,
                    })
                } else {
                    let (name, _) = self.expect_string("material name")?;
                    Setting::Material(MaterialRef::Preset(name))
                }
            }
            Token::Tool => match self.next_token("tool type")? {
                (Token::ToolKind(kind), _) => Setting::Tool(kind),
                (other, span) => {
                    return Err(ParseError::UnexpectedToken {
                        expected: "'hss', 'carbide' or 'diamond'".to_string(),
                        got: other.describe(),
                        span,
                    })
                }
            },
            Token::Stock => {
                let fields = self.parse_fields("stock", STOCK_FIELDS)?;
                Setting::Stock {
                    length: fields.require("length")?,
                    diameter: fields.require("dia")?,
                }
            }
            Token::Power => Setting::Power(self.expect_number()?),
            Token::Wear => Setting::Wear(self.expect_number()?),
            Token::Cost => Setting::Cost(self.expect_number()?),
            Token::Rate => Setting::Rate(self.expect_number()?),
            Token::Batch => Setting::Batch(self.expect_number()?),
            Token::Setup => Setting::Setup(self.expect_number()?),
            Token::Load => Setting::Load(self.expect_number()?),
            Token::Position => Setting::Position(self.expect_number()?),
            Token::Word(word) => return Err(ParseError::UnknownKeyword { word, span }),
            other => {
                return Err(ParseError::UnexpectedToken {
                    expected: "a setting, 'part', 'rough' or 'finish'".to_string(),
                    got: other.describe(),
                    span,
                })
            }
        };

        let span = start..self.previous_end();
        self.end_statement()?;
        Ok(Spanned::new(setting, span))
    }

    fn parse_part(&mut self) -> Result<PartDecl> {
        self.consume(Token::Part)?;
        let (name, span) = self.expect_string("part name")?;
        self.consume(Token::LBrace)?;

        let mut settings = Vec::new();
        let mut passes = Vec::new();

        loop {
            self.skip_newlines();
            match self.peek() {
                Some(Token::RBrace) => {
                    self.advance();
                    break;
                }
                Some(Token::Rough | Token::Finish) => passes.push(self.parse_pass()?),
                Some(_) => settings.push(self.parse_setting()?),
                None => {
                    return Err(ParseError::UnexpectedEOF {
                        expected: "'}'".to_string(),
                        span: self.span(),
                    })
                }
            }
        }
        self.end_statement()?;

        Ok(PartDecl {
            name,
            span,
            settings,
            passes,
        })
    }

    fn parse_pass(&mut self) -> Result<Spanned<PassDecl>> {
        let start = self.span().start;
        let pass = match self.next_token("'rough' or 'finish'")? {
            (Token::Rough, _) => Pass::Rough,
            (Token::Finish, _) => Pass::Finish,
            (other, span) => {
                return Err(ParseError::UnexpectedToken {
                    expected: "'rough' or 'finish'".to_string(),
                    got: other.describe(),
                    span,
                })
            }
        };
        let operation = match self.next_token("operation")? {
            (Token::Operation(op), _) => op,
            (other, span) => {
                return Err(ParseError::UnexpectedToken {
                    expected: "an operation such as 'turn' or 'face'".to_string(),
                    got: other.describe(),
                    span,
                })
            }
        };

        let keyword = match pass {
            Pass::Rough => "rough",
            Pass::Finish => "finish",
        };
        let fields = self.parse_fields(keyword, PASS_FIELDS)?;
        let decl = PassDecl {
            pass,
            operation,
            length: fields.require("length")?,
            from: fields.get("from"),
            to: fields.require("to")?,
            v_f: fields.require("vf")?,
            p_s: fields.get("ps"),
        };

        let span = start..self.previous_end();
        self.end_statement()?;
        Ok(Spanned::new(decl, span))
    }

    /// Read `keyword value` pairs up to the end of the statement
    fn parse_fields(
        &mut self,
        keyword: &'static str,
        allowed: &[(Token, &'static str)],
    ) -> Result<Fields> {
        let start = self
            .tokens
            .get(self.position.saturating_sub(1))
            .map(|(_, span)| span.start)
            .unwrap_or(0);
        let mut values: Vec<(&'static str, f64)> = Vec::new();

        while !self.at_statement_end() {
            let span = self.span();
            let field = match self.peek() {
                Some(token) => allowed.iter().find(|(t, _)| t == token).map(|(_, name)| *name),
                None => None,
            };
            let Some(field) = field else {
                let got = self.peek().map(Token::describe).unwrap_or_default();
                let names: Vec<_> = allowed.iter().map(|(_, name)| format!("'{}'", name)).collect();
                return Err(ParseError::UnexpectedToken {
                    expected: format!("one of {}", names.join(", ")),
                    got,
                    span,
                });
            };
            if values.iter().any(|(name, _)| *name == field) {
                return Err(ParseError::DuplicateField { field, span });
            }
            self.advance();
            values.push((field, self.expect_number()?));
        }

        Ok(Fields {
            keyword,
            span: start..self.previous_end(),
            values,
        })
    }

    fn at_statement_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Newline) | Some(Token::RBrace))
    }

    fn end_statement(&mut self) -> Result<()> {
        match self.peek() {
            None | Some(Token::RBrace) => Ok(()),
            Some(Token::Newline) => {
                self.advance();
                Ok(())
            }
            Some(other) => Err(ParseError::UnexpectedToken {
                expected: "end of line".to_string(),
                got: other.describe(),
                span: self.span(),
            }),
        }
    }

    // ============================================
    // Token helpers
    // ============================================

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<&Token> {
        if let Some((_, _)) = self.tokens.get(self.position) {
            self.position += 1;
        }
        self.tokens.get(self.position - 1).map(|(t, _)| t)
    }

    /// Span of the current token, or an empty span at end of input
    fn span(&self) -> Span {
        self.tokens
            .get(self.position)
            .map(|(_, span)| span.clone())
            .unwrap_or(self.end..self.end)
    }

    fn previous_end(&self) -> usize {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|(_, span)| span.end)
            .unwrap_or(0)
    }

    fn next_token(&mut self, expected: &str) -> Result<(Token, Span)> {
        match self.tokens.get(self.position).cloned() {
            Some(pair) => {
                self.position += 1;
                Ok(pair)
            }
            None => Err(ParseError::UnexpectedEOF {
                expected: expected.to_string(),
                span: self.span(),
            }),
        }
    }

    fn consume(&mut self, expected: Token) -> Result<()> {
        match self.peek() {
            Some(token) if token == &expected => {
                self.advance();
                Ok(())
            }
            Some(other) => Err(ParseError::UnexpectedToken {
                expected: expected.describe(),
                got: other.describe(),
                span: self.span(),
            }),
            None => Err(ParseError::UnexpectedEOF {
                expected: expected.describe(),
                span: self.span(),
            }),
        }
    }

    fn expect_number(&mut self) -> Result<f64> {
        match self.next_token("number")? {
            (Token::Number(n), _) => Ok(n),
            (other, span) => Err(ParseError::UnexpectedToken {
                expected: "number".to_string(),
                got: other.describe(),
                span,
            }),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<(String, Span)> {
        match self.next_token(what)? {
            (Token::String(s), span) => Ok((s, span)),
            (other, span) => Err(ParseError::UnexpectedToken {
                expected: format!("quoted {}", what),
                got: other.describe(),
                span,
            }),
        }
    }

    fn skip_newlines(&mut self) {
        while self.peek() == Some(&Token::Newline) {
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worksheet::{OperationType, ToolType};
    use pretty_assertions::assert_eq;

    const SHAFT: &str = r#"
// shop settings
material "carbon steel"
tool carbide
power 5
wear 0.1
cost 2 ; per lb
rate 60
batch 10

part "shaft" {
    stock length 4 dia 1.0
    rough turn length 2 to 0.8 vf 50
    finish turn length 2 from 0.8 to 0.75 vf 30 ps 1.1
}
"#;

    #[test]
    fn test_parse_job() {
        let job = parse_job(SHAFT).expect("should parse");
        assert_eq!(job.items.len(), 8);

        let settings: Vec<_> = job
            .items
            .iter()
            .filter_map(|item| match item {
                Item::Setting(s) => Some(&s.node),
                Item::Part(_) => None,
            })
            .collect();
        assert_eq!(settings[0], &Setting::Material(MaterialRef::Preset("carbon steel".to_string())));
        assert_eq!(settings[1], &Setting::Tool(ToolType::Carbide));
        assert_eq!(settings[6], &Setting::Batch(10.0));

        let part = job.parts().next().unwrap();
        assert_eq!(part.name, "shaft");
        assert_eq!(
            part.settings[0].node,
            Setting::Stock { length: 4.0, diameter: 1.0 }
        );
        assert_eq!(part.passes.len(), 2);
        assert_eq!(
            part.passes[0].node,
            PassDecl {
                pass: Pass::Rough,
                operation: OperationType::Turn,
                length: 2.0,
                from: None,
                to: 0.8,
                v_f: 50.0,
                p_s: None,
            }
        );
        assert_eq!(part.passes[1].node.from, Some(0.8));
        assert_eq!(part.passes[1].node.p_s, Some(1.1));
    }

    #[test]
    fn test_setting_span() {
        let source = "power 7.5\nrate 80";
        let job = parse_job(source).unwrap();
        match &job.items[1] {
            Item::Setting(s) => assert_eq!(&source[s.span.clone()], "rate 80"),
            Item::Part(_) => panic!("expected setting"),
        }
    }

    #[test]
    fn test_custom_material_and_aliases() {
        let job = parse_job(
            "part \"plate\" {\nmaterial custom ps 0.9 density 0.32\nrough mill length 3 width 1.5 depth 0.1 vf 12\n}",
        )
        .unwrap();
        let part = job.parts().next().unwrap();
        assert_eq!(
            part.settings[0].node,
            Setting::Material(MaterialRef::Custom { density: 0.32, p_s: 0.9 })
        );
        let pass = &part.passes[0].node;
        assert_eq!(pass.operation, OperationType::Mill);
        assert_eq!(pass.from, Some(1.5));
        assert_eq!(pass.to, 0.1);
    }

    #[test]
    fn test_single_line_part() {
        let job = parse_job("part \"a\" { rough face length 1 to 0.5 vf 20 }").unwrap();
        assert_eq!(job.parts().next().unwrap().passes.len(), 1);
    }

    #[test]
    fn test_missing_field() {
        let source = "part \"a\" {\nrough turn length 2 to 0.8\n}";
        let err = parse_job(source).unwrap_err();
        assert!(matches!(
            err,
            ParseError::MissingField { keyword: "rough", field: "vf", .. }
        ));
        assert_eq!(&source[err.span()], "turn length 2 to 0.8");
    }

    #[test]
    fn test_duplicate_field() {
        let err = parse_job("stock length 4 length 5 dia 1").unwrap_err();
        assert_eq!(
            err,
            ParseError::DuplicateField { field: "length", span: 15..21 }
        );

        // dia and from both name the start dimension
        let err = parse_job("part \"a\" {\nrough turn length 1 from 1 dia 1 to 0.5 vf 9\n}").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateField { field: "from", .. }));
    }

    #[test]
    fn test_unknown_keyword() {
        let err = parse_job("spindle 1200").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnknownKeyword { word: "spindle".to_string(), span: 0..7 }
        );
    }

    #[test]
    fn test_unclosed_part() {
        let err = parse_job("part \"a\" {\nrough turn length 1 to 0.5 vf 9\n").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEOF { .. }));
    }

    #[test]
    fn test_trailing_tokens() {
        let err = parse_job("power 5 6").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { ref expected, .. } if expected == "end of line"));
    }

    #[test]
    fn test_bad_character() {
        let err = parse_job("power 5\nrate $60").unwrap_err();
        assert_eq!(err, ParseError::UnrecognizedCharacter { span: 13..14 });
    }

    #[test]
    fn test_bad_tool() {
        let err = parse_job("tool 3").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { span, .. } if span == (5..6)));
    }
}
