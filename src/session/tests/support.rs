//! Test backends: a tiny arithmetic script language.
//!
//! `ScriptCompiler` and `ScriptEvaluator` implement the stage contracts over
//! a minimal language: `val name = expr` bindings, integer expressions with
//! `+`, `-`, `/` and parentheses, and `require <path>` dependency
//! directives. Identifiers resolve against the evaluator environment first,
//! then against the execution arguments, so tests can rebind values per
//! call.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::history::{CodeLine, LineHistory, SourceLocation};
use crate::repeat::{RepeatingMode, ReplayDecision};
use crate::session::{ReplSession, SessionConfig};
use crate::stage::{
    CheckResponse, CompileResponse, CompiledUnit, EvalResponse, ReplCompiler, ReplEvaluator,
};

/// Execution arguments: name -> value bindings
pub type ScriptArgs = HashMap<String, i64>;

/// Open a session over fresh script backends.
pub fn session(mode: RepeatingMode) -> ReplSession<ScriptCompiler, ScriptEvaluator> {
    session_with_config(mode, SessionConfig::default())
}

/// Open a session over fresh script backends with explicit config.
pub fn session_with_config(
    mode: RepeatingMode,
    config: SessionConfig<ScriptArgs>,
) -> ReplSession<ScriptCompiler, ScriptEvaluator> {
    crate::util::logger::init_debug();
    ReplSession::new(ScriptCompiler::default(), ScriptEvaluator::new(mode), config)
}

/// Shorthand for building argument maps.
pub fn args(pairs: &[(&str, i64)]) -> ScriptArgs {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptExpr {
    Number(i64),
    Var(String),
    Add(Box<ScriptExpr>, Box<ScriptExpr>),
    Sub(Box<ScriptExpr>, Box<ScriptExpr>),
    Div(Box<ScriptExpr>, Box<ScriptExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptArtifact {
    Bind { name: String, expr: ScriptExpr },
    Expr(ScriptExpr),
    Require(PathBuf),
}

#[derive(Debug, PartialEq)]
enum Token {
    Num(i64),
    Ident(String),
    Plus,
    Minus,
    Slash,
    Eq,
    LParen,
    RParen,
}

enum ParseErr {
    /// Ran out of tokens: the fragment is not self-contained
    Eof,
    /// Hard syntax error at a column
    At(String, u32),
}

fn tokenize(code: &str) -> Result<Vec<(Token, u32)>, ParseErr> {
    let chars: Vec<char> = code.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let col = (i + 1) as u32;
        match chars[i] {
            c if c.is_whitespace() => i += 1,
            '+' => {
                tokens.push((Token::Plus, col));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, col));
                i += 1;
            }
            '/' => {
                tokens.push((Token::Slash, col));
                i += 1;
            }
            '=' => {
                tokens.push((Token::Eq, col));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LParen, col));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, col));
                i += 1;
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse()
                    .map_err(|_| ParseErr::At(format!("integer literal too large: {text}"), col))?;
                tokens.push((Token::Num(value), col));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_ascii_alphanumeric() || chars[i] == '_')
                {
                    i += 1;
                }
                tokens.push((Token::Ident(chars[start..i].iter().collect()), col));
            }
            c => return Err(ParseErr::At(format!("unexpected character '{c}'"), col)),
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [(Token, u32)],
    pos: usize,
}

impl Parser<'_> {
    fn parse_expr(&mut self) -> Result<ScriptExpr, ParseErr> {
        let mut lhs = self.parse_term()?;
        loop {
            match self.tokens.get(self.pos) {
                Some((Token::Plus, _)) => {
                    self.pos += 1;
                    let rhs = self.parse_term()?;
                    lhs = ScriptExpr::Add(Box::new(lhs), Box::new(rhs));
                }
                Some((Token::Minus, _)) => {
                    self.pos += 1;
                    let rhs = self.parse_term()?;
                    lhs = ScriptExpr::Sub(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_term(&mut self) -> Result<ScriptExpr, ParseErr> {
        let mut lhs = self.parse_atom()?;
        while let Some((Token::Slash, _)) = self.tokens.get(self.pos) {
            self.pos += 1;
            let rhs = self.parse_atom()?;
            lhs = ScriptExpr::Div(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_atom(&mut self) -> Result<ScriptExpr, ParseErr> {
        match self.tokens.get(self.pos) {
            None => Err(ParseErr::Eof),
            Some((Token::Num(n), _)) => {
                self.pos += 1;
                Ok(ScriptExpr::Number(*n))
            }
            Some((Token::Ident(name), col)) => {
                if name == "val" {
                    Err(ParseErr::At("'val' only starts a binding".into(), *col))
                } else {
                    let var = ScriptExpr::Var(name.clone());
                    self.pos += 1;
                    Ok(var)
                }
            }
            Some((Token::Minus, _)) => {
                self.pos += 1;
                let inner = self.parse_atom()?;
                Ok(ScriptExpr::Sub(
                    Box::new(ScriptExpr::Number(0)),
                    Box::new(inner),
                ))
            }
            Some((Token::LParen, _)) => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                match self.tokens.get(self.pos) {
                    None => Err(ParseErr::Eof),
                    Some((Token::RParen, _)) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    Some((_, col)) => Err(ParseErr::At("expected ')'".into(), *col)),
                }
            }
            Some((_, col)) => Err(ParseErr::At("expected an expression".into(), *col)),
        }
    }
}

fn parse_line(code: &str) -> Result<ScriptArtifact, ParseErr> {
    let trimmed = code.trim();
    if trimmed == "require" {
        return Err(ParseErr::Eof);
    }
    if let Some(path) = trimmed.strip_prefix("require ") {
        return Ok(ScriptArtifact::Require(PathBuf::from(path.trim())));
    }

    let tokens = tokenize(trimmed)?;
    if tokens.is_empty() {
        return Err(ParseErr::At("empty input".into(), 1));
    }

    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
    };
    let artifact = if matches!(&tokens[0], (Token::Ident(s), _) if s == "val") {
        let name = match tokens.get(1) {
            None => return Err(ParseErr::Eof),
            Some((Token::Ident(name), _)) => name.clone(),
            Some((_, col)) => {
                return Err(ParseErr::At("expected identifier after 'val'".into(), *col))
            }
        };
        match tokens.get(2) {
            None => return Err(ParseErr::Eof),
            Some((Token::Eq, _)) => {}
            Some((_, col)) => return Err(ParseErr::At("expected '='".into(), *col)),
        }
        parser.pos = 3;
        let expr = parser.parse_expr()?;
        ScriptArtifact::Bind { name, expr }
    } else {
        ScriptArtifact::Expr(parser.parse_expr()?)
    };

    match parser.tokens.get(parser.pos) {
        None => Ok(artifact),
        Some((_, col)) => Err(ParseErr::At("unexpected trailing input".into(), *col)),
    }
}

fn eval_expr(
    expr: &ScriptExpr,
    env: &HashMap<String, i64>,
    args: &ScriptArgs,
) -> Result<i64, String> {
    match expr {
        ScriptExpr::Number(n) => Ok(*n),
        ScriptExpr::Var(name) => env
            .get(name)
            .or_else(|| args.get(name))
            .copied()
            .ok_or_else(|| format!("undefined variable: {name}")),
        ScriptExpr::Add(a, b) => Ok(eval_expr(a, env, args)? + eval_expr(b, env, args)?),
        ScriptExpr::Sub(a, b) => Ok(eval_expr(a, env, args)? - eval_expr(b, env, args)?),
        ScriptExpr::Div(a, b) => {
            let denominator = eval_expr(b, env, args)?;
            if denominator == 0 {
                Err("division by zero".to_string())
            } else {
                Ok(eval_expr(a, env, args)? / denominator)
            }
        }
    }
}

/// Compile stage over the script language.
#[derive(Debug, Default)]
pub struct ScriptCompiler {
    history: LineHistory,
}

impl ReplCompiler for ScriptCompiler {
    type Artifact = ScriptArtifact;

    fn check(
        &mut self,
        line: &CodeLine,
    ) -> CheckResponse {
        match parse_line(&line.code) {
            Ok(_) => CheckResponse::Ok,
            Err(ParseErr::Eof) => CheckResponse::Incomplete,
            Err(ParseErr::At(message, column)) => CheckResponse::Error {
                message,
                location: SourceLocation::new(1, column),
            },
        }
    }

    fn compile(
        &mut self,
        line: &CodeLine,
    ) -> CompileResponse<ScriptArtifact> {
        if let Some(last) = self.history.last() {
            if line.number <= last.number {
                return CompileResponse::HistoryMismatch {
                    line_number: line.number,
                    compiled_history: self.history.snapshot(),
                };
            }
        }
        match parse_line(&line.code) {
            Ok(artifact) => {
                let classpath_addendum = match &artifact {
                    ScriptArtifact::Require(path) => vec![path.clone()],
                    _ => Vec::new(),
                };
                self.history.append(line.clone());
                CompileResponse::Compiled(CompiledUnit {
                    code_line: line.clone(),
                    artifact,
                    classpath_addendum,
                })
            }
            Err(ParseErr::Eof) => CompileResponse::Incomplete,
            Err(ParseErr::At(message, column)) => CompileResponse::Error {
                message,
                location: SourceLocation::new(1, column),
                compiled_history: self.history.snapshot(),
            },
        }
    }

    fn reset_to_line(
        &mut self,
        line_number: u64,
    ) -> Vec<CodeLine> {
        self.history.reset_to_line(line_number)
    }

    fn compilation_history(&self) -> Vec<CodeLine> {
        self.history.snapshot()
    }
}

/// Evaluation stage over the script language.
#[derive(Debug, Default)]
pub struct ScriptEvaluator {
    mode: RepeatingMode,
    history: LineHistory,
    env: HashMap<String, i64>,
    /// When set, corrupts the first line removed by a reset; used to drive
    /// the desync path in tests.
    pub tampered_reset_code: Option<String>,
}

impl ScriptEvaluator {
    pub fn new(mode: RepeatingMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

impl ReplEvaluator for ScriptEvaluator {
    type Artifact = ScriptArtifact;
    type Value = i64;
    type Args = ScriptArgs;

    fn eval(
        &mut self,
        unit: &CompiledUnit<ScriptArtifact>,
        args: Option<&ScriptArgs>,
    ) -> EvalResponse<i64> {
        let decision = self.mode.admits(&self.history, &unit.code_line);
        if decision == ReplayDecision::Mismatch {
            return EvalResponse::HistoryMismatch {
                line_number: unit.code_line.number,
                completed_history: self.history.snapshot(),
            };
        }

        let empty = ScriptArgs::new();
        let args = args.unwrap_or(&empty);
        let outcome = match &unit.artifact {
            ScriptArtifact::Bind { name, expr } => {
                eval_expr(expr, &self.env, args).map(|value| {
                    self.env.insert(name.clone(), value);
                    None
                })
            }
            ScriptArtifact::Expr(expr) => eval_expr(expr, &self.env, args).map(Some),
            ScriptArtifact::Require(_) => Ok(None),
        };

        match outcome {
            Ok(value) => {
                if decision == ReplayDecision::Advance {
                    self.history.append(unit.code_line.clone());
                }
                match value {
                    Some(value) => EvalResponse::Value {
                        value,
                        completed_history: self.history.snapshot(),
                    },
                    None => EvalResponse::UnitValue {
                        completed_history: self.history.snapshot(),
                    },
                }
            }
            Err(message) => EvalResponse::RuntimeError {
                message,
                completed_history: self.history.snapshot(),
            },
        }
    }

    fn reset_to_line(
        &mut self,
        line_number: u64,
    ) -> Vec<CodeLine> {
        let mut removed = self.history.reset_to_line(line_number);
        if let Some(code) = &self.tampered_reset_code {
            if let Some(first) = removed.first_mut() {
                first.code = code.clone();
            }
        }
        removed
    }

    fn evaluation_history(&self) -> Vec<CodeLine> {
        self.history.snapshot()
    }
}
