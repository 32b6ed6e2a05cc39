//! Parser for a subset of IEC 61131-7 Fuzzy Control Language.
//!
//! # Supported grammar
//!
//! ```text
//! FUNCTION_BLOCK name
//!   VAR_INPUT  ttl : REAL; ... END_VAR
//!   VAR_OUTPUT decision : REAL; END_VAR
//!   FUZZIFY ttl
//!     TERM low  := (0, 1) (0.4, 0);
//!     TERM high := trape 0.3 0.6 1 1;
//!     RANGE := (0 .. 1);
//!   END_FUZZIFY
//!   DEFUZZIFY decision
//!     TERM hold := trian 0 0.25 0.5;
//!     METHOD : COG;            (* or MM *)
//!     DEFAULT := 0.5;
//!   END_DEFUZZIFY
//!   RULEBLOCK rules
//!     AND : MIN;  OR : MAX;  ACT : MIN;  ACCU : MAX;
//!     RULE 1 : IF ttl IS low AND NOT (peer IS high) THEN decision IS hold WITH 0.8;
//!   END_RULEBLOCK
//! END_FUNCTION_BLOCK
//! ```
//!
//! Keywords are case-insensitive; variable and term names are not.
//! Comments are `// …` to end of line and `(* … *)`.
//!
//! Parsing happens in two passes: the token stream is read into a raw tree
//! that still refers to variables and terms by name, then names are resolved
//! to indices.  References may therefore appear before their declarations.

use std::str::FromStr;

use crate::FclError;

// ── Resolved model ────────────────────────────────────────────────────────────

/// A membership function over a real universe.
#[derive(Clone, Debug, PartialEq)]
pub enum Membership {
    /// Piecewise-linear through points sorted by `x`; flat outside.
    Points(Vec<(f64, f64)>),
    Triangle(f64, f64, f64),
    Trapezoid(f64, f64, f64, f64),
}

impl Membership {
    /// Degree of membership of `x`, in `[0, 1]`.
    pub fn degree(&self, x: f64) -> f64 {
        match *self {
            Membership::Points(ref pts) => piecewise(pts, x),
            Membership::Triangle(a, b, c) => trapezoid(a, b, b, c, x),
            Membership::Trapezoid(a, b, c, d) => trapezoid(a, b, c, d, x),
        }
    }

    /// Smallest and largest `x` the function is defined by.
    pub fn support(&self) -> (f64, f64) {
        match *self {
            Membership::Points(ref pts) => {
                let lo = pts.first().map_or(0.0, |p| p.0);
                let hi = pts.last().map_or(0.0, |p| p.0);
                (lo, hi)
            }
            Membership::Triangle(a, _, c) => (a, c),
            Membership::Trapezoid(a, _, _, d) => (a, d),
        }
    }
}

fn piecewise(pts: &[(f64, f64)], x: f64) -> f64 {
    let (Some(first), Some(last)) = (pts.first(), pts.last()) else {
        return 0.0;
    };
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    let i = pts.partition_point(|p| p.0 <= x);
    let (x0, y0) = pts[i - 1];
    let (x1, y1) = pts[i];
    if x1 <= x0 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

fn trapezoid(a: f64, b: f64, c: f64, d: f64, x: f64) -> f64 {
    if x < a || x > d {
        0.0
    } else if x < b {
        (x - a) / (b - a)
    } else if x <= c {
        1.0
    } else {
        (d - x) / (d - c)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Term {
    pub name:  String,
    pub shape: Membership,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FuzzyVariable {
    pub name:  String,
    /// Inputs are clamped to this range; outputs are defuzzified over it.
    pub range: (f64, f64),
    pub terms: Vec<Term>,
}

impl FuzzyVariable {
    pub fn term_index(&self, name: &str) -> Option<usize> {
        self.terms.iter().position(|t| t.name == name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Defuzzifier {
    /// Centre of gravity.
    Cog,
    /// Mean of maximum.
    Mm,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OutputVariable {
    pub var:     FuzzyVariable,
    pub method:  Defuzzifier,
    /// Value reported when no rule fires for this output.
    pub default: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AndMethod { Min, Prod }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OrMethod { Max, Asum }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActMethod { Min, Prod }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccuMethod { Max }

/// A rule antecedent over input variable / term indices.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Is { var: usize, term: usize },
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Rule {
    pub label:       String,
    pub condition:   Condition,
    /// `(output index, term index)` pairs.
    pub conclusions: Vec<(usize, usize)>,
    pub weight:      f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RuleBlock {
    pub name:  String,
    pub and:   AndMethod,
    pub or:    OrMethod,
    pub act:   ActMethod,
    pub accu:  AccuMethod,
    pub rules: Vec<Rule>,
}

/// A fully parsed and cross-checked rule base.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleBase {
    pub name:    String,
    pub inputs:  Vec<FuzzyVariable>,
    pub outputs: Vec<OutputVariable>,
    pub blocks:  Vec<RuleBlock>,
}

impl RuleBase {
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|v| v.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|v| v.var.name == name)
    }

    pub fn rule_count(&self) -> usize {
        self.blocks.iter().map(|b| b.rules.len()).sum()
    }
}

impl FromStr for RuleBase {
    type Err = FclError;

    fn from_str(src: &str) -> Result<Self, FclError> {
        parse_fcl(src)
    }
}

/// Parse FCL source text.
pub fn parse_fcl(src: &str) -> Result<RuleBase, FclError> {
    let tokens = lex(src)?;
    let raw = Parser { tokens, pos: 0 }.function_block()?;
    raw.resolve()
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Ident(String),
    Num(f64),
    Assign,
    Colon,
    Semi,
    LParen,
    RParen,
    Comma,
    DotDot,
}

#[derive(Clone, Debug)]
struct Token {
    tok:  Tok,
    line: usize,
}

fn lex(src: &str) -> Result<Vec<Token>, FclError> {
    let chars: Vec<char> = src.chars().collect();
    let n = chars.len();
    let at = |i: usize| chars.get(i).copied();
    let mut out  = Vec::new();
    let mut i    = 0;
    let mut line = 1;

    while i < n {
        let c = chars[i];
        let simple = match c {
            '(' if at(i + 1) != Some('*') => Some(Tok::LParen),
            ')' => Some(Tok::RParen),
            ';' => Some(Tok::Semi),
            ',' => Some(Tok::Comma),
            _ => None,
        };
        if let Some(tok) = simple {
            out.push(Token { tok, line });
            i += 1;
            continue;
        }
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '/' if at(i + 1) == Some('/') => {
                while i < n && chars[i] != '\n' {
                    i += 1;
                }
            }
            '(' => {
                // `(*` block comment
                let start = line;
                i += 2;
                loop {
                    if i + 1 >= n {
                        return Err(FclError::new(start, "unterminated comment"));
                    }
                    if chars[i] == '*' && chars[i + 1] == ')' {
                        i += 2;
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    i += 1;
                }
            }
            ':' if at(i + 1) == Some('=') => {
                out.push(Token { tok: Tok::Assign, line });
                i += 2;
            }
            ':' => {
                out.push(Token { tok: Tok::Colon, line });
                i += 1;
            }
            '.' if at(i + 1) == Some('.') => {
                out.push(Token { tok: Tok::DotDot, line });
                i += 2;
            }
            c if c.is_ascii_digit()
                || ((c == '-' || c == '+' || c == '.') && at(i + 1).is_some_and(|d| d.is_ascii_digit())) =>
            {
                let start = i;
                i += 1;
                while i < n && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if at(i) == Some('.') && at(i + 1).is_some_and(|d| d.is_ascii_digit()) {
                    i += 1;
                    while i < n && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                if matches!(at(i), Some('e' | 'E')) {
                    let mut j = i + 1;
                    if matches!(at(j), Some('+' | '-')) {
                        j += 1;
                    }
                    if at(j).is_some_and(|d| d.is_ascii_digit()) {
                        i = j;
                        while i < n && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let v = text
                    .parse::<f64>()
                    .map_err(|_| FclError::new(line, format!("invalid number {text:?}")))?;
                out.push(Token { tok: Tok::Num(v), line });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < n && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                out.push(Token { tok: Tok::Ident(chars[start..i].iter().collect()), line });
            }
            other => return Err(FclError::new(line, format!("unexpected character {other:?}"))),
        }
    }
    Ok(out)
}

// ── Raw tree ──────────────────────────────────────────────────────────────────

const KEYWORDS: &[&str] = &[
    "FUNCTION_BLOCK", "END_FUNCTION_BLOCK", "VAR_INPUT", "VAR_OUTPUT", "END_VAR", "FUZZIFY",
    "END_FUZZIFY", "DEFUZZIFY", "END_DEFUZZIFY", "RULEBLOCK", "END_RULEBLOCK", "TERM", "RANGE",
    "METHOD", "DEFAULT", "RULE", "IF", "THEN", "IS", "NOT", "AND", "OR", "WITH", "ACT", "ACCU",
];

fn is_keyword(s: &str) -> bool {
    KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(s))
}

struct RawTerm {
    name:  String,
    shape: Membership,
    line:  usize,
}

#[derive(Default)]
struct RawFuzzify {
    terms: Vec<RawTerm>,
    range: Option<(f64, f64)>,
    line:  usize,
}

#[derive(Default)]
struct RawDefuzzify {
    terms:   Vec<RawTerm>,
    range:   Option<(f64, f64)>,
    method:  Option<Defuzzifier>,
    default: Option<f64>,
    line:    usize,
}

enum RawCond {
    Is { var: String, term: String, negated: bool, line: usize },
    Not(Box<RawCond>),
    And(Box<RawCond>, Box<RawCond>),
    Or(Box<RawCond>, Box<RawCond>),
}

struct RawRule {
    label:       String,
    condition:   RawCond,
    conclusions: Vec<(String, String, usize)>,
    weight:      f64,
    line:        usize,
}

struct RawBlock {
    name:  String,
    and:   AndMethod,
    or:    OrMethod,
    act:   ActMethod,
    accu:  AccuMethod,
    rules: Vec<RawRule>,
}

#[derive(Default)]
struct RawFunctionBlock {
    name:       String,
    inputs:     Vec<(String, usize)>,
    outputs:    Vec<(String, usize)>,
    fuzzify:    Vec<(String, RawFuzzify)>,
    defuzzify:  Vec<(String, RawDefuzzify)>,
    blocks:     Vec<RawBlock>,
    end_line:   usize,
}

// ── Parser ────────────────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<Token>,
    pos:    usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn err<T>(&self, msg: impl Into<String>) -> Result<T, FclError> {
        Err(FclError::new(self.line(), msg))
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).map(|t| t.tok.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn peek_kw(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(s)) if s.eq_ignore_ascii_case(kw))
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        if self.peek_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, kw: &str) -> Result<(), FclError> {
        if self.eat_kw(kw) { Ok(()) } else { self.err(format!("expected {kw}")) }
    }

    fn expect(&mut self, want: Tok, what: &str) -> Result<(), FclError> {
        if self.peek() == Some(&want) {
            self.pos += 1;
            Ok(())
        } else {
            self.err(format!("expected {what}"))
        }
    }

    /// A user-chosen name (not a keyword).
    fn name(&mut self, what: &str) -> Result<String, FclError> {
        match self.peek() {
            Some(Tok::Ident(s)) if !is_keyword(s) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => self.err(format!("expected {what}")),
        }
    }

    /// Any identifier, keyword or not, upper-cased (for option values).
    fn word(&mut self, what: &str) -> Result<String, FclError> {
        match self.peek() {
            Some(Tok::Ident(s)) => {
                let s = s.to_ascii_uppercase();
                self.pos += 1;
                Ok(s)
            }
            _ => self.err(format!("expected {what}")),
        }
    }

    fn number(&mut self) -> Result<f64, FclError> {
        match self.peek() {
            Some(Tok::Num(v)) => {
                let v = *v;
                self.pos += 1;
                Ok(v)
            }
            _ => self.err("expected number"),
        }
    }

    fn function_block(mut self) -> Result<RawFunctionBlock, FclError> {
        self.expect_kw("FUNCTION_BLOCK")?;
        let mut fb = RawFunctionBlock::default();
        if let Some(Tok::Ident(s)) = self.peek() {
            if !is_keyword(s) {
                fb.name = s.clone();
                self.pos += 1;
            }
        }
        loop {
            if self.peek().is_none() {
                return self.err("missing END_FUNCTION_BLOCK");
            }
            if self.eat_kw("END_FUNCTION_BLOCK") {
                fb.end_line = self.line();
                break;
            } else if self.eat_kw("VAR_INPUT") {
                fb.inputs.extend(self.var_decls()?);
            } else if self.eat_kw("VAR_OUTPUT") {
                fb.outputs.extend(self.var_decls()?);
            } else if self.eat_kw("FUZZIFY") {
                fb.fuzzify.push(self.fuzzify()?);
            } else if self.eat_kw("DEFUZZIFY") {
                fb.defuzzify.push(self.defuzzify()?);
            } else if self.eat_kw("RULEBLOCK") {
                fb.blocks.push(self.rule_block()?);
            } else {
                return self.err("expected VAR_INPUT, VAR_OUTPUT, FUZZIFY, DEFUZZIFY or RULEBLOCK");
            }
        }
        if self.peek().is_some() {
            return self.err("unexpected input after END_FUNCTION_BLOCK");
        }
        Ok(fb)
    }

    fn var_decls(&mut self) -> Result<Vec<(String, usize)>, FclError> {
        let mut out = Vec::new();
        while !self.eat_kw("END_VAR") {
            let line = self.line();
            let name = self.name("variable name or END_VAR")?;
            self.expect(Tok::Colon, "':'")?;
            let ty = self.word("type")?;
            if ty != "REAL" {
                return Err(FclError::new(line, format!("unsupported type {ty} (only REAL)")));
            }
            self.expect(Tok::Semi, "';'")?;
            out.push((name, line));
        }
        Ok(out)
    }

    fn term(&mut self) -> Result<RawTerm, FclError> {
        let line = self.line();
        let name = self.name("term name")?;
        self.expect(Tok::Assign, "':='")?;
        let shape = if self.eat_kw("trian") {
            let (a, b, c) = (self.number()?, self.number()?, self.number()?);
            if !(a <= b && b <= c) {
                return Err(FclError::new(line, "trian needs a <= b <= c"));
            }
            Membership::Triangle(a, b, c)
        } else if self.eat_kw("trape") {
            let (a, b, c, d) = (self.number()?, self.number()?, self.number()?, self.number()?);
            if !(a <= b && b <= c && c <= d) {
                return Err(FclError::new(line, "trape needs a <= b <= c <= d"));
            }
            Membership::Trapezoid(a, b, c, d)
        } else if self.peek() == Some(&Tok::LParen) {
            let mut pts = Vec::new();
            while self.peek() == Some(&Tok::LParen) {
                self.pos += 1;
                let x = self.number()?;
                self.expect(Tok::Comma, "','")?;
                let y = self.number()?;
                self.expect(Tok::RParen, "')'")?;
                if !(0.0..=1.0).contains(&y) {
                    return Err(FclError::new(line, format!("membership degree {y} outside [0, 1]")));
                }
                pts.push((x, y));
            }
            if pts.windows(2).any(|w| w[1].0 < w[0].0) {
                return Err(FclError::new(line, "points must be in ascending x order"));
            }
            Membership::Points(pts)
        } else {
            return self.err("expected point list, trian or trape");
        };
        self.expect(Tok::Semi, "';'")?;
        Ok(RawTerm { name, shape, line })
    }

    fn range(&mut self) -> Result<(f64, f64), FclError> {
        let line = self.line();
        self.expect(Tok::Assign, "':='")?;
        self.expect(Tok::LParen, "'('")?;
        let lo = self.number()?;
        self.expect(Tok::DotDot, "'..'")?;
        let hi = self.number()?;
        self.expect(Tok::RParen, "')'")?;
        self.expect(Tok::Semi, "';'")?;
        if !(lo < hi) {
            return Err(FclError::new(line, format!("empty range ({lo} .. {hi})")));
        }
        Ok((lo, hi))
    }

    fn fuzzify(&mut self) -> Result<(String, RawFuzzify), FclError> {
        let line = self.line();
        let name = self.name("variable name")?;
        let mut f = RawFuzzify { line, ..Default::default() };
        while !self.eat_kw("END_FUZZIFY") {
            if self.eat_kw("TERM") {
                f.terms.push(self.term()?);
            } else if self.eat_kw("RANGE") {
                f.range = Some(self.range()?);
            } else {
                return self.err("expected TERM, RANGE or END_FUZZIFY");
            }
        }
        Ok((name, f))
    }

    fn defuzzify(&mut self) -> Result<(String, RawDefuzzify), FclError> {
        let line = self.line();
        let name = self.name("variable name")?;
        let mut d = RawDefuzzify { line, ..Default::default() };
        while !self.eat_kw("END_DEFUZZIFY") {
            if self.eat_kw("TERM") {
                d.terms.push(self.term()?);
            } else if self.eat_kw("RANGE") {
                d.range = Some(self.range()?);
            } else if self.eat_kw("METHOD") {
                self.expect(Tok::Colon, "':'")?;
                d.method = Some(match self.word("defuzzification method")?.as_str() {
                    "COG" => Defuzzifier::Cog,
                    "MM"  => Defuzzifier::Mm,
                    other => return self.err(format!("unsupported METHOD {other} (COG or MM)")),
                });
                self.expect(Tok::Semi, "';'")?;
            } else if self.eat_kw("DEFAULT") {
                self.expect(Tok::Assign, "':='")?;
                d.default = Some(self.number()?);
                self.expect(Tok::Semi, "';'")?;
            } else if self.eat_kw("ACCU") {
                self.expect(Tok::Colon, "':'")?;
                if self.word("accumulation method")? != "MAX" {
                    return self.err("unsupported ACCU (MAX only)");
                }
                self.expect(Tok::Semi, "';'")?;
            } else {
                return self.err("expected TERM, RANGE, METHOD, DEFAULT, ACCU or END_DEFUZZIFY");
            }
        }
        Ok((name, d))
    }

    fn rule_block(&mut self) -> Result<RawBlock, FclError> {
        let name = self.name("rule block name")?;
        let mut b = RawBlock {
            name,
            and:   AndMethod::Min,
            or:    OrMethod::Max,
            act:   ActMethod::Min,
            accu:  AccuMethod::Max,
            rules: Vec::new(),
        };
        while !self.eat_kw("END_RULEBLOCK") {
            if self.eat_kw("AND") {
                self.expect(Tok::Colon, "':'")?;
                b.and = match self.word("AND method")?.as_str() {
                    "MIN"  => AndMethod::Min,
                    "PROD" => AndMethod::Prod,
                    other  => return self.err(format!("unsupported AND method {other}")),
                };
            } else if self.eat_kw("OR") {
                self.expect(Tok::Colon, "':'")?;
                b.or = match self.word("OR method")?.as_str() {
                    "MAX"  => OrMethod::Max,
                    "ASUM" => OrMethod::Asum,
                    other  => return self.err(format!("unsupported OR method {other}")),
                };
            } else if self.eat_kw("ACT") {
                self.expect(Tok::Colon, "':'")?;
                b.act = match self.word("ACT method")?.as_str() {
                    "MIN"  => ActMethod::Min,
                    "PROD" => ActMethod::Prod,
                    other  => return self.err(format!("unsupported ACT method {other}")),
                };
            } else if self.eat_kw("ACCU") {
                self.expect(Tok::Colon, "':'")?;
                if self.word("ACCU method")? != "MAX" {
                    return self.err("unsupported ACCU method (MAX only)");
                }
                b.accu = AccuMethod::Max;
            } else if self.eat_kw("RULE") {
                b.rules.push(self.rule()?);
                continue;
            } else {
                return self.err("expected AND, OR, ACT, ACCU, RULE or END_RULEBLOCK");
            }
            self.expect(Tok::Semi, "';'")?;
        }
        Ok(b)
    }

    fn rule(&mut self) -> Result<RawRule, FclError> {
        let line = self.line();
        let label = match self.next() {
            Some(Tok::Num(v)) => v.to_string(),
            Some(Tok::Ident(s)) => s,
            _ => return Err(FclError::new(line, "expected rule label")),
        };
        self.expect(Tok::Colon, "':'")?;
        self.expect_kw("IF")?;
        let condition = self.or_expr()?;
        self.expect_kw("THEN")?;
        let mut conclusions = Vec::new();
        loop {
            let cl  = self.line();
            let var = self.name("output variable")?;
            self.expect_kw("IS")?;
            let term = self.name("term")?;
            conclusions.push((var, term, cl));
            if self.peek() == Some(&Tok::Comma) {
                self.pos += 1;
            } else if !self.eat_kw("AND") {
                break;
            }
        }
        let weight = if self.eat_kw("WITH") {
            let w = self.number()?;
            if !(0.0..=1.0).contains(&w) {
                return Err(FclError::new(line, format!("rule weight {w} outside [0, 1]")));
            }
            w
        } else {
            1.0
        };
        self.expect(Tok::Semi, "';'")?;
        Ok(RawRule { label, condition, conclusions, weight, line })
    }

    fn or_expr(&mut self) -> Result<RawCond, FclError> {
        let mut lhs = self.and_expr()?;
        while self.eat_kw("OR") {
            let rhs = self.and_expr()?;
            lhs = RawCond::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<RawCond, FclError> {
        let mut lhs = self.atom()?;
        while self.eat_kw("AND") {
            let rhs = self.atom()?;
            lhs = RawCond::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn atom(&mut self) -> Result<RawCond, FclError> {
        if self.eat_kw("NOT") {
            return Ok(RawCond::Not(Box::new(self.atom()?)));
        }
        if self.peek() == Some(&Tok::LParen) {
            self.pos += 1;
            let inner = self.or_expr()?;
            self.expect(Tok::RParen, "')'")?;
            return Ok(inner);
        }
        let line = self.line();
        let var = self.name("input variable")?;
        self.expect_kw("IS")?;
        let negated = self.eat_kw("NOT");
        let term = self.name("term")?;
        Ok(RawCond::Is { var, term, negated, line })
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

fn resolve_terms(raw: Vec<RawTerm>) -> Result<Vec<Term>, FclError> {
    let mut out: Vec<Term> = Vec::with_capacity(raw.len());
    for t in raw {
        if out.iter().any(|o| o.name == t.name) {
            return Err(FclError::new(t.line, format!("duplicate term {:?}", t.name)));
        }
        out.push(Term { name: t.name, shape: t.shape });
    }
    Ok(out)
}

fn universe(terms: &[Term]) -> (f64, f64) {
    terms.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
        let (a, b) = t.shape.support();
        (lo.min(a), hi.max(b))
    })
}

impl RawFunctionBlock {
    fn resolve(self) -> Result<RuleBase, FclError> {
        let RawFunctionBlock { name, inputs, outputs, mut fuzzify, mut defuzzify, blocks, end_line } = self;

        for (v, f) in &fuzzify {
            if !inputs.iter().any(|(n, _)| n == v) {
                return Err(FclError::new(f.line, format!("FUZZIFY of undeclared input {v:?}")));
            }
        }
        for (v, d) in &defuzzify {
            if !outputs.iter().any(|(n, _)| n == v) {
                return Err(FclError::new(d.line, format!("DEFUZZIFY of undeclared output {v:?}")));
            }
        }

        let mut in_vars = Vec::with_capacity(inputs.len());
        for (v, line) in &inputs {
            let pos = fuzzify
                .iter()
                .position(|(n, _)| n == v)
                .ok_or_else(|| FclError::new(*line, format!("input {v:?} has no FUZZIFY block")))?;
            let (_, f) = fuzzify.swap_remove(pos);
            if f.terms.is_empty() {
                return Err(FclError::new(f.line, format!("input {v:?} has no terms")));
            }
            let terms = resolve_terms(f.terms)?;
            let range = f.range.unwrap_or_else(|| universe(&terms));
            in_vars.push(FuzzyVariable { name: v.clone(), range, terms });
        }
        if let Some((v, f)) = fuzzify.first() {
            return Err(FclError::new(f.line, format!("duplicate FUZZIFY block for {v:?}")));
        }

        let mut out_vars = Vec::with_capacity(outputs.len());
        for (v, line) in &outputs {
            let pos = defuzzify
                .iter()
                .position(|(n, _)| n == v)
                .ok_or_else(|| FclError::new(*line, format!("output {v:?} has no DEFUZZIFY block")))?;
            let (_, d) = defuzzify.swap_remove(pos);
            if d.terms.is_empty() {
                return Err(FclError::new(d.line, format!("output {v:?} has no terms")));
            }
            let terms = resolve_terms(d.terms)?;
            let range = d.range.unwrap_or_else(|| universe(&terms));
            if !(range.0 < range.1) {
                return Err(FclError::new(d.line, format!("output {v:?} has an empty universe")));
            }
            out_vars.push(OutputVariable {
                var:     FuzzyVariable { name: v.clone(), range, terms },
                method:  d.method.unwrap_or(Defuzzifier::Cog),
                default: d.default,
            });
        }
        if let Some((v, d)) = defuzzify.first() {
            return Err(FclError::new(d.line, format!("duplicate DEFUZZIFY block for {v:?}")));
        }

        let mut rule_blocks = Vec::with_capacity(blocks.len());
        for b in blocks {
            let mut rules = Vec::with_capacity(b.rules.len());
            for r in b.rules {
                let condition = resolve_cond(r.condition, &in_vars)?;
                let conclusions = r
                    .conclusions
                    .into_iter()
                    .map(|(var, term, line)| {
                        let o = out_vars
                            .iter()
                            .position(|ov| ov.var.name == var)
                            .ok_or_else(|| FclError::new(line, format!("unknown output variable {var:?}")))?;
                        let t = out_vars[o]
                            .var
                            .term_index(&term)
                            .ok_or_else(|| FclError::new(line, format!("unknown term {term:?} of {var:?}")))?;
                        Ok::<_, FclError>((o, t))
                    })
                    .collect::<Result<Vec<_>, FclError>>()?;
                if conclusions.is_empty() {
                    return Err(FclError::new(r.line, "rule has no conclusion"));
                }
                rules.push(Rule { label: r.label, condition, conclusions, weight: r.weight });
            }
            rule_blocks.push(RuleBlock { name: b.name, and: b.and, or: b.or, act: b.act, accu: b.accu, rules });
        }

        if in_vars.is_empty() || out_vars.is_empty() {
            return Err(FclError::new(end_line, "rule base needs at least one input and one output"));
        }
        if rule_blocks.iter().all(|b| b.rules.is_empty()) {
            return Err(FclError::new(end_line, "rule base has no rules"));
        }

        Ok(RuleBase { name, inputs: in_vars, outputs: out_vars, blocks: rule_blocks })
    }
}

fn resolve_cond(raw: RawCond, inputs: &[FuzzyVariable]) -> Result<Condition, FclError> {
    Ok(match raw {
        RawCond::Is { var, term, negated, line } => {
            let v = inputs
                .iter()
                .position(|iv| iv.name == var)
                .ok_or_else(|| FclError::new(line, format!("unknown input variable {var:?}")))?;
            let t = inputs[v]
                .term_index(&term)
                .ok_or_else(|| FclError::new(line, format!("unknown term {term:?} of {var:?}")))?;
            let is = Condition::Is { var: v, term: t };
            if negated { Condition::Not(Box::new(is)) } else { is }
        }
        RawCond::Not(c)    => Condition::Not(Box::new(resolve_cond(*c, inputs)?)),
        RawCond::And(a, b) => Condition::And(Box::new(resolve_cond(*a, inputs)?), Box::new(resolve_cond(*b, inputs)?)),
        RawCond::Or(a, b)  => Condition::Or(Box::new(resolve_cond(*a, inputs)?), Box::new(resolve_cond(*b, inputs)?)),
    })
}
