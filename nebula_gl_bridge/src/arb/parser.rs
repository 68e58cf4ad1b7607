//! Statement-by-statement translation of assembly programs
//!
//! Consumes the token stream from the scanner and emits equivalent
//! shading-language statements. Registers map to declared variables,
//! swizzles and write masks to component selection, and each instruction to
//! one assignment (or a `discard` guard for the kill instruction).
//!
//! The emitted source is legacy-style GLSL built on the `gl_*` builtins; the
//! dialect converter downstream renames those to synthesized inputs and
//! computes the requirement vector, so this module stays focused on the
//! instruction semantics.

use rustc_hash::FxHashMap;

use crate::arb::converter::AsmError;
use crate::arb::scanner::{Scanner, Token, TokenKind};

/// Result of a successful parse
#[derive(Debug)]
pub(crate) struct ParsedProgram {
    pub glsl: String,
    pub depth_replacing: bool,
    pub fog_frag_coord: bool,
}

/// What a declared name stands for
enum Binding {
    /// Temporary register (`TEMP`)
    Temp,
    /// Address register (`ADDRESS`)
    Address,
    /// Anything that resolves directly to a vec4-valued expression
    Expr(String),
    /// Write-only output (`OUTPUT`); `scalar` names the component written
    /// for scalar outputs such as the fog coordinate
    Output { expr: String, scalar: Option<char> },
    /// `PARAM name[4] = { state.matrix.X };` row binding
    MatrixRows { glsl: &'static str, transposed: bool },
    /// `PARAM name[n] = { program.local[a..b] };` range binding
    ParamRange { env: bool, base: i64, len: i64 },
    /// `PARAM name[n] = { {..}, {..} };` constant array
    ConstArray,
}

/// A parsed source operand: base expression, optional swizzle, sign
struct SrcOperand {
    base: String,
    swizzle: Option<String>,
    negate: bool,
}

impl SrcOperand {
    /// The operand as a vec4-valued expression (single-component swizzles
    /// broadcast, as the assembly dialect specifies)
    fn vec4(&self) -> Result<String, String> {
        let expr = match &self.swizzle {
            None => self.base.clone(),
            Some(s) => {
                let expanded = match s.len() {
                    1 => s.repeat(4),
                    4 => s.clone(),
                    _ => return Err(format!("invalid swizzle '.{}'", s)),
                };
                format!("{}.{}", paren(&self.base), expanded)
            }
        };
        if self.negate {
            Ok(format!("-{}", paren(&expr)))
        } else {
            Ok(expr)
        }
    }

    /// The operand as a scalar expression (first swizzle component, or x)
    fn scalar(&self) -> String {
        let comp = self
            .swizzle
            .as_ref()
            .and_then(|s| s.chars().next())
            .unwrap_or('x');
        let expr = format!("{}.{}", paren(&self.base), comp);
        if self.negate {
            format!("-{}", expr)
        } else {
            expr
        }
    }
}

/// A parsed destination
struct Dest {
    expr: String,
    mask: Option<String>,
    /// Scalar outputs assign a single component of the value
    scalar: Option<char>,
    is_address: bool,
}

/// Wrap an expression in parentheses unless it is a plain name or
/// indexed name
fn paren(expr: &str) -> String {
    let simple = expr
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'[' || b == b']');
    if simple {
        expr.to_string()
    } else {
        format!("({})", expr)
    }
}

/// Format an assembly numeric literal as a GLSL float literal
fn float_literal(text: &str) -> String {
    if text.contains('.') || text.contains('e') || text.contains('E') {
        text.to_string()
    } else {
        format!("{}.0", text)
    }
}

/// A bracketed index: literal value when constant, otherwise a relative
/// address expression
struct IndexExpr {
    text: String,
    literal: Option<i64>,
}

enum Comp {
    Name(String),
    Idx(IndexExpr),
}

const SAMPLER_2D: &str = "sampler2D";
const SAMPLER_3D: &str = "sampler3D";
const SAMPLER_CUBE: &str = "samplerCube";

pub(crate) struct ArbParser<'a> {
    scanner: Scanner<'a>,
    tok: Token<'a>,
    is_vertex: bool,
    bindings: FxHashMap<String, Binding>,
    temps: Vec<String>,
    addresses: Vec<String>,
    /// Global declarations emitted before main (consts, arrays)
    globals: Vec<String>,
    /// Statements prepended to main (constant-array initialization)
    preamble: Vec<String>,
    body: Vec<String>,
    samplers: [Option<&'static str>; 8],
    max_local: i64,
    max_env: i64,
    position_invariant: bool,
    depth_replacing: bool,
    fog_frag_coord: bool,
}

impl<'a> ArbParser<'a> {
    pub(crate) fn new(source: &'a str, is_vertex: bool) -> Result<Self, AsmError> {
        let mut scanner = Scanner::new(source);
        let tok = scanner
            .next()
            .map_err(|e| AsmError::new("invalid token", e.offset))?;
        Ok(Self {
            scanner,
            tok,
            is_vertex,
            bindings: FxHashMap::default(),
            temps: Vec::new(),
            addresses: Vec::new(),
            globals: Vec::new(),
            preamble: Vec::new(),
            body: Vec::new(),
            samplers: [None; 8],
            max_local: -1,
            max_env: -1,
            position_invariant: false,
            depth_replacing: false,
            fog_frag_coord: false,
        })
    }

    // ===== token plumbing =====

    fn bump(&mut self) -> Result<(), AsmError> {
        self.tok = self
            .scanner
            .next()
            .map_err(|e| AsmError::new("invalid token", e.offset))?;
        Ok(())
    }

    fn err<T>(&self, message: impl Into<String>) -> Result<T, AsmError> {
        Err(AsmError::new(message, self.tok.offset))
    }

    fn eat(&mut self, kind: TokenKind) -> Result<bool, AsmError> {
        if self.tok.kind == kind {
            self.bump()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token<'a>, AsmError> {
        if self.tok.kind != kind {
            return self.err(format!("expected {}", what));
        }
        let tok = self.tok;
        self.bump()?;
        Ok(tok)
    }

    fn expect_ident(&mut self, what: &str) -> Result<&'a str, AsmError> {
        Ok(self.expect(TokenKind::Ident, what)?.text)
    }

    // ===== top level =====

    pub(crate) fn parse(mut self) -> Result<ParsedProgram, AsmError> {
        match self.tok.kind {
            TokenKind::Header { vertex } if vertex == self.is_vertex => self.bump()?,
            TokenKind::Header { .. } => {
                return self.err("program header does not match the requested stage")
            }
            _ => return self.err("missing program header"),
        }

        loop {
            let name = match self.tok.kind {
                TokenKind::Ident => self.tok.text,
                TokenKind::Eof => return self.err("missing END"),
                _ => return self.err("expected statement"),
            };
            match name {
                "END" => break,
                "TEMP" => self.parse_temp()?,
                "ADDRESS" => self.parse_address()?,
                "PARAM" => self.parse_param()?,
                "ATTRIB" => self.parse_attrib()?,
                "OUTPUT" => self.parse_output()?,
                "ALIAS" => self.parse_alias()?,
                "OPTION" => self.parse_option()?,
                _ => self.parse_instruction()?,
            }
        }

        Ok(ParsedProgram {
            glsl: self.assemble(),
            depth_replacing: self.depth_replacing,
            fog_frag_coord: self.fog_frag_coord,
        })
    }

    // ===== declarations =====

    fn declare(&mut self, name: &str, binding: Binding) -> Result<(), AsmError> {
        if self.bindings.contains_key(name) {
            return self.err(format!("'{}' already declared", name));
        }
        self.bindings.insert(name.to_string(), binding);
        Ok(())
    }

    fn parse_temp(&mut self) -> Result<(), AsmError> {
        self.bump()?;
        loop {
            let name = self.expect_ident("temporary name")?.to_string();
            self.declare(&name, Binding::Temp)?;
            self.temps.push(name);
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(())
    }

    fn parse_address(&mut self) -> Result<(), AsmError> {
        if !self.is_vertex {
            return self.err("ADDRESS is only valid in vertex programs");
        }
        self.bump()?;
        loop {
            let name = self.expect_ident("address register name")?.to_string();
            self.declare(&name, Binding::Address)?;
            self.addresses.push(name);
            if !self.eat(TokenKind::Comma)? {
                break;
            }
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(())
    }

    fn parse_attrib(&mut self) -> Result<(), AsmError> {
        self.bump()?;
        let name = self.expect_ident("attribute name")?.to_string();
        self.expect(TokenKind::Equals, "'='")?;
        let first = self.expect_ident("input register")?.to_string();
        let comps = self.parse_components()?;
        let (expr, rest) = self.resolve_input(&first, &comps)?;
        if !rest.is_empty() {
            return self.err("unexpected trailing components in ATTRIB binding");
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        self.declare(&name, Binding::Expr(expr))
    }

    fn parse_output(&mut self) -> Result<(), AsmError> {
        self.bump()?;
        let name = self.expect_ident("output name")?.to_string();
        self.expect(TokenKind::Equals, "'='")?;
        let first = self.expect_ident("result register")?;
        if first != "result" {
            return self.err("OUTPUT bindings must name a result register");
        }
        let comps = self.parse_components()?;
        let (expr, scalar) = self.resolve_result(&comps)?;
        self.expect(TokenKind::Semicolon, "';'")?;
        self.declare(&name, Binding::Output { expr, scalar })
    }

    fn parse_alias(&mut self) -> Result<(), AsmError> {
        self.bump()?;
        let name = self.expect_ident("alias name")?.to_string();
        self.expect(TokenKind::Equals, "'='")?;
        let target = self.expect_ident("aliased name")?;
        let binding = match self.bindings.get(target) {
            Some(Binding::Temp) => Binding::Expr(target.to_string()),
            Some(Binding::Expr(e)) => Binding::Expr(e.clone()),
            Some(Binding::Output { expr, scalar }) => Binding::Output {
                expr: expr.clone(),
                scalar: *scalar,
            },
            Some(_) => return self.err("cannot alias this declaration"),
            None => return self.err(format!("unknown name '{}'", target)),
        };
        self.expect(TokenKind::Semicolon, "';'")?;
        self.declare(&name, binding)
    }

    fn parse_option(&mut self) -> Result<(), AsmError> {
        self.bump()?;
        let option = self.expect_ident("option name")?;
        match option {
            "ARB_position_invariant" if self.is_vertex => self.position_invariant = true,
            o if o.starts_with("ARB_precision_hint") => {}
            o if o.starts_with("ARB_fog_") => {}
            "ARB_fragment_program_shadow" => {}
            _ => return self.err(format!("unsupported option '{}'", option)),
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(())
    }

    fn parse_param(&mut self) -> Result<(), AsmError> {
        self.bump()?;
        let name = self.expect_ident("parameter name")?.to_string();
        let mut declared_len = None;
        if self.eat(TokenKind::LBracket)? {
            if self.tok.kind == TokenKind::Integer {
                declared_len = Some(self.tok.text.parse::<i64>().unwrap_or(0));
                self.bump()?;
            }
            self.expect(TokenKind::RBracket, "']'")?;
        }
        self.expect(TokenKind::Equals, "'='")?;

        if self.eat(TokenKind::LBrace)? {
            self.parse_param_braced(&name, declared_len)?;
        } else if self.tok.kind == TokenKind::Ident {
            // PARAM name = program.local[3]; / state binding
            let first = self.expect_ident("parameter binding")?.to_string();
            let comps = self.parse_components()?;
            let (expr, rest) = self.resolve_input(&first, &comps)?;
            if !rest.is_empty() {
                return self.err("unexpected trailing components in PARAM binding");
            }
            self.declare(&name, Binding::Expr(expr))?;
        } else {
            // PARAM name = 3.0;
            let value = self.parse_signed_scalar()?;
            self.globals
                .push(format!("const vec4 {} = vec4({});\n", name, value));
            self.declare(&name, Binding::Expr(name.clone()))?;
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        Ok(())
    }

    /// The `{ ... }` forms of PARAM: matrix rows, local/env ranges,
    /// constant vectors and constant-vector arrays
    fn parse_param_braced(&mut self, name: &str, declared_len: Option<i64>) -> Result<(), AsmError> {
        match self.tok.kind {
            TokenKind::Ident if self.tok.text == "state" => {
                self.bump()?;
                let comps = self.parse_components()?;
                let (glsl, transposed) = self.resolve_state_matrix(&comps)?;
                self.expect(TokenKind::RBrace, "'}'")?;
                self.declare(name, Binding::MatrixRows { glsl, transposed })
            }
            TokenKind::Ident if self.tok.text == "program" => {
                self.bump()?;
                self.expect(TokenKind::Dot, "'.'")?;
                let bank = self.expect_ident("'local' or 'env'")?;
                let env = match bank {
                    "local" => false,
                    "env" => true,
                    _ => return self.err("expected 'local' or 'env'"),
                };
                self.expect(TokenKind::LBracket, "'['")?;
                let base = self.expect(TokenKind::Integer, "index")?.text;
                let base: i64 = base.parse().unwrap_or(0);
                let mut last = base;
                // `program.local[a..b]` ranges scan as two consecutive dots
                if self.eat(TokenKind::Dot)? {
                    self.expect(TokenKind::Dot, "'..'")?;
                    last = self
                        .expect(TokenKind::Integer, "range end")?
                        .text
                        .parse()
                        .unwrap_or(base);
                }
                self.expect(TokenKind::RBracket, "']'")?;
                self.expect(TokenKind::RBrace, "'}'")?;
                let len = declared_len.unwrap_or(last - base + 1);
                if env {
                    self.max_env = self.max_env.max(base + len - 1);
                } else {
                    self.max_local = self.max_local.max(base + len - 1);
                }
                self.declare(name, Binding::ParamRange { env, base, len })
            }
            TokenKind::LBrace => {
                // Array of constant vectors
                let mut vectors = Vec::new();
                loop {
                    self.expect(TokenKind::LBrace, "'{'")?;
                    vectors.push(self.parse_vector_literal()?);
                    self.expect(TokenKind::RBrace, "'}'")?;
                    if !self.eat(TokenKind::Comma)? {
                        break;
                    }
                }
                self.expect(TokenKind::RBrace, "'}'")?;
                self.globals
                    .push(format!("vec4 {}[{}];\n", name, vectors.len()));
                for (i, v) in vectors.iter().enumerate() {
                    self.preamble.push(format!("    {}[{}] = {};\n", name, i, v));
                }
                self.declare(name, Binding::ConstArray)
            }
            _ => {
                // Single constant vector
                let vector = self.parse_vector_literal()?;
                self.expect(TokenKind::RBrace, "'}'")?;
                self.globals
                    .push(format!("const vec4 {} = {};\n", name, vector));
                self.declare(name, Binding::Expr(name.to_string()))
            }
        }
    }

    fn parse_signed_scalar(&mut self) -> Result<String, AsmError> {
        let negate = self.eat(TokenKind::Minus)?;
        if !negate {
            self.eat(TokenKind::Plus)?;
        }
        let text = match self.tok.kind {
            TokenKind::Integer | TokenKind::Float => self.tok.text,
            _ => return self.err("expected numeric literal"),
        };
        self.bump()?;
        let lit = float_literal(text);
        Ok(if negate { format!("-{}", lit) } else { lit })
    }

    /// 1 to 4 scalar components; missing ones default to (0, 0, 0, 1)
    fn parse_vector_literal(&mut self) -> Result<String, AsmError> {
        let mut comps = vec![self.parse_signed_scalar()?];
        while self.eat(TokenKind::Comma)? {
            if comps.len() == 4 {
                return self.err("too many vector components");
            }
            comps.push(self.parse_signed_scalar()?);
        }
        const DEFAULTS: [&str; 4] = ["0.0", "0.0", "0.0", "1.0"];
        while comps.len() < 4 {
            comps.push(DEFAULTS[comps.len()].to_string());
        }
        Ok(format!("vec4({})", comps.join(", ")))
    }

    // ===== register-path resolution =====

    /// Collect `.name` and `[index]` components following a register name
    fn parse_components(&mut self) -> Result<Vec<Comp>, AsmError> {
        let mut comps = Vec::new();
        loop {
            if self.tok.kind == TokenKind::Dot {
                self.bump()?;
                let name = self.expect_ident("name after '.'")?;
                comps.push(Comp::Name(name.to_string()));
            } else if self.tok.kind == TokenKind::LBracket {
                self.bump()?;
                comps.push(Comp::Idx(self.parse_index()?));
                self.expect(TokenKind::RBracket, "']'")?;
            } else {
                return Ok(comps);
            }
        }
    }

    /// A literal index, or a relative `A0.x + n` address expression
    fn parse_index(&mut self) -> Result<IndexExpr, AsmError> {
        if self.tok.kind == TokenKind::Integer {
            let literal = self.tok.text.parse::<i64>().ok();
            let text = self.tok.text.to_string();
            self.bump()?;
            return Ok(IndexExpr { text, literal });
        }
        let name = self.expect_ident("index")?.to_string();
        match self.bindings.get(&name) {
            Some(Binding::Address) => {}
            _ => return self.err(format!("'{}' is not an address register", name)),
        }
        if self.eat(TokenKind::Dot)? {
            let comp = self.expect_ident("'x'")?;
            if comp != "x" {
                return self.err("address registers only expose the x component");
            }
        }
        let mut text = name;
        if self.eat(TokenKind::Plus)? {
            let offset = self.expect(TokenKind::Integer, "offset")?.text;
            text = format!("{} + {}", text, offset);
        } else if self.eat(TokenKind::Minus)? {
            let offset = self.expect(TokenKind::Integer, "offset")?.text;
            text = format!("{} - {}", text, offset);
        }
        Ok(IndexExpr {
            text,
            literal: None,
        })
    }

    /// Resolve a source path (`vertex.*`, `fragment.*`, `program.*`, a
    /// declared name...). Returns the vec4 expression and any leftover
    /// components (at most a trailing swizzle).
    fn resolve_input<'c>(
        &mut self,
        first: &str,
        comps: &'c [Comp],
    ) -> Result<(String, &'c [Comp]), AsmError> {
        if let Some(binding) = self.bindings.get(first) {
            return match binding {
                Binding::Temp => Ok((first.to_string(), comps)),
                Binding::Expr(expr) => Ok((expr.clone(), comps)),
                Binding::MatrixRows { glsl, transposed } => {
                    let (glsl, transposed) = (*glsl, *transposed);
                    match comps.split_first() {
                        Some((Comp::Idx(idx), rest)) => {
                            Ok((matrix_row(glsl, transposed, &idx.text), rest))
                        }
                        _ => self.err("matrix parameter requires a row index"),
                    }
                }
                Binding::ParamRange { env, base, len } => {
                    let (env, base, len) = (*env, *base, *len);
                    match comps.split_first() {
                        Some((Comp::Idx(idx), rest)) => {
                            let expr = self.param_bank_access(env, base, len, idx);
                            Ok((expr, rest))
                        }
                        _ => self.err("array parameter requires an index"),
                    }
                }
                Binding::ConstArray => match comps.split_first() {
                    Some((Comp::Idx(idx), rest)) => {
                        Ok((format!("{}[{}]", first, idx.text), rest))
                    }
                    _ => self.err("array parameter requires an index"),
                },
                Binding::Address => self.err("address registers cannot be read as operands"),
                Binding::Output { .. } => self.err("outputs are write-only"),
            };
        }
        match first {
            "vertex" if self.is_vertex => self.resolve_vertex(comps),
            "fragment" if !self.is_vertex => self.resolve_fragment(comps),
            "program" => self.resolve_program(comps),
            "state" => self.err("this state binding requires an array PARAM declaration"),
            "vertex" | "fragment" => self.err("input bank does not match the program stage"),
            _ => self.err(format!("unknown identifier '{}'", first)),
        }
    }

    fn resolve_vertex<'c>(&mut self, comps: &'c [Comp]) -> Result<(String, &'c [Comp]), AsmError> {
        let (name, rest) = match comps.split_first() {
            Some((Comp::Name(n), rest)) => (n.as_str(), rest),
            _ => return self.err("expected vertex attribute name"),
        };
        match name {
            "position" => Ok(("gl_Vertex".to_string(), rest)),
            "normal" => Ok(("vec4(gl_Normal, 1.0)".to_string(), rest)),
            "fogcoord" => Ok(("vec4(gl_FogCoord, 0.0, 0.0, 1.0)".to_string(), rest)),
            "color" => match rest.split_first() {
                Some((Comp::Name(n), tail)) if n == "primary" => {
                    Ok(("gl_Color".to_string(), tail))
                }
                Some((Comp::Name(n), tail)) if n == "secondary" => {
                    Ok(("gl_SecondaryColor".to_string(), tail))
                }
                _ => Ok(("gl_Color".to_string(), rest)),
            },
            "texcoord" => match rest.split_first() {
                Some((Comp::Idx(idx), tail)) => match idx.literal {
                    Some(unit @ 0..=7) => Ok((format!("gl_MultiTexCoord{}", unit), tail)),
                    _ => self.err("texture coordinate index must be a literal 0..7"),
                },
                _ => Ok(("gl_MultiTexCoord0".to_string(), rest)),
            },
            "attrib" => match rest.split_first() {
                Some((Comp::Idx(idx), tail)) => {
                    let expr = match idx.literal {
                        Some(0) => "gl_Vertex".to_string(),
                        Some(2) => "vec4(gl_Normal, 1.0)".to_string(),
                        Some(3) => "gl_Color".to_string(),
                        Some(4) => "gl_SecondaryColor".to_string(),
                        Some(5) => "vec4(gl_FogCoord, 0.0, 0.0, 1.0)".to_string(),
                        Some(n @ 8..=15) => format!("gl_MultiTexCoord{}", n - 8),
                        _ => return self.err("unsupported generic attribute index"),
                    };
                    Ok((expr, tail))
                }
                _ => self.err("vertex.attrib requires an index"),
            },
            _ => self.err(format!("unsupported vertex attribute '{}'", name)),
        }
    }

    fn resolve_fragment<'c>(
        &mut self,
        comps: &'c [Comp],
    ) -> Result<(String, &'c [Comp]), AsmError> {
        let (name, rest) = match comps.split_first() {
            Some((Comp::Name(n), rest)) => (n.as_str(), rest),
            _ => return self.err("expected fragment input name"),
        };
        match name {
            "position" => Ok(("gl_FragCoord".to_string(), rest)),
            "fogcoord" => {
                self.fog_frag_coord = true;
                Ok(("vec4(gl_FogFragCoord, 0.0, 0.0, 1.0)".to_string(), rest))
            }
            "color" => match rest.split_first() {
                Some((Comp::Name(n), tail)) if n == "primary" => {
                    Ok(("gl_Color".to_string(), tail))
                }
                Some((Comp::Name(n), tail)) if n == "secondary" => {
                    Ok(("gl_SecondaryColor".to_string(), tail))
                }
                _ => Ok(("gl_Color".to_string(), rest)),
            },
            "texcoord" => match rest.split_first() {
                Some((Comp::Idx(idx), tail)) => match idx.literal {
                    Some(unit @ 0..=7) => Ok((format!("gl_TexCoord[{}]", unit), tail)),
                    _ => self.err("texture coordinate index must be a literal 0..7"),
                },
                _ => Ok(("gl_TexCoord[0]".to_string(), rest)),
            },
            _ => self.err(format!("unsupported fragment input '{}'", name)),
        }
    }

    fn resolve_program<'c>(&mut self, comps: &'c [Comp]) -> Result<(String, &'c [Comp]), AsmError> {
        let (bank, rest) = match comps.split_first() {
            Some((Comp::Name(n), rest)) => (n.as_str(), rest),
            _ => return self.err("expected 'local' or 'env'"),
        };
        let env = match bank {
            "local" => false,
            "env" => true,
            _ => return self.err("expected 'local' or 'env'"),
        };
        match rest.split_first() {
            Some((Comp::Idx(idx), tail)) => {
                let expr = self.param_bank_access(env, 0, 1, idx);
                Ok((expr, tail))
            }
            _ => self.err("program parameters require an index"),
        }
    }

    fn param_bank_access(&mut self, env: bool, base: i64, len: i64, idx: &IndexExpr) -> String {
        let bank = if env {
            "ngl_ProgramEnv"
        } else {
            "ngl_ProgramLocal"
        };
        let highest = match idx.literal {
            Some(i) => base + i,
            // Relative addressing: the whole declared range is reachable
            None => base + len - 1,
        };
        if env {
            self.max_env = self.max_env.max(highest);
        } else {
            self.max_local = self.max_local.max(highest);
        }
        if base == 0 {
            format!("{}[{}]", bank, idx.text)
        } else {
            format!("{}[{} + {}]", bank, base, idx.text)
        }
    }

    fn resolve_state_matrix(&mut self, comps: &[Comp]) -> Result<(&'static str, bool), AsmError> {
        let mut names = comps.iter();
        match names.next() {
            Some(Comp::Name(n)) if n == "matrix" => {}
            _ => return self.err("unsupported state binding"),
        }
        let glsl = match names.next() {
            Some(Comp::Name(n)) => match n.as_str() {
                "mvp" => "gl_ModelViewProjectionMatrix",
                "modelview" => "gl_ModelViewMatrix",
                "projection" => "gl_ProjectionMatrix",
                _ => return self.err(format!("unsupported state matrix '{}'", n)),
            },
            _ => return self.err("expected state matrix name"),
        };
        let transposed = match names.next() {
            None => false,
            Some(Comp::Name(n)) if n == "transpose" => true,
            Some(Comp::Name(n)) => {
                return self.err(format!("unsupported matrix modifier '{}'", n))
            }
            Some(Comp::Idx(_)) => return self.err("unexpected index in state matrix binding"),
        };
        if names.next().is_some() {
            return self.err("unexpected trailing components in state matrix binding");
        }
        Ok((glsl, transposed))
    }

    /// Resolve destination paths (`result.*`). Returns the expression and
    /// the scalar component for scalar outputs.
    fn resolve_result(&mut self, comps: &[Comp]) -> Result<(String, Option<char>), AsmError> {
        let (name, rest) = match comps.split_first() {
            Some((Comp::Name(n), rest)) => (n.as_str(), rest),
            _ => return self.err("expected result register name"),
        };
        if self.is_vertex {
            match name {
                "position" => Ok(("gl_Position".to_string(), None)),
                "fogcoord" => Ok(("gl_FogFragCoord".to_string(), Some('x'))),
                "pointsize" => Ok(("gl_PointSize".to_string(), Some('x'))),
                "color" => match rest.split_first() {
                    Some((Comp::Name(n), _)) if n == "secondary" => {
                        Ok(("gl_FrontSecondaryColor".to_string(), None))
                    }
                    _ => Ok(("gl_FrontColor".to_string(), None)),
                },
                "texcoord" => match rest.split_first() {
                    Some((Comp::Idx(idx), _)) => match idx.literal {
                        Some(unit @ 0..=7) => Ok((format!("gl_TexCoord[{}]", unit), None)),
                        _ => self.err("texture coordinate index must be a literal 0..7"),
                    },
                    _ => Ok(("gl_TexCoord[0]".to_string(), None)),
                },
                _ => self.err(format!("unsupported vertex result '{}'", name)),
            }
        } else {
            match name {
                "color" => Ok(("gl_FragColor".to_string(), None)),
                "depth" => {
                    self.depth_replacing = true;
                    Ok(("gl_FragDepth".to_string(), Some('z')))
                }
                _ => self.err(format!("unsupported fragment result '{}'", name)),
            }
        }
    }

    // ===== operands =====

    fn parse_src(&mut self) -> Result<SrcOperand, AsmError> {
        let negate = self.eat(TokenKind::Minus)?;
        match self.tok.kind {
            TokenKind::Integer | TokenKind::Float => {
                let base = format!("vec4({})", float_literal(self.tok.text));
                self.bump()?;
                Ok(SrcOperand {
                    base,
                    swizzle: None,
                    negate,
                })
            }
            TokenKind::LBrace => {
                self.bump()?;
                let base = self.parse_vector_literal()?;
                self.expect(TokenKind::RBrace, "'}'")?;
                Ok(SrcOperand {
                    base,
                    swizzle: None,
                    negate,
                })
            }
            TokenKind::Ident => {
                let first = self.tok.text.to_string();
                self.bump()?;
                let comps = self.parse_components()?;
                let (base, rest) = self.resolve_input(&first, &comps)?;
                let swizzle = self.take_swizzle(rest)?;
                Ok(SrcOperand {
                    base,
                    swizzle,
                    negate,
                })
            }
            _ => self.err("expected operand"),
        }
    }

    /// Interpret leftover path components as a trailing swizzle
    fn take_swizzle(&self, rest: &[Comp]) -> Result<Option<String>, AsmError> {
        match rest {
            [] => Ok(None),
            [Comp::Name(s)] if is_swizzle(s) => Ok(Some(normalize_swizzle(s))),
            _ => self.err("invalid register suffix"),
        }
    }

    fn parse_dest(&mut self) -> Result<Dest, AsmError> {
        let first = self.expect_ident("destination register")?.to_string();
        let comps = self.parse_components()?;

        let (expr, scalar, is_address, rest): (String, Option<char>, bool, &[Comp]) =
            if let Some(binding) = self.bindings.get(&first) {
                match binding {
                    Binding::Temp => (first.clone(), None, false, &comps),
                    Binding::Expr(expr) => (expr.clone(), None, false, &comps),
                    Binding::Address => (first.clone(), None, true, &comps),
                    Binding::Output { expr, scalar } => (expr.clone(), *scalar, false, &comps),
                    _ => return self.err("destination must be a temporary or an output"),
                }
            } else if first == "result" {
                let (expr, scalar) = self.resolve_result(&comps)?;
                // resolve_result consumed everything except a possible mask,
                // which parse_components cannot distinguish; recompute below
                (expr, scalar, false, mask_rest(&comps))
            } else {
                return self.err(format!("unknown destination '{}'", first));
            };

        let mask = match rest {
            [] => None,
            [Comp::Name(m)] if is_mask(m) => Some(normalize_swizzle(m)),
            _ => return self.err("invalid write mask"),
        };
        Ok(Dest {
            expr,
            mask,
            scalar,
            is_address,
        })
    }

    // ===== instructions =====

    fn parse_instruction(&mut self) -> Result<(), AsmError> {
        let opcode_tok = self.tok;
        let full = opcode_tok.text;
        self.bump()?;
        let (base, sat) = match full.strip_suffix("_SAT") {
            Some(b) => (b, true),
            None => (full, false),
        };

        match base {
            "KIL" => {
                if self.is_vertex {
                    return self.err("KIL is only valid in fragment programs");
                }
                if sat {
                    return self.err("KIL cannot saturate");
                }
                let src = self.parse_src()?;
                let vec = self.vec4_of(&src)?;
                self.expect(TokenKind::Semicolon, "';'")?;
                self.body.push(format!(
                    "    if (any(lessThan({}, vec4(0.0)))) discard;\n",
                    vec
                ));
                return Ok(());
            }
            "TEX" | "TXP" | "TXB" => return self.parse_tex(base, sat),
            "SWZ" => return self.parse_swz(sat),
            "ARL" => {
                if !self.is_vertex {
                    return self.err("ARL is only valid in vertex programs");
                }
                let dest = self.parse_dest()?;
                if !dest.is_address {
                    return self.err("ARL requires an address register destination");
                }
                self.expect(TokenKind::Comma, "','")?;
                let src = self.parse_src()?;
                self.expect(TokenKind::Semicolon, "';'")?;
                self.body.push(format!(
                    "    {} = int(floor({}));\n",
                    dest.expr,
                    src.scalar()
                ));
                return Ok(());
            }
            _ => {}
        }

        enum Shape {
            Vec(usize),
            Sca(usize),
        }
        let shape = match base {
            "MOV" | "ABS" | "FLR" | "FRC" | "LIT" | "DDX" | "DDY" => Shape::Vec(1),
            "ADD" | "SUB" | "MUL" | "MIN" | "MAX" | "SLT" | "SGE" | "DP3" | "DP4" | "DPH"
            | "DST" | "XPD" => Shape::Vec(2),
            "MAD" | "CMP" | "LRP" => Shape::Vec(3),
            "RCP" | "RSQ" | "EX2" | "LG2" | "EXP" | "LOG" | "SIN" | "COS" | "SCS" => Shape::Sca(1),
            "POW" => Shape::Sca(2),
            _ => return Err(AsmError::new(
                format!("unknown opcode '{}'", full),
                opcode_tok.offset,
            )),
        };

        let dest = self.parse_dest()?;
        if dest.is_address {
            return self.err("address registers only accept ARL");
        }
        let mut vecs = Vec::new();
        let mut scas = Vec::new();
        let n = match shape {
            Shape::Vec(n) => n,
            Shape::Sca(n) => n,
        };
        for _ in 0..n {
            self.expect(TokenKind::Comma, "','")?;
            let src = self.parse_src()?;
            match shape {
                Shape::Vec(_) => vecs.push(self.vec4_of(&src)?),
                Shape::Sca(_) => scas.push(src.scalar()),
            }
        }
        self.expect(TokenKind::Semicolon, "';'")?;

        let value = match base {
            "MOV" => vecs[0].clone(),
            "ABS" => format!("abs({})", vecs[0]),
            "FLR" => format!("floor({})", vecs[0]),
            "FRC" => format!("fract({})", vecs[0]),
            "DDX" => format!("dFdx({})", vecs[0]),
            "DDY" => format!("dFdy({})", vecs[0]),
            "LIT" => {
                let a = paren(&vecs[0]);
                format!(
                    "vec4(1.0, max({a}.x, 0.0), ({a}.x > 0.0) ? pow(max({a}.y, 0.0), clamp({a}.w, -128.0, 128.0)) : 0.0, 1.0)",
                    a = a
                )
            }
            "ADD" => format!("{} + {}", paren(&vecs[0]), paren(&vecs[1])),
            "SUB" => format!("{} - {}", paren(&vecs[0]), paren(&vecs[1])),
            "MUL" => format!("{} * {}", paren(&vecs[0]), paren(&vecs[1])),
            "MIN" => format!("min({}, {})", vecs[0], vecs[1]),
            "MAX" => format!("max({}, {})", vecs[0], vecs[1]),
            "SLT" => format!("vec4(lessThan({}, {}))", vecs[0], vecs[1]),
            "SGE" => format!("vec4(greaterThanEqual({}, {}))", vecs[0], vecs[1]),
            "DP3" => format!(
                "vec4(dot({}.xyz, {}.xyz))",
                paren(&vecs[0]),
                paren(&vecs[1])
            ),
            "DP4" => format!("vec4(dot({}, {}))", vecs[0], vecs[1]),
            "DPH" => format!(
                "vec4(dot(vec4({}.xyz, 1.0), {}))",
                paren(&vecs[0]),
                vecs[1]
            ),
            "DST" => {
                let (a, b) = (paren(&vecs[0]), paren(&vecs[1]));
                format!("vec4(1.0, {a}.y * {b}.y, {a}.z, {b}.w)", a = a, b = b)
            }
            "XPD" => format!(
                "vec4(cross({}.xyz, {}.xyz), 0.0)",
                paren(&vecs[0]),
                paren(&vecs[1])
            ),
            "MAD" => format!(
                "{} * {} + {}",
                paren(&vecs[0]),
                paren(&vecs[1]),
                paren(&vecs[2])
            ),
            "CMP" => format!(
                "mix({}, {}, vec4(lessThan({}, vec4(0.0))))",
                vecs[2], vecs[1], vecs[0]
            ),
            "LRP" => format!("mix({}, {}, {})", vecs[2], vecs[1], vecs[0]),
            "RCP" => format!("vec4(1.0 / {})", scas[0]),
            "RSQ" => format!("vec4(inversesqrt(abs({})))", scas[0]),
            "EX2" | "EXP" => format!("vec4(exp2({}))", scas[0]),
            "LG2" | "LOG" => format!("vec4(log2(abs({})))", scas[0]),
            "SIN" => format!("vec4(sin({}))", scas[0]),
            "COS" => format!("vec4(cos({}))", scas[0]),
            "SCS" => format!(
                "vec4(cos({}), sin({}), 0.0, 1.0)",
                scas[0], scas[0]
            ),
            "POW" => format!("vec4(pow({}, {}))", scas[0], scas[1]),
            _ => unreachable!(),
        };

        self.push_assign(&dest, value, sat);
        Ok(())
    }

    /// Texture target keyword. Digit-led targets (`1D`, `2D`, `3D`) scan as
    /// an integer and an adjoining identifier, so both spellings are joined
    /// here; `CUBE` and `RECT` arrive as plain identifiers.
    fn parse_tex_target(&mut self) -> Result<String, AsmError> {
        match self.tok.kind {
            TokenKind::Ident => {
                let target = self.tok.text.to_string();
                self.bump()?;
                Ok(target)
            }
            TokenKind::Integer => {
                let digits = self.tok;
                self.bump()?;
                if self.tok.kind == TokenKind::Ident
                    && self.tok.offset == digits.offset + digits.text.len()
                {
                    let target = format!("{}{}", digits.text, self.tok.text);
                    self.bump()?;
                    Ok(target)
                } else {
                    Err(AsmError::new("expected texture target", digits.offset))
                }
            }
            _ => self.err("expected texture target"),
        }
    }

    fn parse_tex(&mut self, base: &str, sat: bool) -> Result<(), AsmError> {
        if self.is_vertex {
            return self.err("texture fetches are only valid in fragment programs");
        }
        let dest = self.parse_dest()?;
        self.expect(TokenKind::Comma, "','")?;
        let src = self.parse_src()?;
        let coord = self.vec4_of(&src)?;
        self.expect(TokenKind::Comma, "','")?;
        let bank = self.expect_ident("'texture'")?;
        if bank != "texture" {
            return self.err("expected a texture unit");
        }
        self.expect(TokenKind::LBracket, "'['")?;
        let unit: usize = self
            .expect(TokenKind::Integer, "texture unit")?
            .text
            .parse()
            .unwrap_or(usize::MAX);
        if unit >= 8 {
            return self.err("texture unit out of range");
        }
        self.expect(TokenKind::RBracket, "']'")?;
        self.expect(TokenKind::Comma, "','")?;
        let target = self.parse_tex_target()?;
        let target = target.as_str();
        let sampler_type = match target {
            "1D" | "2D" | "RECT" => SAMPLER_2D,
            "3D" => SAMPLER_3D,
            "CUBE" => SAMPLER_CUBE,
            _ => return self.err(format!("unsupported texture target '{}'", target)),
        };
        self.expect(TokenKind::Semicolon, "';'")?;

        match self.samplers[unit] {
            None => self.samplers[unit] = Some(sampler_type),
            Some(existing) if existing == sampler_type => {}
            Some(_) => return self.err("texture unit bound with two different targets"),
        }

        let sampler = format!("ngl_TexSampler{}", unit);
        let c = paren(&coord);
        let value = match (base, target) {
            ("TEX", "1D") => format!("texture2D({}, vec2({}.x, 0.0))", sampler, c),
            ("TEX", "2D") | ("TEX", "RECT") => format!("texture2D({}, {}.xy)", sampler, c),
            ("TEX", "3D") => format!("texture3D({}, {}.xyz)", sampler, c),
            ("TEX", "CUBE") => format!("textureCube({}, {}.xyz)", sampler, c),
            ("TXP", "1D") => format!(
                "texture2DProj({}, vec3({}.x, 0.0, {}.w))",
                sampler, c, c
            ),
            ("TXP", "2D") | ("TXP", "RECT") => format!("texture2DProj({}, {})", sampler, coord),
            ("TXB", "1D") => format!(
                "texture2D({}, vec2({}.x, 0.0), {}.w)",
                sampler, c, c
            ),
            ("TXB", "2D") | ("TXB", "RECT") => {
                format!("texture2D({}, {}.xy, {}.w)", sampler, c, c)
            }
            ("TXB", "CUBE") => format!("textureCube({}, {}.xyz, {}.w)", sampler, c, c),
            _ => return self.err(format!("'{}' does not support this target", base)),
        };
        self.push_assign(&dest, value, sat);
        Ok(())
    }

    /// `SWZ dst, src, x, -y, 0, 1;` extended swizzle
    fn parse_swz(&mut self, sat: bool) -> Result<(), AsmError> {
        let dest = self.parse_dest()?;
        self.expect(TokenKind::Comma, "','")?;
        let src = self.parse_src()?;
        if src.swizzle.is_some() {
            return self.err("SWZ source cannot carry a swizzle");
        }
        let base = paren(&src.base);
        let mut comps = Vec::with_capacity(4);
        for _ in 0..4 {
            self.expect(TokenKind::Comma, "','")?;
            let negate = self.eat(TokenKind::Minus)?;
            let comp = match self.tok.kind {
                TokenKind::Integer if self.tok.text == "0" => "0.0".to_string(),
                TokenKind::Integer if self.tok.text == "1" => "1.0".to_string(),
                TokenKind::Ident if is_swizzle(self.tok.text) && self.tok.text.len() == 1 => {
                    format!("{}.{}", base, normalize_swizzle(self.tok.text))
                }
                _ => return self.err("expected extended-swizzle component"),
            };
            self.bump()?;
            comps.push(if negate {
                format!("-{}", comp)
            } else {
                comp
            });
        }
        self.expect(TokenKind::Semicolon, "';'")?;
        let mut value = format!("vec4({})", comps.join(", "));
        if src.negate {
            value = format!("-{}", paren(&value));
        }
        self.push_assign(&dest, value, sat);
        Ok(())
    }

    fn vec4_of(&self, src: &SrcOperand) -> Result<String, AsmError> {
        src.vec4().map_err(|m| AsmError::new(m, self.tok.offset))
    }

    fn push_assign(&mut self, dest: &Dest, value: String, sat: bool) {
        let value = if sat {
            format!("clamp({}, 0.0, 1.0)", value)
        } else {
            value
        };
        let stmt = if let Some(comp) = dest.scalar {
            let comp = dest
                .mask
                .as_ref()
                .and_then(|m| m.chars().next())
                .unwrap_or(comp);
            format!("    {} = {}.{};\n", dest.expr, paren(&value), comp)
        } else {
            match &dest.mask {
                None => format!("    {} = {};\n", dest.expr, value),
                Some(m) if m == "xyzw" => format!("    {} = {};\n", dest.expr, value),
                Some(m) => format!(
                    "    {}.{} = {}.{};\n",
                    dest.expr,
                    m,
                    paren(&value),
                    m
                ),
            }
        };
        self.body.push(stmt);
    }

    // ===== assembly of the final source =====

    fn assemble(&self) -> String {
        let mut out = String::new();
        if self.max_local >= 0 {
            out.push_str(&format!(
                "uniform vec4 ngl_ProgramLocal[{}];\n",
                self.max_local + 1
            ));
        }
        if self.max_env >= 0 {
            out.push_str(&format!(
                "uniform vec4 ngl_ProgramEnv[{}];\n",
                self.max_env + 1
            ));
        }
        for (unit, sampler) in self.samplers.iter().enumerate() {
            if let Some(sampler_type) = sampler {
                out.push_str(&format!(
                    "uniform {} ngl_TexSampler{};\n",
                    sampler_type, unit
                ));
            }
        }
        for global in &self.globals {
            out.push_str(global);
        }
        out.push_str("void main() {\n");
        for temp in &self.temps {
            out.push_str(&format!("    vec4 {};\n", temp));
        }
        for address in &self.addresses {
            out.push_str(&format!("    int {};\n", address));
        }
        for stmt in &self.preamble {
            out.push_str(stmt);
        }
        if self.position_invariant {
            out.push_str("    gl_Position = gl_ModelViewProjectionMatrix * gl_Vertex;\n");
        }
        for stmt in &self.body {
            out.push_str(stmt);
        }
        out.push_str("}\n");
        out
    }
}

/// Row `idx` of an assembly matrix binding. The assembly dialect exposes
/// rows while the shading language indexes columns, so the untransposed
/// form gathers one component per column; `.transpose` bindings collapse
/// to plain column indexing.
fn matrix_row(glsl: &str, transposed: bool, idx: &str) -> String {
    if transposed {
        format!("{}[{}]", glsl, idx)
    } else {
        format!(
            "vec4({m}[0][{i}], {m}[1][{i}], {m}[2][{i}], {m}[3][{i}])",
            m = glsl,
            i = idx
        )
    }
}

fn is_swizzle(s: &str) -> bool {
    !s.is_empty() && s.len() <= 4 && s.chars().all(|c| "xyzwrgba".contains(c))
}

fn is_mask(s: &str) -> bool {
    !s.is_empty() && s.len() <= 4 && s.chars().all(|c| "xyzw".contains(c))
}

/// Map color-set swizzle names onto coordinate names
fn normalize_swizzle(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'r' => 'x',
            'g' => 'y',
            'b' => 'z',
            'a' => 'w',
            other => other,
        })
        .collect()
}

/// Components of a `result.*` destination that the result resolver does not
/// consume: only a trailing write mask may remain.
fn mask_rest(comps: &[Comp]) -> &[Comp] {
    match comps.last() {
        Some(Comp::Name(n)) if is_mask(n) => &comps[comps.len() - 1..],
        _ => &[],
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
