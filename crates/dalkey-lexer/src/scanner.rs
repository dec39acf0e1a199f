//! The scanner state machine.
//!
//! One forward pass over the source bytes. No token stream is built; the
//! only state carried across the scan is the last significant byte, a
//! stack describing every still-open `(`/`{`, and the import/export
//! records accumulated so far. Keywords are probed in place with
//! boundary checks rather than tokenized.

use thiserror::Error;

/// What a recorded import site is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// `import ... from "x"`, `import "x"`, or a re-exporting
    /// `export ... from "x"`.
    Static,
    /// An `import.meta` expression. Never a dependency.
    Meta,
    /// An `import(...)` call; `arg` is the byte offset of the first
    /// argument expression.
    Dynamic { arg: usize },
}

/// A single import site found in the source.
///
/// `start..end` is the byte range of the specifier with quotes excluded,
/// so callers can slice the exact text out of the source. For [`Meta`]
/// records the range covers the whole `import.meta` expression; for a
/// dynamic import whose argument is not a plain literal the range is
/// empty and the import is present but unresolved.
///
/// [`Meta`]: ImportKind::Meta
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportRecord {
    pub start: usize,
    pub end: usize,
    pub kind: ImportKind,
}

impl ImportRecord {
    /// The specifier text, if this record names one.
    #[must_use]
    pub fn specifier<'s>(&self, source: &'s str) -> Option<&'s str> {
        match self.kind {
            ImportKind::Meta => None,
            ImportKind::Dynamic { .. } if self.start == self.end => None,
            _ => source.get(self.start..self.end),
        }
    }

    /// Whether this record is an `import(...)` call.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self.kind, ImportKind::Dynamic { .. })
    }
}

/// Result of analyzing one module source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleAnalysis {
    /// Import sites in source order.
    pub imports: Vec<ImportRecord>,
    /// Exported names in source order (`default` for a default export;
    /// the alias for `export { x as y }`).
    pub exports: Vec<String>,
}

/// Why a source failed to lex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeErrorKind {
    UnterminatedString,
    UnterminatedTemplate,
    UnterminatedRegex,
    UnterminatedComment,
    UnterminatedImport,
    UnbalancedParen,
    UnbalancedBrace,
    InvalidExport,
}

impl AnalyzeErrorKind {
    #[must_use]
    fn describe(self) -> &'static str {
        match self {
            Self::UnterminatedString => "unterminated string literal",
            Self::UnterminatedTemplate => "unterminated template literal",
            Self::UnterminatedRegex => "unterminated regular expression",
            Self::UnterminatedComment => "unterminated comment",
            Self::UnterminatedImport => "unterminated import statement",
            Self::UnbalancedParen => "unbalanced parentheses",
            Self::UnbalancedBrace => "unbalanced braces",
            Self::InvalidExport => "invalid export statement",
        }
    }
}

/// Lexing failure, with the byte offset it was detected at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{} at byte {pos}", kind.describe())]
pub struct AnalyzeError {
    pub pos: usize,
    pub kind: AnalyzeErrorKind,
}

/// Analyze one module source.
///
/// Extracts every import site and exported name reachable by a single
/// lexical pass. Never panics; input that cannot be lexed (unterminated
/// string/template/regex/comment, unbalanced openers) is returned as an
/// [`AnalyzeError`]. No semantic validation is performed.
pub fn analyze(source: &str) -> Result<ModuleAnalysis, AnalyzeError> {
    Scanner::new(source).run()
}

/// What kind of construct a `(` or `{` opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenerKind {
    /// Any `(` not otherwise classified.
    Paren,
    /// The `(` of an `import(...)` call.
    ImportParen,
    /// Any `{` not otherwise classified.
    Brace,
    /// A `{` opening a class body.
    ClassBrace,
    /// The `{` of a `${` template substitution.
    TemplateSub,
}

#[derive(Debug, Clone, Copy)]
struct Opener {
    kind: OpenerKind,
    /// Last significant byte before the opener; `None` at start of input.
    tok: Option<usize>,
    /// Position of the opener itself, for error reporting.
    at: usize,
}

struct Scanner<'s> {
    src: &'s [u8],
    text: &'s str,
    pos: usize,
    /// Byte offset of the last significant (non-whitespace, non-comment)
    /// byte scanned so far.
    last_token: Option<usize>,
    openers: Vec<Opener>,
    /// The opener most recently closed, consulted when the last token is
    /// a `)` or `}`.
    last_popped: Option<Opener>,
    /// Whether the previous bare `/` was a division rather than a regex.
    last_slash_was_division: bool,
    /// Set when a `class` keyword promises that the next `{` opens a
    /// class body.
    next_brace_is_class: bool,
    imports: Vec<ImportRecord>,
    exports: Vec<String>,
}

impl<'s> Scanner<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            src: source.as_bytes(),
            text: source,
            pos: 0,
            last_token: None,
            openers: Vec::new(),
            last_popped: None,
            last_slash_was_division: false,
            next_brace_is_class: false,
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    fn run(mut self) -> Result<ModuleAnalysis, AnalyzeError> {
        while self.pos < self.src.len() {
            let ch = self.src[self.pos];
            if is_ws(ch) {
                self.pos += 1;
                continue;
            }
            match ch {
                b'i' if self.keyword_at(b"import") => {
                    self.import_statement()?;
                    continue;
                }
                b'e' if self.openers.is_empty() && self.keyword_at(b"export") => {
                    self.export_statement()?;
                    continue;
                }
                b'c' if self.keyword_at(b"class") && self.boundary_after(self.pos + 5) => {
                    self.next_brace_is_class = true;
                }
                b'(' => self.push_opener(OpenerKind::Paren),
                b')' => {
                    self.pop_paren()?;
                }
                b'{' => {
                    let kind = if std::mem::take(&mut self.next_brace_is_class) {
                        OpenerKind::ClassBrace
                    } else {
                        OpenerKind::Brace
                    };
                    self.push_opener(kind);
                }
                b'}' => {
                    let opener = self.pop_brace()?;
                    if opener.kind == OpenerKind::TemplateSub {
                        // resume the template this substitution suspended
                        self.template_string()?;
                    }
                }
                b'"' | b'\'' => self.string_literal(ch)?,
                b'`' => self.template_string()?,
                b'/' => match self.src.get(self.pos + 1) {
                    Some(b'/') => {
                        self.line_comment();
                        continue;
                    }
                    Some(b'*') => {
                        self.block_comment()?;
                        continue;
                    }
                    _ => {
                        if self.slash_starts_regex() {
                            self.regex()?;
                            self.last_slash_was_division = false;
                        } else {
                            self.last_slash_was_division = true;
                        }
                    }
                },
                _ => {}
            }
            self.last_token = Some(self.pos);
            self.pos += 1;
        }
        if let Some(op) = self.openers.last() {
            let kind = match op.kind {
                OpenerKind::Paren | OpenerKind::ImportParen => AnalyzeErrorKind::UnbalancedParen,
                OpenerKind::Brace | OpenerKind::ClassBrace => AnalyzeErrorKind::UnbalancedBrace,
                OpenerKind::TemplateSub => AnalyzeErrorKind::UnterminatedTemplate,
            };
            return Err(AnalyzeError { pos: op.at, kind });
        }
        Ok(ModuleAnalysis {
            imports: self.imports,
            exports: self.exports,
        })
    }

    // ---- opener bookkeeping ----

    fn push_opener(&mut self, kind: OpenerKind) {
        self.openers.push(Opener {
            kind,
            tok: self.last_token,
            at: self.pos,
        });
    }

    fn pop_paren(&mut self) -> Result<Opener, AnalyzeError> {
        match self.openers.pop() {
            Some(op) if matches!(op.kind, OpenerKind::Paren | OpenerKind::ImportParen) => {
                self.last_popped = Some(op);
                Ok(op)
            }
            _ => Err(AnalyzeError {
                pos: self.pos,
                kind: AnalyzeErrorKind::UnbalancedParen,
            }),
        }
    }

    fn pop_brace(&mut self) -> Result<Opener, AnalyzeError> {
        match self.openers.pop() {
            Some(op)
                if matches!(
                    op.kind,
                    OpenerKind::Brace | OpenerKind::ClassBrace | OpenerKind::TemplateSub
                ) =>
            {
                self.last_popped = Some(op);
                Ok(op)
            }
            _ => Err(AnalyzeError {
                pos: self.pos,
                kind: AnalyzeErrorKind::UnbalancedBrace,
            }),
        }
    }

    // ---- regex / division disambiguation ----

    /// Decide whether a bare `/` at the cursor opens a regular
    /// expression. Expression position is inferred from the last
    /// significant byte alone, plus the recorded opener when that byte
    /// closes a paren or brace.
    fn slash_starts_regex(&self) -> bool {
        let Some(lt) = self.last_token else {
            return true;
        };
        let last = self.src[lt];
        let prev = if lt > 0 { self.src[lt - 1] } else { 0 };
        if is_expression_punctuator(last)
            && !(last == b'.' && prev.is_ascii_digit())
            && !(last == b'+' && prev == b'+')
            && !(last == b'-' && prev == b'-')
        {
            return true;
        }
        if last == b')' {
            // only an `if`/`for`/`while` head leaves `)` in statement
            // position
            return self
                .last_popped
                .is_some_and(|op| self.is_paren_keyword(op.tok));
        }
        if last == b'}' {
            return self.last_popped.is_some_and(|op| {
                op.kind == OpenerKind::ClassBrace || self.brace_opened_block(op.tok)
            });
        }
        if last == b'/' {
            return self.last_slash_was_division;
        }
        self.is_expression_keyword(lt)
    }

    fn is_paren_keyword(&self, tok: Option<usize>) -> bool {
        matches!(self.word_ending_at(tok), Some(b"if" | b"for" | b"while"))
    }

    /// Whether the `{` preceded by `tok` opened a statement block rather
    /// than an object literal.
    fn brace_opened_block(&self, tok: Option<usize>) -> bool {
        let Some(t) = tok else {
            // start of input: a block
            return true;
        };
        match self.src[t] {
            b';' | b')' | b'}' => true,
            b'>' => t > 0 && self.src[t - 1] == b'=', // arrow body
            _ => matches!(
                self.word_ending_at(tok),
                Some(b"catch" | b"do" | b"else" | b"finally" | b"try")
            ),
        }
    }

    fn is_expression_keyword(&self, lt: usize) -> bool {
        matches!(
            self.word_ending_at(Some(lt)),
            Some(
                b"await"
                    | b"case"
                    | b"debugger"
                    | b"delete"
                    | b"do"
                    | b"else"
                    | b"in"
                    | b"instanceof"
                    | b"new"
                    | b"return"
                    | b"throw"
                    | b"typeof"
                    | b"void"
                    | b"yield"
            )
        )
    }

    /// The full identifier-like word whose last byte sits at `end`.
    fn word_ending_at(&self, end: Option<usize>) -> Option<&[u8]> {
        let end = end?;
        if !is_identifier_byte(self.src[end]) {
            return None;
        }
        let mut start = end;
        while start > 0 && is_identifier_byte(self.src[start - 1]) {
            start -= 1;
        }
        Some(&self.src[start..=end])
    }

    // ---- keyword probes ----

    /// Keyword match at the cursor with a word boundary before it. A
    /// preceding `.` is excluded so member access like `a.import` never
    /// counts.
    fn keyword_at(&self, kw: &[u8]) -> bool {
        let end = self.pos + kw.len();
        if end > self.src.len() || &self.src[self.pos..end] != kw {
            return false;
        }
        match self.pos.checked_sub(1).map(|i| self.src[i]) {
            None => true,
            Some(b'.') => false,
            Some(prev) => !is_identifier_byte(prev),
        }
    }

    /// Word match at the cursor with a boundary after it.
    fn word_at(&self, word: &[u8]) -> bool {
        let end = self.pos + word.len();
        end <= self.src.len() && &self.src[self.pos..end] == word && self.boundary_after(end)
    }

    fn boundary_after(&self, idx: usize) -> bool {
        match self.src.get(idx) {
            None => true,
            Some(&ch) => !is_identifier_byte(ch),
        }
    }

    /// Treat a probed keyword as a plain identifier: consume it as the
    /// last token and let the main loop carry on after it.
    fn bail_keyword(&mut self, start: usize, len: usize) {
        self.last_token = Some(start + len - 1);
        self.pos = start + len;
    }

    // ---- sub-scanners ----

    /// Skip whitespace and comments; the cursor ends on the next
    /// significant byte, which is also returned. `None` at end of input.
    fn comment_whitespace(&mut self) -> Result<Option<u8>, AnalyzeError> {
        loop {
            let Some(&ch) = self.src.get(self.pos) else {
                return Ok(None);
            };
            if is_ws(ch) {
                self.pos += 1;
                continue;
            }
            if ch == b'/' {
                match self.src.get(self.pos + 1) {
                    Some(b'/') => {
                        self.line_comment();
                        continue;
                    }
                    Some(b'*') => {
                        self.block_comment()?;
                        continue;
                    }
                    _ => return Ok(Some(ch)),
                }
            }
            return Ok(Some(ch));
        }
    }

    /// Cursor on `//`; consume up to (not including) the line break.
    fn line_comment(&mut self) {
        while self.pos < self.src.len() && !matches!(self.src[self.pos], b'\n' | b'\r') {
            self.pos += 1;
        }
    }

    /// Cursor on `/*`; consume through the closing `*/`.
    fn block_comment(&mut self) -> Result<(), AnalyzeError> {
        let start = self.pos;
        let mut i = self.pos + 2;
        while i + 1 < self.src.len() {
            if self.src[i] == b'*' && self.src[i + 1] == b'/' {
                self.pos = i + 2;
                return Ok(());
            }
            i += 1;
        }
        Err(AnalyzeError {
            pos: start,
            kind: AnalyzeErrorKind::UnterminatedComment,
        })
    }

    /// Cursor on the opening quote; ends on the closing quote. An
    /// unescaped line break terminates the literal invalidly.
    fn string_literal(&mut self, quote: u8) -> Result<(), AnalyzeError> {
        let start = self.pos;
        let mut i = self.pos + 1;
        loop {
            match self.src.get(i) {
                None | Some(b'\n') | Some(b'\r') => {
                    return Err(AnalyzeError {
                        pos: start,
                        kind: AnalyzeErrorKind::UnterminatedString,
                    })
                }
                Some(&ch) if ch == quote => {
                    self.pos = i;
                    return Ok(());
                }
                Some(b'\\') => {
                    // escaped CRLF counts as one continuation
                    i += 2;
                    if self.src.get(i - 1) == Some(&b'\r') && self.src.get(i) == Some(&b'\n') {
                        i += 1;
                    }
                }
                Some(_) => i += 1,
            }
        }
    }

    /// Cursor on a backtick (fresh template) or on the `}` that closed a
    /// substitution (resume). Ends on the closing backtick, or on the
    /// `{` of the next `${` after pushing its opener.
    fn template_string(&mut self) -> Result<(), AnalyzeError> {
        let start = self.pos;
        let mut i = self.pos + 1;
        loop {
            match self.src.get(i) {
                None => {
                    return Err(AnalyzeError {
                        pos: start,
                        kind: AnalyzeErrorKind::UnterminatedTemplate,
                    })
                }
                Some(b'`') => {
                    self.pos = i;
                    return Ok(());
                }
                Some(b'$') if self.src.get(i + 1) == Some(&b'{') => {
                    self.pos = i + 1;
                    self.push_opener(OpenerKind::TemplateSub);
                    return Ok(());
                }
                Some(b'\\') => i += 2,
                Some(_) => i += 1,
            }
        }
    }

    /// Cursor on the opening `/`; ends on the closing `/`. A `/` inside
    /// a character class does not terminate.
    fn regex(&mut self) -> Result<(), AnalyzeError> {
        let start = self.pos;
        let err = AnalyzeError {
            pos: start,
            kind: AnalyzeErrorKind::UnterminatedRegex,
        };
        let mut i = self.pos + 1;
        loop {
            match self.src.get(i) {
                None | Some(b'\n') | Some(b'\r') => return Err(err),
                Some(b'/') => {
                    self.pos = i;
                    return Ok(());
                }
                Some(b'\\') => i += 2,
                Some(b'[') => {
                    i += 1;
                    loop {
                        match self.src.get(i) {
                            None | Some(b'\n') | Some(b'\r') => return Err(err),
                            Some(b']') => break,
                            Some(b'\\') => i += 2,
                            Some(_) => i += 1,
                        }
                    }
                    i += 1;
                }
                Some(_) => i += 1,
            }
        }
    }

    // ---- import productions ----

    fn import_statement(&mut self) -> Result<(), AnalyzeError> {
        let start = self.pos;
        self.pos += 6;
        let before = self.pos;
        let ch = self.comment_whitespace()?;
        match ch {
            Some(b'(') => self.dynamic_import(start),
            Some(b'.') => self.import_meta(start),
            Some(b'"' | b'\'' | b'{' | b'*') => self.statement_import(start),
            Some(c) if self.pos > before && is_identifier_byte(c) => self.statement_import(start),
            _ => {
                // `imports`, `import =`, ... — not an import statement
                self.bail_keyword(start, 6);
                Ok(())
            }
        }
    }

    /// Cursor on the `(` of `import(`.
    fn dynamic_import(&mut self, start: usize) -> Result<(), AnalyzeError> {
        // `a . import(...)` — member call, not a dynamic import
        if self.last_token.map(|t| self.src[t]) == Some(b'.') {
            self.bail_keyword(start, 6);
            return Ok(());
        }
        let paren = self.pos;
        self.push_opener(OpenerKind::ImportParen);
        self.pos += 1;
        let ch = self.comment_whitespace()?;
        let arg = self.pos;
        match ch {
            Some(q @ (b'"' | b'\'')) => {
                self.string_literal(q)?;
                self.finish_dynamic(arg, arg + 1, self.pos)
            }
            Some(b'`') => {
                if let Some(end) = self.template_without_substitution()? {
                    self.finish_dynamic(arg, arg + 1, end)
                } else {
                    // substitutions make the argument unresolvable; the
                    // main loop rescans the template with full machinery
                    self.imports.push(ImportRecord {
                        start: arg,
                        end: arg,
                        kind: ImportKind::Dynamic { arg },
                    });
                    self.last_token = Some(paren);
                    Ok(())
                }
            }
            _ => {
                // non-literal argument: present but unresolved
                self.imports.push(ImportRecord {
                    start: arg,
                    end: arg,
                    kind: ImportKind::Dynamic { arg },
                });
                self.last_token = Some(paren);
                Ok(())
            }
        }
    }

    /// After a literal dynamic-import argument the call must continue
    /// with `)` or `,` for the literal to be the whole specifier;
    /// anything else is a larger expression and stays unresolved.
    fn finish_dynamic(&mut self, arg: usize, s: usize, e: usize) -> Result<(), AnalyzeError> {
        let literal_end = self.pos;
        self.pos += 1;
        match self.comment_whitespace()? {
            Some(b')') => {
                self.imports.push(ImportRecord {
                    start: s,
                    end: e,
                    kind: ImportKind::Dynamic { arg },
                });
                self.pop_paren()?;
                self.last_token = Some(self.pos);
                self.pos += 1;
                Ok(())
            }
            Some(b',') => {
                // import("x", opts)
                self.imports.push(ImportRecord {
                    start: s,
                    end: e,
                    kind: ImportKind::Dynamic { arg },
                });
                self.last_token = Some(self.pos);
                self.pos += 1;
                Ok(())
            }
            _ => {
                self.imports.push(ImportRecord {
                    start: arg,
                    end: arg,
                    kind: ImportKind::Dynamic { arg },
                });
                self.last_token = Some(literal_end);
                Ok(())
            }
        }
    }

    /// Scan a template literal that must contain no `${` substitution.
    /// On success the cursor ends on the closing backtick and the
    /// content end offset is returned; on a substitution the cursor is
    /// left on the opening backtick and `None` is returned.
    fn template_without_substitution(&mut self) -> Result<Option<usize>, AnalyzeError> {
        let start = self.pos;
        let mut i = self.pos + 1;
        loop {
            match self.src.get(i) {
                None => {
                    return Err(AnalyzeError {
                        pos: start,
                        kind: AnalyzeErrorKind::UnterminatedTemplate,
                    })
                }
                Some(b'`') => {
                    self.pos = i;
                    return Ok(Some(i));
                }
                Some(b'$') if self.src.get(i + 1) == Some(&b'{') => return Ok(None),
                Some(b'\\') => i += 2,
                Some(_) => i += 1,
            }
        }
    }

    /// Cursor on the `.` of `import.`.
    fn import_meta(&mut self, start: usize) -> Result<(), AnalyzeError> {
        let dot = self.pos;
        self.pos += 1;
        self.comment_whitespace()?;
        if self.word_at(b"meta") && self.last_token.map(|t| self.src[t]) != Some(b'.') {
            let end = self.pos + 4;
            self.imports.push(ImportRecord {
                start,
                end,
                kind: ImportKind::Meta,
            });
            self.last_token = Some(end - 1);
            self.pos = end;
        } else {
            self.last_token = Some(dot);
            self.pos = dot + 1;
        }
        Ok(())
    }

    /// An `import` statement form (`import "x"`, `import d from "x"`,
    /// `import { .. } from "x"`, `import * as ns from "x"`). Cursor on
    /// the first byte of the clause.
    fn statement_import(&mut self, start: usize) -> Result<(), AnalyzeError> {
        // statement imports are only valid at the module's base level
        if !self.openers.is_empty() {
            self.bail_keyword(start, 6);
            return Ok(());
        }
        while self.pos < self.src.len() {
            let ch = self.src[self.pos];
            if ch == b'"' || ch == b'\'' {
                return self.import_specifier(ImportKind::Static);
            }
            self.pos += 1;
        }
        Err(AnalyzeError {
            pos: start,
            kind: AnalyzeErrorKind::UnterminatedImport,
        })
    }

    /// Cursor on the opening quote of a specifier; records the import
    /// and consumes through the closing quote.
    fn import_specifier(&mut self, kind: ImportKind) -> Result<(), AnalyzeError> {
        let quote = self.pos;
        self.string_literal(self.src[quote])?;
        self.imports.push(ImportRecord {
            start: quote + 1,
            end: self.pos,
            kind,
        });
        self.last_token = Some(self.pos);
        self.pos += 1;
        Ok(())
    }

    // ---- export productions ----

    fn export_statement(&mut self) -> Result<(), AnalyzeError> {
        let start = self.pos;
        self.pos += 6;
        let before = self.pos;
        let ch = self.comment_whitespace()?;
        if self.pos == before && ch.is_some_and(is_identifier_byte) {
            // `exports.x = ...`
            self.bail_keyword(start, 6);
            return Ok(());
        }
        match ch {
            Some(b'd') if self.word_at(b"default") => {
                self.exports.push("default".to_owned());
                self.last_token = Some(self.pos + 6);
                self.pos += 7;
                Ok(())
            }
            Some(b'a') if self.word_at(b"async") => {
                self.pos += 5;
                match self.comment_whitespace()? {
                    Some(b'f') if self.word_at(b"function") => self.export_function(),
                    _ => Ok(()),
                }
            }
            Some(b'f') if self.word_at(b"function") => self.export_function(),
            Some(b'c') if self.word_at(b"class") => {
                self.pos += 5;
                self.comment_whitespace()?;
                self.export_declared_name();
                self.next_brace_is_class = true;
                Ok(())
            }
            Some(b'v') if self.word_at(b"var") => self.export_decl_list(3),
            Some(b'l') if self.word_at(b"let") => self.export_decl_list(3),
            Some(b'c') if self.word_at(b"const") => self.export_decl_list(5),
            Some(b'{') => self.export_clause(start),
            Some(b'*') => self.export_star(),
            _ => {
                self.bail_keyword(start, 6);
                Ok(())
            }
        }
    }

    /// Cursor on `function`.
    fn export_function(&mut self) -> Result<(), AnalyzeError> {
        self.pos += 8;
        if self.comment_whitespace()? == Some(b'*') {
            self.pos += 1;
            self.comment_whitespace()?;
        }
        self.export_declared_name();
        Ok(())
    }

    /// Read an identifier at the cursor and record it as an export, if
    /// present. The cursor ends after the name.
    fn export_declared_name(&mut self) {
        let name_start = self.pos;
        self.read_identifier();
        if self.pos > name_start {
            self.exports.push(self.text[name_start..self.pos].to_owned());
            self.last_token = Some(self.pos - 1);
        }
    }

    /// `export var|let|const a, b = init, ...` — names are collected up
    /// to the first initializer; destructuring targets are not scanned.
    fn export_decl_list(&mut self, keyword_len: usize) -> Result<(), AnalyzeError> {
        self.pos += keyword_len;
        loop {
            let ch = self.comment_whitespace()?;
            match ch {
                // `export var {a, b} = x` / `export let [a] = y`
                Some(b'{' | b'[') | None => return Ok(()),
                Some(_) => {}
            }
            let name_start = self.pos;
            self.read_identifier();
            if self.pos == name_start {
                return Ok(());
            }
            self.exports.push(self.text[name_start..self.pos].to_owned());
            self.last_token = Some(self.pos - 1);
            match self.comment_whitespace()? {
                Some(b',') => {
                    self.last_token = Some(self.pos);
                    self.pos += 1;
                }
                // `=` starts an initializer expression the scanner cannot
                // skip, so later declarators in the list are not recorded
                _ => return Ok(()),
            }
        }
    }

    /// Cursor on the `{` of an export clause.
    fn export_clause(&mut self, start: usize) -> Result<(), AnalyzeError> {
        self.pos += 1;
        let close;
        loop {
            match self.comment_whitespace()? {
                None => {
                    return Err(AnalyzeError {
                        pos: start,
                        kind: AnalyzeErrorKind::InvalidExport,
                    })
                }
                Some(b'}') => {
                    close = self.pos;
                    break;
                }
                Some(b',') => self.pos += 1,
                Some(_) => {
                    let name_start = self.pos;
                    self.read_identifier();
                    if self.pos == name_start {
                        return Err(AnalyzeError {
                            pos: self.pos,
                            kind: AnalyzeErrorKind::InvalidExport,
                        });
                    }
                    let mut name = (name_start, self.pos);
                    if self.comment_whitespace()? == Some(b'a') && self.word_at(b"as") {
                        self.pos += 2;
                        self.comment_whitespace()?;
                        let alias_start = self.pos;
                        self.read_identifier();
                        if self.pos == alias_start {
                            return Err(AnalyzeError {
                                pos: self.pos,
                                kind: AnalyzeErrorKind::InvalidExport,
                            });
                        }
                        name = (alias_start, self.pos);
                    }
                    self.exports.push(self.text[name.0..name.1].to_owned());
                }
            }
        }
        self.pos = close + 1;
        self.last_token = Some(close);
        if self.comment_whitespace()? == Some(b'f') && self.word_at(b"from") {
            self.pos += 4;
            if let Some(b'"' | b'\'') = self.comment_whitespace()? {
                return self.import_specifier(ImportKind::Static);
            }
        }
        Ok(())
    }

    /// Cursor on the `*` of `export *`.
    fn export_star(&mut self) -> Result<(), AnalyzeError> {
        let star = self.pos;
        self.pos += 1;
        self.last_token = Some(star);
        if self.comment_whitespace()? == Some(b'a') && self.word_at(b"as") {
            self.pos += 2;
            self.comment_whitespace()?;
            self.export_declared_name();
        }
        if self.comment_whitespace()? == Some(b'f') && self.word_at(b"from") {
            self.pos += 4;
            if let Some(b'"' | b'\'') = self.comment_whitespace()? {
                return self.import_specifier(ImportKind::Static);
            }
        }
        Ok(())
    }

    fn read_identifier(&mut self) {
        while self.pos < self.src.len() && is_identifier_byte(self.src[self.pos]) {
            self.pos += 1;
        }
    }
}

// ---- character classes ----

fn is_ws(ch: u8) -> bool {
    matches!(ch, b' ' | 0x09..=0x0d)
}

fn is_punctuator(ch: u8) -> bool {
    matches!(
        ch,
        b'!' | b'"'
            | b'#'
            | b'%'
            | b'&'
            | b'\''
            | b'('
            | b')'
            | b'*'
            | b'+'
            | b','
            | b'-'
            | b'.'
            | b'/'
            | b':'
            | b';'
            | b'<'
            | b'='
            | b'>'
            | b'?'
            | b'@'
            | b'['
            | b']'
            | b'^'
            | b'`'
            | b'{'
            | b'|'
            | b'}'
            | b'~'
    )
}

/// Punctuators after which a `/` must be a regex (everything except the
/// value-ending `)`, `]`, `}`).
fn is_expression_punctuator(ch: u8) -> bool {
    matches!(
        ch,
        b'!' | b'%'
            | b'&'
            | b'('
            | b'*'
            | b'+'
            | b','
            | b'-'
            | b'.'
            | b':'
            | b';'
            | b'<'
            | b'='
            | b'>'
            | b'?'
            | b'['
            | b'^'
            | b'{'
            | b'|'
            | b'~'
    )
}

fn is_identifier_byte(ch: u8) -> bool {
    !is_ws(ch) && !is_punctuator(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(source: &str) -> Vec<&str> {
        analyze(source)
            .unwrap()
            .imports
            .iter()
            .filter_map(|r| r.specifier(source))
            .collect()
    }

    #[test]
    fn test_import_and_default_export() {
        let source = r#"import x from "a"; export default 1;"#;
        let out = analyze(source).unwrap();
        assert_eq!(out.imports.len(), 1);
        assert_eq!(out.imports[0].specifier(source), Some("a"));
        assert_eq!(out.imports[0].kind, ImportKind::Static);
        assert_eq!(out.exports, vec!["default"]);
    }

    #[test]
    fn test_side_effect_import() {
        assert_eq!(specs(r#"import "./polyfill";"#), vec!["./polyfill"]);
    }

    #[test]
    fn test_named_and_star_imports() {
        let source = r#"
import { a, b as c } from './named';
import * as ns from './star';
import d, { e } from "./mixed";
"#;
        assert_eq!(specs(source), vec!["./named", "./star", "./mixed"]);
    }

    #[test]
    fn test_dynamic_import_string_literal() {
        let source = "const m = await import('./x.js');";
        let out = analyze(source).unwrap();
        assert_eq!(out.imports.len(), 1);
        assert!(out.imports[0].is_dynamic());
        assert_eq!(out.imports[0].specifier(source), Some("./x.js"));
    }

    #[test]
    fn test_dynamic_import_template_literal() {
        let source = "import(`./tpl.js`);";
        let out = analyze(source).unwrap();
        assert_eq!(out.imports[0].specifier(source), Some("./tpl.js"));
    }

    #[test]
    fn test_dynamic_import_template_with_substitution_unresolved() {
        let source = "import(`./mod-${name}.js`);";
        let out = analyze(source).unwrap();
        assert_eq!(out.imports.len(), 1);
        assert!(out.imports[0].is_dynamic());
        assert_eq!(out.imports[0].specifier(source), None);
    }

    #[test]
    fn test_dynamic_import_expression_unresolved() {
        let source = "import(expr);";
        let out = analyze(source).unwrap();
        assert_eq!(out.imports.len(), 1);
        assert!(out.imports[0].is_dynamic());
        assert_eq!(out.imports[0].specifier(source), None);
    }

    #[test]
    fn test_dynamic_import_concatenation_unresolved() {
        let source = "import('./a' + ext);";
        let out = analyze(source).unwrap();
        assert_eq!(out.imports.len(), 1);
        assert_eq!(out.imports[0].specifier(source), None);
    }

    #[test]
    fn test_dynamic_import_with_options_argument() {
        let source = r#"import("./x.js", { assert: { type: "json" } });"#;
        let out = analyze(source).unwrap();
        assert_eq!(out.imports[0].specifier(source), Some("./x.js"));
    }

    #[test]
    fn test_member_import_call_is_not_dynamic_import() {
        let source = "loader.import('./x.js');";
        let out = analyze(source).unwrap();
        assert!(out.imports.is_empty());
    }

    #[test]
    fn test_import_meta() {
        let source = "const u = import.meta.url;";
        let out = analyze(source).unwrap();
        assert_eq!(out.imports.len(), 1);
        assert_eq!(out.imports[0].kind, ImportKind::Meta);
        assert_eq!(out.imports[0].specifier(source), None);
        assert_eq!(&source[out.imports[0].start..out.imports[0].end], "import.meta");
    }

    #[test]
    fn test_import_inside_function_is_skipped() {
        // statement imports are base-level only; the string is not a specifier
        let source = r#"function f() { import x from "nope"; }"#;
        let out = analyze(source).unwrap();
        assert!(out.imports.is_empty());
    }

    #[test]
    fn test_exports_named_clause() {
        let source = "const a = 1, b = 2; export { a, b as c };";
        let out = analyze(source).unwrap();
        assert_eq!(out.exports, vec!["a", "c"]);
    }

    #[test]
    fn test_export_from_records_import_and_names() {
        let source = r#"export { x as y } from './dep';"#;
        let out = analyze(source).unwrap();
        assert_eq!(out.exports, vec!["y"]);
        assert_eq!(out.imports.len(), 1);
        assert_eq!(out.imports[0].specifier(source), Some("./dep"));
        assert_eq!(out.imports[0].kind, ImportKind::Static);
    }

    #[test]
    fn test_export_star_from() {
        let source = r#"export * from "./all";"#;
        let out = analyze(source).unwrap();
        assert!(out.exports.is_empty());
        assert_eq!(out.imports[0].specifier(source), Some("./all"));
    }

    #[test]
    fn test_export_star_as_namespace() {
        let source = r#"export * as ns from "./all";"#;
        let out = analyze(source).unwrap();
        assert_eq!(out.exports, vec!["ns"]);
        assert_eq!(out.imports[0].specifier(source), Some("./all"));
    }

    #[test]
    fn test_export_declarations() {
        let source = "
export function fn() {}
export async function afn() {}
export function* gen() {}
export class Klass {}
export var v1, v2;
export let l1 = 1, skipped = 2;
export const c1 = 3;
";
        let out = analyze(source).unwrap();
        // names after an initializer are not scanned
        assert_eq!(out.exports, vec!["fn", "afn", "gen", "Klass", "v1", "v2", "l1", "c1"]);
    }

    #[test]
    fn test_export_destructuring_targets_omitted() {
        let source = "export const { a, b } = obj;";
        let out = analyze(source).unwrap();
        assert!(out.exports.is_empty());
    }

    #[test]
    fn test_exports_identifier_is_not_export() {
        let source = r#"exports.foo = 1; module.exports = {};"#;
        let out = analyze(source).unwrap();
        assert!(out.exports.is_empty());
    }

    #[test]
    fn test_division_chain_is_not_regex() {
        // a/b/g must lex as two divisions, not a regex with flags
        let source = r#"const r = a/b/g; import "./after";"#;
        assert_eq!(specs(source), vec!["./after"]);
    }

    #[test]
    fn test_regex_after_return() {
        let source = r#"function f(y) { return /x/.test(y) } import "./after";"#;
        assert_eq!(specs(source), vec!["./after"]);
    }

    #[test]
    fn test_regex_after_keyword_paren() {
        let source = r#"if (a) /import "no"/.test(b); import "./yes";"#;
        assert_eq!(specs(source), vec!["./yes"]);
    }

    #[test]
    fn test_division_after_value_paren() {
        let source = r#"const x = (a + b) / c / d; import "./after";"#;
        assert_eq!(specs(source), vec!["./after"]);
    }

    #[test]
    fn test_regex_with_character_class_slash() {
        // the / inside [...] must not close the regex
        let source = r#"const re = /[/]import "no"/; import "./yes";"#;
        assert_eq!(specs(source), vec!["./yes"]);
    }

    #[test]
    fn test_strings_and_comments_hide_imports() {
        let source = r#"
// import "line-comment"
/* import "block-comment" */
const s = 'import "in-string"';
import "./real";
"#;
        assert_eq!(specs(source), vec!["./real"]);
    }

    #[test]
    fn test_nested_template_substitutions() {
        let source = "const s = `outer ${ `inner ${ deep }` } tail`; import './after';";
        assert_eq!(specs(source), vec!["./after"]);
    }

    #[test]
    fn test_dynamic_import_inside_template_substitution() {
        let source = "const s = `pre ${ import('./sub.js') } post`;";
        let out = analyze(source).unwrap();
        assert_eq!(out.imports.len(), 1);
        assert_eq!(out.imports[0].specifier(source), Some("./sub.js"));
    }

    #[test]
    fn test_class_body_then_regex() {
        let source = r#"class A { m() {} } /import "no"/.test(s); import "./yes";"#;
        assert_eq!(specs(source), vec!["./yes"]);
    }

    #[test]
    fn test_escaped_quotes_in_specifier_scan() {
        let source = r#"const s = "a\"b"; import "./real";"#;
        assert_eq!(specs(source), vec!["./real"]);
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = analyze(r#"const s = "abc"#).unwrap_err();
        assert_eq!(err.kind, AnalyzeErrorKind::UnterminatedString);
    }

    #[test]
    fn test_unterminated_template_is_error() {
        let err = analyze("const s = `abc ${ x }").unwrap_err();
        assert_eq!(err.kind, AnalyzeErrorKind::UnterminatedTemplate);
    }

    #[test]
    fn test_unterminated_block_comment_is_error() {
        let err = analyze("/* never closed").unwrap_err();
        assert_eq!(err.kind, AnalyzeErrorKind::UnterminatedComment);
    }

    #[test]
    fn test_unbalanced_braces_are_errors() {
        assert_eq!(
            analyze("function f() {").unwrap_err().kind,
            AnalyzeErrorKind::UnbalancedBrace
        );
        assert_eq!(analyze("}").unwrap_err().kind, AnalyzeErrorKind::UnbalancedBrace);
        assert_eq!(analyze("call(a").unwrap_err().kind, AnalyzeErrorKind::UnbalancedParen);
    }

    #[test]
    fn test_record_offsets_slice_source() {
        let source = r#"import { one } from "./offsets.js";"#;
        let out = analyze(source).unwrap();
        let rec = out.imports[0];
        assert_eq!(&source[rec.start..rec.end], "./offsets.js");
    }

    #[test]
    fn test_empty_source() {
        let out = analyze("").unwrap();
        assert!(out.imports.is_empty());
        assert!(out.exports.is_empty());
    }

    #[test]
    fn test_imports_in_source_order() {
        let source = "import './a'; import './b'; const x = import('./c');";
        assert_eq!(specs(source), vec!["./a", "./b", "./c"]);
    }
}
