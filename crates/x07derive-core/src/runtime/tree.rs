//! The parenthesized tree format.
//!
//! ```text
//! tree    := atom | "(" sep* ( tree ( sep* tree )* )? sep* ")"
//! sep     := whitespace | ";" comment to end of line
//! atom    := bare | quoted
//! bare    := 1+ chars, none of whitespace ( ) " ;
//! quoted  := '"' ( \" | \\ | \n | \t | \r | other )* '"'
//! ```
//!
//! [`Tree::render`] is canonical: bare atoms whenever the text allows it,
//! single spaces between children, no trailing newline.

use std::fmt;

/// Deepest list nesting [`Tree::parse`] accepts.
pub const MAX_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tree {
    Atom(String),
    List(Vec<Tree>),
}

impl Tree {
    pub fn atom(s: impl Into<String>) -> Tree {
        Tree::Atom(s.into())
    }

    pub fn list(items: impl IntoIterator<Item = Tree>) -> Tree {
        Tree::List(items.into_iter().collect())
    }

    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Tree::Atom(s) => Some(s),
            Tree::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Tree]> {
        match self {
            Tree::List(items) => Some(items),
            Tree::Atom(_) => None,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        match self {
            Tree::Atom(s) => render_atom(s, out),
            Tree::List(items) => {
                out.push('(');
                for (idx, it) in items.iter().enumerate() {
                    if idx > 0 {
                        out.push(' ');
                    }
                    it.render_into(out);
                }
                out.push(')');
            }
        }
    }

    /// Parses exactly one tree, surrounded by optional separators.
    pub fn parse(src: &str) -> Result<Tree, TreeParseError> {
        let mut p = Parser { src, pos: 0, depth: 0 };
        p.skip_separators();
        let tree = p.tree()?;
        p.skip_separators();
        if p.pos != src.len() {
            return Err(p.error("trailing input after tree"));
        }
        Ok(tree)
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn is_bare_char(c: char) -> bool {
    !(c.is_whitespace() || c.is_control() || matches!(c, '(' | ')' | '"' | ';' | '\\'))
}

fn render_atom(s: &str, out: &mut String) {
    if !s.is_empty() && s.chars().all(is_bare_char) {
        out.push_str(s);
        return;
    }
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeParseError {
    /// Byte offset into the input.
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for TreeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree parse error at byte {}: {}", self.offset, self.message)
    }
}

impl std::error::Error for TreeParseError {}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> TreeParseError {
        TreeParseError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == ';' {
                while let Some(c) = self.bump() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn tree(&mut self) -> Result<Tree, TreeParseError> {
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('(') => {
                if self.depth == MAX_DEPTH {
                    return Err(self.error(format!("lists nested deeper than {MAX_DEPTH}")));
                }
                self.bump();
                self.depth += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_separators();
                    match self.peek() {
                        None => return Err(self.error("unterminated list")),
                        Some(')') => {
                            self.bump();
                            self.depth -= 1;
                            return Ok(Tree::List(items));
                        }
                        Some(_) => items.push(self.tree()?),
                    }
                }
            }
            Some(')') => Err(self.error("unexpected `)`")),
            Some('"') => self.quoted(),
            Some(_) => self.bare(),
        }
    }

    fn bare(&mut self) -> Result<Tree, TreeParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';') {
                break;
            }
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("expected atom"));
        }
        Ok(Tree::Atom(self.src[start..self.pos].to_string()))
    }

    fn quoted(&mut self) -> Result<Tree, TreeParseError> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(Tree::Atom(s)),
                Some('\\') => match self.bump() {
                    Some('"') => s.push('"'),
                    Some('\\') => s.push('\\'),
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some(other) => return Err(self.error(format!("unknown escape `\\{other}`"))),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) => s.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_canonically() {
        let t = Tree::list([
            Tree::atom("Node"),
            Tree::list([Tree::atom("x"), Tree::atom("1")]),
            Tree::atom("two words"),
            Tree::atom(""),
            Tree::list([]),
        ]);
        assert_eq!(t.render(), "(Node (x 1) \"two words\" \"\" ())");
    }

    #[test]
    fn parses_comments_and_whitespace() {
        let src = "  ; leading comment\n(a\t(b \"c d\") ; trailing\n  ())\n";
        let t = Tree::parse(src).expect("parse");
        assert_eq!(
            t,
            Tree::list([
                Tree::atom("a"),
                Tree::list([Tree::atom("b"), Tree::atom("c d")]),
                Tree::list([]),
            ])
        );
    }

    #[test]
    fn parses_its_own_rendering() {
        let t = Tree::list([
            Tree::atom("q\"uote"),
            Tree::atom("back\\slash"),
            Tree::atom("new\nline"),
            Tree::atom("semi;colon"),
            Tree::atom("(paren)"),
            Tree::atom("λ"),
        ]);
        assert_eq!(Tree::parse(&t.render()).expect("parse"), t);
    }

    #[test]
    fn reports_errors_with_offsets() {
        assert_eq!(Tree::parse("(a b").unwrap_err().message, "unterminated list");
        assert_eq!(Tree::parse("a b").unwrap_err().offset, 2);
        assert!(Tree::parse(")").is_err());
        assert!(Tree::parse("\"abc").is_err());
        assert!(Tree::parse("").is_err());
    }

    #[test]
    fn rejects_nesting_past_the_limit() {
        let ok = format!("{}{}", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(Tree::parse(&ok).is_ok());

        let err = Tree::parse(&"(".repeat(1_000_000)).unwrap_err();
        assert_eq!(err.offset, MAX_DEPTH);
        assert!(err.message.contains("nested deeper"), "{}", err.message);

        let deep = format!("{}{}", "(".repeat(MAX_DEPTH + 1), ")".repeat(MAX_DEPTH + 1));
        assert!(Tree::parse(&deep).is_err());
    }
}
