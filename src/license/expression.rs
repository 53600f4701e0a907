use indexmap::IndexMap;

use crate::error::{ExpressionError, MismatchedLicenseNames};

/// Characters that can never appear in a license expression.
pub const DISALLOWED_CHARS: &[char] = &[
    '!', '@', '#', '$', '^', '&', '*', '=', '{', '}', '|', '[', ']', '\\', ':', ';', '<', '>',
    '?', ',', '/',
];

/// A parsed license expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Key(String),
    /// `license WITH exception`; both sides are license keys.
    With(String, String),
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    fn is_compound(&self) -> bool {
        matches!(self, Expr::And(_) | Expr::Or(_))
    }

    /// Keys in first-occurrence order, deduplicated.
    pub fn keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    /// Rebuild the expression with every key passed through `f`.
    pub fn map_keys(&self, f: &impl Fn(&str) -> String) -> Expr {
        match self {
            Expr::Key(key) => Expr::Key(f(key)),
            Expr::With(key, exception) => Expr::With(f(key), f(exception)),
            Expr::And(args) => Expr::And(args.iter().map(|a| a.map_keys(f)).collect()),
            Expr::Or(args) => Expr::Or(args.iter().map(|a| a.map_keys(f)).collect()),
        }
    }

    fn collect_keys(&self, out: &mut Vec<String>) {
        match self {
            Expr::Key(key) => push_unique(out, key),
            Expr::With(key, exception) => {
                push_unique(out, key);
                push_unique(out, exception);
            }
            Expr::And(args) | Expr::Or(args) => {
                for arg in args {
                    arg.collect_keys(out);
                }
            }
        }
    }
}

fn push_unique(out: &mut Vec<String>, key: &str) {
    if !out.iter().any(|k| k == key) {
        out.push(key.to_string());
    }
}

impl std::fmt::Display for Expr {
    /// Canonical rendering: uppercase operators, compound operands always
    /// parenthesized.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (args, operator) = match self {
            Expr::Key(key) => return write!(f, "{key}"),
            Expr::With(key, exception) => return write!(f, "{key} WITH {exception}"),
            Expr::And(args) => (args, " AND "),
            Expr::Or(args) => (args, " OR "),
        };
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                f.write_str(operator)?;
            }
            if arg.is_compound() {
                write!(f, "({arg})")?;
            } else {
                write!(f, "{arg}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Unsupported characters found in the raw expression. When non-empty,
    /// `keys` is empty and the resolution must be treated as failed.
    pub disallowed: Vec<char>,
    pub canonical: String,
    pub keys: Vec<String>,
}

impl Resolution {
    pub fn is_valid(&self) -> bool {
        self.disallowed.is_empty()
    }
}

/// Return the disallowed characters present in `expression`, in the order
/// of [`DISALLOWED_CHARS`].
pub fn detect_disallowed(expression: &str) -> Vec<char> {
    DISALLOWED_CHARS
        .iter()
        .copied()
        .filter(|c| expression.contains(*c))
        .collect()
}

/// Resolve a license expression into its canonical form and unique keys.
///
/// Disallowed characters short-circuit parsing and are reported through
/// [`Resolution::disallowed`]; grammar errors are returned as `Err`.
pub fn resolve(expression: &str) -> Result<Resolution, ExpressionError> {
    let disallowed = detect_disallowed(expression);
    if !disallowed.is_empty() {
        return Ok(Resolution {
            disallowed,
            canonical: expression.trim().to_string(),
            keys: Vec::new(),
        });
    }

    let expr = parse_tokens(expression)?;
    Ok(Resolution {
        disallowed,
        canonical: expr.to_string(),
        keys: expr.keys(),
    })
}

/// Parse `expression`, rejecting disallowed characters.
pub fn parse(expression: &str) -> Result<Expr, ExpressionError> {
    let disallowed = detect_disallowed(expression);
    if !disallowed.is_empty() {
        return Err(ExpressionError::DisallowedCharacters(disallowed));
    }
    parse_tokens(expression)
}

/// Canonical string form of `expression`.
pub fn canonicalize(expression: &str) -> Result<String, ExpressionError> {
    Ok(parse(expression)?.to_string())
}

/// Pair each key of `expression` with the display name at the same index.
pub fn pair_key_names(
    expression: &str,
    keys: &[String],
    names: &[String],
) -> Result<Vec<(String, String)>, MismatchedLicenseNames> {
    if keys.len() != names.len() {
        return Err(MismatchedLicenseNames {
            expression: expression.to_string(),
            keys: keys.len(),
            names: names.len(),
        });
    }
    Ok(keys.iter().cloned().zip(names.iter().cloned()).collect())
}

/// Replace every operand of `expression` found in `key_to_name` by its
/// display name. Operators and unknown operands are kept as they are.
pub fn replace_keys(expression: &str, key_to_name: &IndexMap<String, String>) -> String {
    expression
        .split_whitespace()
        .map(|segment| {
            let open = segment.len() - segment.trim_start_matches('(').len();
            let close = segment.len() - segment.trim_end_matches(')').len();
            if open + close >= segment.len() {
                return segment.to_string();
            }
            let core = &segment[open..segment.len() - close];
            match key_to_name.get(core) {
                Some(name) => format!("{}{}{}", &segment[..open], name, &segment[segment.len() - close..]),
                None => segment.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Tokenizer and parser
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Clone)]
enum Token {
    Id(String),
    And,
    Or,
    With,
    LParen,
    RParen,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Id(s) => s.clone(),
            Token::And => "AND".to_string(),
            Token::Or => "OR".to_string(),
            Token::With => "WITH".to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
        }
    }
}

/// Tokenize into `(token, byte offset)` pairs. Operators are case-insensitive.
fn tokenize(expr: &str) -> Vec<(Token, usize)> {
    let mut tokens = Vec::new();
    let mut chars = expr.char_indices().peekable();
    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '(' {
            tokens.push((Token::LParen, pos));
            chars.next();
        } else if c == ')' {
            tokens.push((Token::RParen, pos));
            chars.next();
        } else {
            let mut s = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_whitespace() || c == '(' || c == ')' {
                    break;
                }
                s.push(c);
                chars.next();
            }
            let token = match s.to_ascii_uppercase().as_str() {
                "AND" => Token::And,
                "OR" => Token::Or,
                "WITH" => Token::With,
                _ => Token::Id(s),
            };
            tokens.push((token, pos));
        }
    }
    tokens
}

/// Recursive descent parser; `AND` binds tighter than `OR`.
///
/// ```text
/// expr     := or_expr
/// or_expr  := and_expr ( "OR" and_expr )*
/// and_expr := atom ( "AND" atom )*
/// atom     := "(" expr ")" | id ( "WITH" id )?
/// ```
struct ExprParser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn consume(&mut self) -> Option<(Token, usize)> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut args = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.consume();
            args.push(self.parse_and()?);
        }
        Ok(collapse(args, Expr::Or))
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut args = vec![self.parse_atom()?];
        while matches!(self.peek(), Some(Token::And)) {
            self.consume();
            args.push(self.parse_atom()?);
        }
        Ok(collapse(args, Expr::And))
    }

    fn parse_atom(&mut self) -> Result<Expr, ExpressionError> {
        match self.consume() {
            Some((Token::LParen, _)) => {
                let inner = self.parse_or()?;
                match self.consume() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                        token: token.describe(),
                        position,
                    }),
                    None => Err(ExpressionError::UnbalancedParen),
                }
            }
            Some((Token::Id(key), _)) => {
                if !matches!(self.peek(), Some(Token::With)) {
                    return Ok(Expr::Key(key));
                }
                self.consume();
                match self.consume() {
                    Some((Token::Id(exception), _)) => Ok(Expr::With(key, exception)),
                    Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                        token: token.describe(),
                        position,
                    }),
                    None => Err(ExpressionError::UnexpectedEnd),
                }
            }
            Some((token, position)) => Err(ExpressionError::UnexpectedToken {
                token: token.describe(),
                position,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }
}

fn collapse(mut args: Vec<Expr>, build: fn(Vec<Expr>) -> Expr) -> Expr {
    if args.len() == 1 {
        args.remove(0)
    } else {
        build(args)
    }
}

fn parse_tokens(expression: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(expression);
    if tokens.is_empty() {
        return Err(ExpressionError::Empty);
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.consume() {
        None => Ok(expr),
        Some((Token::RParen, _)) => Err(ExpressionError::UnbalancedParen),
        Some((token, position)) => Err(ExpressionError::UnexpectedToken {
            token: token.describe(),
            position,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(expr: &str) -> Vec<String> {
        resolve(expr).unwrap().keys
    }

    #[test]
    fn test_single_key() {
        let r = resolve("mit").unwrap();
        assert!(r.is_valid());
        assert_eq!(r.canonical, "mit");
        assert_eq!(r.keys, vec!["mit"]);
    }

    #[test]
    fn test_operators_are_uppercased() {
        assert_eq!(canonicalize("mit or apache-2.0").unwrap(), "mit OR apache-2.0");
        assert_eq!(canonicalize("mit And bsd-new").unwrap(), "mit AND bsd-new");
    }

    #[test]
    fn test_keys_first_occurrence_unique() {
        assert_eq!(
            keys("gpl-2.0 OR (mit AND gpl-2.0) OR apache-2.0 AND mit"),
            vec!["gpl-2.0", "mit", "apache-2.0"]
        );
    }

    #[test]
    fn test_and_precedence_over_or() {
        assert_eq!(
            canonicalize("mit OR gpl-3.0 AND bsd-new").unwrap(),
            "mit OR (gpl-3.0 AND bsd-new)"
        );
        assert_eq!(
            canonicalize("(mit OR gpl-3.0) AND bsd-new").unwrap(),
            "(mit OR gpl-3.0) AND bsd-new"
        );
    }

    #[test]
    fn test_redundant_parentheses_dropped() {
        assert_eq!(canonicalize("((mit))").unwrap(), "mit");
        assert_eq!(canonicalize("( mit OR isc )").unwrap(), "mit OR isc");
    }

    #[test]
    fn test_with_exception() {
        let r = resolve("gpl-2.0 with classpath-exception-2.0 OR mit").unwrap();
        assert_eq!(r.canonical, "gpl-2.0 WITH classpath-exception-2.0 OR mit");
        assert_eq!(r.keys, vec!["gpl-2.0", "classpath-exception-2.0", "mit"]);
    }

    #[test]
    fn test_canonical_is_parse_stable() {
        let samples = [
            "mit",
            "mit or apache-2.0",
            "(mit or apache-2.0) and bsd-new",
            "mit and (isc or (zlib and bsd-simplified)) or gpl-2.0",
            "a and b and c",
            "a or (b or c)",
            "gpl-2.0 WITH classpath-exception-2.0 AND (mit OR x11)",
        ];
        for sample in samples {
            let first = resolve(sample).unwrap();
            let second = resolve(&first.canonical).unwrap();
            assert_eq!(second.canonical, first.canonical, "unstable for {sample}");
            assert_eq!(second.keys, first.keys);
        }
    }

    #[test]
    fn test_disallowed_characters() {
        let r = resolve("mit/apache-2.0, isc").unwrap();
        assert!(!r.is_valid());
        assert_eq!(r.disallowed, vec![',', '/']);
        assert!(r.keys.is_empty());

        assert_eq!(
            parse("mit & isc"),
            Err(ExpressionError::DisallowedCharacters(vec!['&']))
        );
    }

    #[test]
    fn test_grammar_errors() {
        assert_eq!(parse(""), Err(ExpressionError::Empty));
        assert_eq!(parse("   "), Err(ExpressionError::Empty));
        assert_eq!(parse("mit AND"), Err(ExpressionError::UnexpectedEnd));
        assert_eq!(parse("(mit OR isc"), Err(ExpressionError::UnbalancedParen));
        assert_eq!(parse("mit OR isc)"), Err(ExpressionError::UnbalancedParen));
        assert_eq!(
            parse("mit isc"),
            Err(ExpressionError::UnexpectedToken {
                token: "isc".to_string(),
                position: 4
            })
        );
        assert_eq!(
            parse("OR mit"),
            Err(ExpressionError::UnexpectedToken {
                token: "OR".to_string(),
                position: 0
            })
        );
    }

    #[test]
    fn test_pair_key_names_length_mismatch() {
        let keys = vec!["mit".to_string(), "isc".to_string()];
        let names = vec!["MIT License".to_string()];
        let err = pair_key_names("mit OR isc", &keys, &names).unwrap_err();
        assert_eq!(err.keys, 2);
        assert_eq!(err.names, 1);

        let pairs = pair_key_names("mit", &keys[..1], &names).unwrap();
        assert_eq!(pairs, vec![("mit".to_string(), "MIT License".to_string())]);
    }

    #[test]
    fn test_replace_keys() {
        let mut map = IndexMap::new();
        map.insert("mit".to_string(), "MIT License".to_string());
        map.insert("isc".to_string(), "ISC License".to_string());

        assert_eq!(replace_keys("mit", &map), "MIT License");
        assert_eq!(
            replace_keys("(mit OR isc) AND zlib", &map),
            "(MIT License OR ISC License) AND zlib"
        );
        assert_eq!(replace_keys("((mit))", &map), "((MIT License))");
        assert_eq!(replace_keys("()", &map), "()");
    }
}
