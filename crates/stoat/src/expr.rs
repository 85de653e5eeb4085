// Expression parsing — the tiny infix-function language of elementwise nodes
//
// An elementwise node carries its computation as a string such as
// `add(mul(@0,@1),@2)`: `add` and `mul` are the two binary functions, and
// `@n` references the node's n-th input operand. The tokenizer produces a
// flat token list, the recursive-descent parser builds a binary tree, and
// the tree is flattened left-right-node so a single stack pass evaluates it.

use stoat_core::{Error, Result};

/// Kind of one lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Add,
    Mul,
    LeftParen,
    RightParen,
    Comma,
    /// `@` followed by one or more digits; the digits are the operand index.
    Number,
}

/// One token with its span in the expression string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// One step of the flattened post-order evaluation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprStep {
    /// Push the batch of the referenced input operand.
    Ref(usize),
    /// Pop two operand batches, push their elementwise sum.
    Add,
    /// Pop two operand batches, push their elementwise product.
    Mul,
}

/// Binary AST node produced by the parser.
enum ExprNode {
    Ref(usize),
    Add(Box<ExprNode>, Box<ExprNode>),
    Mul(Box<ExprNode>, Box<ExprNode>),
}

/// Tokenizer and recursive-descent parser for one expression string.
pub struct ExpressionParser {
    expression: String,
    tokens: Vec<Token>,
    token_strs: Vec<String>,
}

impl ExpressionParser {
    pub fn new(expression: impl Into<String>) -> Self {
        ExpressionParser {
            expression: expression.into(),
            tokens: Vec::new(),
            token_strs: Vec::new(),
        }
    }

    /// The token strings produced by the last `tokenize`, for diagnostics.
    pub fn token_strs(&self) -> &[String] {
        &self.token_strs
    }

    /// The tokens produced by the last `tokenize`.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Split the expression into tokens. Leading whitespace is stripped;
    /// any character outside the grammar is a parse error.
    pub fn tokenize(&mut self) -> Result<()> {
        self.tokens.clear();
        self.token_strs.clear();

        let expression = self.expression.trim_start().to_string();
        if expression.is_empty() {
            return Err(Error::ExprParse {
                pos: 0,
                reason: "empty expression".to_string(),
            });
        }

        let bytes = expression.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'a' => {
                    self.keyword(bytes, i, "add", TokenKind::Add)?;
                    i += 3;
                }
                b'm' => {
                    self.keyword(bytes, i, "mul", TokenKind::Mul)?;
                    i += 3;
                }
                b'(' => {
                    self.push(TokenKind::LeftParen, i, i + 1, "(");
                    i += 1;
                }
                b')' => {
                    self.push(TokenKind::RightParen, i, i + 1, ")");
                    i += 1;
                }
                b',' => {
                    self.push(TokenKind::Comma, i, i + 1, ",");
                    i += 1;
                }
                b'@' => {
                    let mut j = i + 1;
                    while j < bytes.len() && bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    if j == i + 1 {
                        return Err(Error::ExprParse {
                            pos: i,
                            reason: "'@' must be followed by digits".to_string(),
                        });
                    }
                    let digits = &expression[i + 1..j];
                    self.push(TokenKind::Number, i + 1, j, digits);
                    i = j;
                }
                c => {
                    return Err(Error::ExprParse {
                        pos: i,
                        reason: format!("unexpected character {:?}", c as char),
                    })
                }
            }
        }
        self.expression = expression;
        Ok(())
    }

    fn keyword(&mut self, bytes: &[u8], i: usize, word: &'static str, kind: TokenKind) -> Result<()> {
        if bytes.len() < i + word.len() || &bytes[i..i + word.len()] != word.as_bytes() {
            return Err(Error::ExprParse {
                pos: i,
                reason: format!("expected {:?}", word),
            });
        }
        self.push(kind, i, i + word.len(), word);
        Ok(())
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize, text: &str) {
        self.tokens.push(Token { kind, start, end });
        self.token_strs.push(text.to_string());
    }

    /// Parse the expression and flatten the tree into its post-order
    /// evaluation list. Tokenizes first if `tokenize` has not run yet.
    pub fn generate(&mut self) -> Result<Vec<ExprStep>> {
        if self.tokens.is_empty() {
            self.tokenize()?;
        }

        let mut index = 0;
        let root = self.parse_node(&mut index)?;
        if index + 1 != self.tokens.len() {
            return Err(Error::ExprParse {
                pos: self.tokens[index].end,
                reason: "trailing tokens after expression".to_string(),
            });
        }

        let mut steps = Vec::new();
        flatten_post_order(&root, &mut steps);
        Ok(steps)
    }

    /// Parse one node starting at `index`, leaving `index` on the node's
    /// last consumed token.
    fn parse_node(&self, index: &mut usize) -> Result<ExprNode> {
        let token = self.token_at(*index)?;
        match token.kind {
            TokenKind::Number => {
                let digits = &self.expression[token.start..token.end];
                let num = digits.parse::<usize>().map_err(|_| Error::ExprParse {
                    pos: token.start,
                    reason: format!("bad operand index {:?}", digits),
                })?;
                Ok(ExprNode::Ref(num))
            }
            TokenKind::Add | TokenKind::Mul => {
                *index += 1;
                self.expect(*index, TokenKind::LeftParen)?;
                *index += 1;
                let left = self.parse_operand(index)?;

                *index += 1;
                self.expect(*index, TokenKind::Comma)?;
                *index += 1;
                let right = self.parse_operand(index)?;

                *index += 1;
                self.expect(*index, TokenKind::RightParen)?;

                Ok(match token.kind {
                    TokenKind::Add => ExprNode::Add(Box::new(left), Box::new(right)),
                    _ => ExprNode::Mul(Box::new(left), Box::new(right)),
                })
            }
            _ => Err(Error::ExprParse {
                pos: token.start,
                reason: "expected 'add', 'mul', or an operand reference".to_string(),
            }),
        }
    }

    /// An operand position admits a leaf or a nested call, nothing else.
    fn parse_operand(&self, index: &mut usize) -> Result<ExprNode> {
        let token = self.token_at(*index)?;
        match token.kind {
            TokenKind::Number | TokenKind::Add | TokenKind::Mul => self.parse_node(index),
            _ => Err(Error::ExprParse {
                pos: token.start,
                reason: "operand must be a reference or a nested call".to_string(),
            }),
        }
    }

    fn token_at(&self, index: usize) -> Result<Token> {
        self.tokens.get(index).copied().ok_or_else(|| Error::ExprParse {
            pos: self.expression.len(),
            reason: "unexpected end of expression".to_string(),
        })
    }

    fn expect(&self, index: usize, kind: TokenKind) -> Result<()> {
        let token = self.token_at(index)?;
        if token.kind != kind {
            return Err(Error::ExprParse {
                pos: token.start,
                reason: format!("expected {:?}, got {:?}", kind, token.kind),
            });
        }
        Ok(())
    }
}

/// Left, right, then node, so a stack evaluator sees operands before their
/// operator.
fn flatten_post_order(node: &ExprNode, steps: &mut Vec<ExprStep>) {
    match node {
        ExprNode::Ref(num) => steps.push(ExprStep::Ref(*num)),
        ExprNode::Add(left, right) => {
            flatten_post_order(left, steps);
            flatten_post_order(right, steps);
            steps.push(ExprStep::Add);
        }
        ExprNode::Mul(left, right) => {
            flatten_post_order(left, steps);
            flatten_post_order(right, steps);
            steps.push(ExprStep::Mul);
        }
    }
}
