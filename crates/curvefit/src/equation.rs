//! Parsed model equations.
//!
//! An [`Equation`] is an arithmetic expression over named symbols, such as
//! `a * x ^ 3 + b * y ^ 2 + c * z`. Symbols bound by a data column are
//! independent variables; every other symbol is a parameter to fit.
//!
//! Symbols are listed in order of first appearance in the source text, so the
//! parameter order is a pure function of the equation and the data keys.
//!
//! Arithmetic is over reals throughout: integer literals are read as floats,
//! so `1/2` is `0.5`, and `**` is accepted as a synonym for `^`.

use std::{collections::BTreeMap, fmt};

use evalexpr::{ContextWithMutableVariables, HashMapContext, Node, Value as ExprValue};

use crate::Error;

/// Independent-variable columns, keyed by symbol.
pub type Data = BTreeMap<String, Vec<f64>>;

/// A parsed equation, ready to evaluate.
#[derive(Debug, Clone)]
pub struct Equation {
    source: String,
    tree: Node,
    symbols: Vec<String>,
}

impl Equation {
    /// Parses `source`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if `source` is not a valid expression.
    pub fn parse(source: &str) -> Result<Self, Error> {
        let tree = evalexpr::build_operator_tree(&real_arithmetic(source)).map_err(|error| {
            Error::Parse {
                equation: source.to_owned(),
                source: error,
            }
        })?;

        let mut symbols: Vec<String> = Vec::new();
        for identifier in tree.iter_variable_identifiers() {
            if !symbols.iter().any(|s| s == identifier) {
                symbols.push(identifier.to_owned());
            }
        }

        Ok(Self {
            source: source.to_owned(),
            tree,
            symbols,
        })
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Every symbol in the equation, in order of first appearance.
    #[must_use]
    pub fn free_symbols(&self) -> &[String] {
        &self.symbols
    }

    /// The symbols not bound by a column of `data`, in order of first appearance.
    #[must_use]
    pub fn parameters(&self, data: &Data) -> Vec<String> {
        self.symbols
            .iter()
            .filter(|symbol| !data.contains_key(*symbol))
            .cloned()
            .collect()
    }

    /// Evaluates the equation once per row.
    ///
    /// `names` and `values` give the parameter values. Each data column
    /// supplies its value at the current row; a single-value column applies
    /// to every row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ParameterCount`] if `names` and `values` differ in
    /// length, or [`Error::Evaluation`] if a row does not evaluate to a number.
    pub fn predict(
        &self,
        names: &[String],
        values: &[f64],
        data: &Data,
        rows: usize,
    ) -> Result<Vec<f64>, Error> {
        if names.len() != values.len() {
            return Err(Error::ParameterCount {
                got: values.len(),
                expected: names.len(),
            });
        }

        let mut context = HashMapContext::new();
        let at_row = |row: usize, source| Error::Evaluation { row, source };

        for (name, value) in names.iter().zip(values) {
            context
                .set_value(name.clone(), ExprValue::Float(*value))
                .map_err(|e| at_row(0, e))?;
        }

        (0..rows)
            .map(|row| {
                for (name, column) in data {
                    let value = match column.as_slice() {
                        [value] => *value,
                        column => *column.get(row).ok_or_else(|| Error::DataLength {
                            name: name.clone(),
                            got: column.len(),
                            expected: rows,
                        })?,
                    };
                    context
                        .set_value(name.clone(), ExprValue::Float(value))
                        .map_err(|e| at_row(row, e))?;
                }
                self.tree
                    .eval_number_with_context(&context)
                    .map_err(|e| at_row(row, e))
            })
            .collect()
    }
}

/// Rewrites integer literals as floats and `**` as `^`.
///
/// Digits that continue an identifier, as in `x1`, are left alone.
fn real_arithmetic(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 8);
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_alphabetic() || c == '_' {
            out.push(c);
            while let Some(&next) = chars.peek() {
                if !(next.is_alphanumeric() || next == '_') {
                    break;
                }
                out.push(next);
                chars.next();
            }
        } else if c.is_ascii_digit()
            || (c == '.' && chars.peek().is_some_and(char::is_ascii_digit))
        {
            let mut real = c == '.';
            out.push(c);
            while let Some(&next) = chars.peek() {
                match next {
                    '0'..='9' => {}
                    '.' => real = true,
                    'e' | 'E' => {
                        real = true;
                        out.push(next);
                        chars.next();
                        if let Some(&sign @ ('+' | '-')) = chars.peek() {
                            out.push(sign);
                            chars.next();
                        }
                        continue;
                    }
                    _ => break,
                }
                out.push(next);
                chars.next();
            }
            if !real {
                out.push_str(".0");
            }
        } else if c == '*' && chars.peek() == Some(&'*') {
            chars.next();
            out.push('^');
        } else {
            out.push(c);
        }
    }
    out
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
