//! Symbolic expression tree over the whitelisted vocabulary.
//!
//! Expressions are only ever built through the canonical constructors in
//! [`crate::simplify`] (`Expr::sum`, `Expr::product`, `Expr::pow`,
//! `Expr::func`), so two mathematically identical inputs that differ
//! only in spelling (`x^2+3*x` vs `3x + x**2`) end up as equal trees.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::error::{MathError, MathResult};
use crate::number::Number;

/// Largest result, counted in tree nodes, that is worth rendering. Every
/// node prints as at least one character, so anything bigger cannot fit a
/// chat message.
pub const MAX_RESULT_SIZE: usize = 2_000;

/// The two free variables an expression may mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Variable {
    X,
    Y,
}

impl Variable {
    pub const ALL: [Variable; 2] = [Variable::X, Variable::Y];

    pub fn name(&self) -> &'static str {
        match self {
            Variable::X => "x",
            Variable::Y => "y",
        }
    }

    /// Parse a variable name exactly, ignoring surrounding whitespace.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "x" => Some(Variable::X),
            "y" => Some(Variable::Y),
            _ => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Named constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn value(&self) -> f64 {
        match self {
            Constant::Pi => std::f64::consts::PI,
            Constant::E => std::f64::consts::E,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Constant::Pi => "pi",
            Constant::E => "E",
        }
    }
}

/// Unary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Exp,
    Log,
    Sqrt,
    Abs,
}

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sqrt => "sqrt",
            Function::Abs => "abs",
        }
    }

    /// Evaluate over the reals. `None` outside the real domain.
    pub fn apply(&self, x: f64) -> Option<f64> {
        let value = match self {
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Asin => x.asin(),
            Function::Acos => x.acos(),
            Function::Atan => x.atan(),
            Function::Exp => x.exp(),
            Function::Log => x.ln(),
            Function::Sqrt => x.sqrt(),
            Function::Abs => x.abs(),
        };
        value.is_finite().then_some(value)
    }

    /// `f(-u) = -f(u)`
    pub(crate) fn is_odd(&self) -> bool {
        matches!(
            self,
            Function::Sin | Function::Tan | Function::Asin | Function::Atan
        )
    }

    /// `f(-u) = f(u)`
    pub(crate) fn is_even(&self) -> bool {
        matches!(self, Function::Cos | Function::Abs)
    }
}

/// A canonical symbolic expression.
///
/// Subtraction is a sum with a `-1` coefficient, division a product with a
/// negative power, and `sqrt(u)` is `u^(1/2)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Expr {
    Num(Number),
    Const(Constant),
    Var(Variable),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Func(Function, Box<Expr>),
}

/// Values for the free variables during numeric evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bindings {
    pub x: Option<f64>,
    pub y: Option<f64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, var: Variable, value: f64) -> Self {
        match var {
            Variable::X => self.x = Some(value),
            Variable::Y => self.y = Some(value),
        }
        self
    }

    pub fn get(&self, var: Variable) -> Option<f64> {
        match var {
            Variable::X => self.x,
            Variable::Y => self.y,
        }
    }
}

impl Expr {
    pub fn zero() -> Self {
        Expr::Num(Number::ZERO)
    }

    pub fn one() -> Self {
        Expr::Num(Number::ONE)
    }

    pub fn int(n: i64) -> Self {
        Expr::Num(Number::int(n))
    }

    pub fn rational(num: i64, den: i64) -> Self {
        Expr::Num(Number::rational(num, den))
    }

    pub fn var(v: Variable) -> Self {
        Expr::Var(v)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(n) if n.is_zero())
    }

    pub fn is_one(&self) -> bool {
        matches!(self, Expr::Num(n) if n.is_one())
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Expr::Num(n) => Some(*n),
            _ => None,
        }
    }

    /// Check if expression mentions a variable
    pub fn contains_var(&self, var: Variable) -> bool {
        match self {
            Expr::Num(_) | Expr::Const(_) => false,
            Expr::Var(v) => *v == var,
            Expr::Add(items) | Expr::Mul(items) => items.iter().any(|e| e.contains_var(var)),
            Expr::Pow(base, exp) => base.contains_var(var) || exp.contains_var(var),
            Expr::Func(_, arg) => arg.contains_var(var),
        }
    }

    pub fn is_constant_in(&self, var: Variable) -> bool {
        !self.contains_var(var)
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        match self {
            Expr::Num(_) | Expr::Const(_) | Expr::Var(_) => 1,
            Expr::Add(items) | Expr::Mul(items) => 1 + items.iter().map(Expr::size).sum::<usize>(),
            Expr::Pow(base, exp) => 1 + base.size() + exp.size(),
            Expr::Func(_, arg) => 1 + arg.size(),
        }
    }

    /// Fail with a validation error when the tree exceeds [`MAX_RESULT_SIZE`].
    pub(crate) fn within_size_limit(self) -> MathResult<Expr> {
        let size = self.size();
        if size > MAX_RESULT_SIZE {
            return Err(MathError::validation(format!(
                "the result is too large to show ({} terms)",
                size
            )));
        }
        Ok(self)
    }

    pub fn free_variables(&self) -> BTreeSet<Variable> {
        Variable::ALL
            .into_iter()
            .filter(|v| self.contains_var(*v))
            .collect()
    }

    /// Split into numeric coefficient and remaining factor: `-3*x^2` gives
    /// `(-3, x^2)`, a bare number `n` gives `(n, 1)`.
    pub fn split_coefficient(&self) -> (Number, Expr) {
        match self {
            Expr::Num(n) => (*n, Expr::one()),
            Expr::Mul(factors) => match factors.split_first() {
                Some((Expr::Num(c), rest)) => {
                    let rest = if rest.len() == 1 {
                        rest[0].clone()
                    } else {
                        Expr::Mul(rest.to_vec())
                    };
                    (*c, rest)
                }
                _ => (Number::ONE, self.clone()),
            },
            _ => (Number::ONE, self.clone()),
        }
    }

    /// Replace a variable and re-canonicalize.
    pub fn substitute(&self, var: Variable, replacement: &Expr) -> Expr {
        match self {
            Expr::Num(_) | Expr::Const(_) => self.clone(),
            Expr::Var(v) if *v == var => replacement.clone(),
            Expr::Var(_) => self.clone(),
            Expr::Add(terms) => Expr::sum(terms.iter().map(|t| t.substitute(var, replacement))),
            Expr::Mul(factors) => {
                Expr::product(factors.iter().map(|f| f.substitute(var, replacement)))
            }
            Expr::Pow(base, exp) => Expr::pow(
                base.substitute(var, replacement),
                exp.substitute(var, replacement),
            ),
            Expr::Func(f, arg) => Expr::func(*f, arg.substitute(var, replacement)),
        }
    }

    /// Evaluate numerically over the reals.
    pub fn eval(&self, bindings: &Bindings) -> MathResult<f64> {
        let value = match self {
            Expr::Num(n) => n.to_f64(),
            Expr::Const(c) => c.value(),
            Expr::Var(v) => bindings
                .get(*v)
                .ok_or_else(|| MathError::evaluation(format!("no value for {}", v)))?,
            Expr::Add(terms) => {
                let mut acc = 0.0;
                for term in terms {
                    acc += term.eval(bindings)?;
                }
                acc
            }
            Expr::Mul(factors) => {
                let mut acc = 1.0;
                for factor in factors {
                    acc *= factor.eval(bindings)?;
                }
                acc
            }
            Expr::Pow(base, exp) => base.eval(bindings)?.powf(exp.eval(bindings)?),
            Expr::Func(f, arg) => {
                let x = arg.eval(bindings)?;
                f.apply(x).ok_or_else(|| {
                    MathError::evaluation(format!("{}({}) is not a real number", f.name(), x))
                })?
            }
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(MathError::evaluation(format!("{} is not a finite real", self)))
        }
    }

    /// Coefficient of `k*pi`, if the expression is exactly a rational multiple of pi.
    pub(crate) fn pi_multiple(&self) -> Option<Number> {
        match self {
            Expr::Const(Constant::Pi) => Some(Number::ONE),
            Expr::Mul(factors) => match factors.as_slice() {
                [Expr::Num(k), Expr::Const(Constant::Pi)] if k.is_exact() => Some(*k),
                _ => None,
            },
            _ => None,
        }
    }

    /// Binding strength when printed: sums 1, products 2, powers 3, atoms 4.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(_) => 1,
            Expr::Mul(_) => 2,
            Expr::Num(n) if n.is_negative() => 2,
            Expr::Num(Number::Rational(_, d)) if *d != 1 => 2,
            Expr::Pow(_, exp) if exp.as_number().is_some_and(|n| n.is_negative()) => 2,
            Expr::Pow(_, exp) if exp.as_number() == Some(Number::HALF) => 4,
            Expr::Pow(..) => 3,
            _ => 4,
        }
    }

    fn fmt_wrapped(&self, f: &mut fmt::Formatter<'_>, min_precedence: u8) -> fmt::Result {
        if self.precedence() < min_precedence {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }

    fn fmt_sum(terms: &[Expr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, term) in terms.iter().enumerate() {
            let (coeff, rest) = term.split_coefficient();
            if i == 0 {
                write!(f, "{}", term)?;
            } else if coeff.is_negative() {
                write!(f, " - {}", Expr::product([Expr::Num(-coeff), rest]))?;
            } else {
                write!(f, " + {}", term)?;
            }
        }
        Ok(())
    }

    fn fmt_product(factors: &[Expr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut coeff = Number::ONE;
        let mut numerator = Vec::new();
        let mut denominator = Vec::new();
        for factor in factors {
            match factor {
                Expr::Num(n) => coeff = coeff * *n,
                Expr::Pow(base, exp) if exp.as_number().is_some_and(|n| n.is_negative()) => {
                    denominator.push(Expr::pow((**base).clone(), -(**exp).clone()));
                }
                other => numerator.push(other.clone()),
            }
        }

        if coeff.is_negative() {
            f.write_str("-")?;
            coeff = -coeff;
        }
        let (num_coeff, den_coeff) = match coeff {
            Number::Rational(n, d) => (Number::int(n), Number::int(d)),
            float => (float, Number::ONE),
        };

        let mut parts: Vec<String> = Vec::new();
        if !num_coeff.is_one() || numerator.is_empty() {
            parts.push(num_coeff.to_string());
        }
        for factor in &numerator {
            parts.push(if factor.precedence() < 2 {
                format!("({})", factor)
            } else {
                factor.to_string()
            });
        }
        f.write_str(&parts.join("*"))?;

        let mut below: Vec<String> = Vec::new();
        if !den_coeff.is_one() {
            below.push(den_coeff.to_string());
        }
        for factor in &denominator {
            below.push(if factor.precedence() < 3 {
                format!("({})", factor)
            } else {
                factor.to_string()
            });
        }
        match below.len() {
            0 => Ok(()),
            1 => write!(f, "/{}", below[0]),
            _ => write!(f, "/({})", below.join("*")),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(n) => write!(f, "{}", n),
            Expr::Const(c) => f.write_str(c.name()),
            Expr::Var(v) => f.write_str(v.name()),
            Expr::Add(terms) => Expr::fmt_sum(terms, f),
            Expr::Mul(factors) => Expr::fmt_product(factors, f),
            Expr::Pow(base, exp) => match exp.as_number() {
                Some(n) if n == Number::HALF => write!(f, "sqrt({})", base),
                Some(n) if n.is_negative() => Expr::fmt_product(std::slice::from_ref(self), f),
                _ => {
                    base.fmt_wrapped(f, 4)?;
                    f.write_str("^")?;
                    exp.fmt_wrapped(f, 4)
                }
            },
            Expr::Func(func, arg) => write!(f, "{}({})", func.name(), arg),
        }
    }
}

// Operator overloading goes through the canonical constructors
impl Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::sum([self, rhs])
    }
}

impl Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::sum([self, -rhs])
    }
}

impl Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::product([self, rhs])
    }
}

impl Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::product([self, Expr::pow(rhs, Expr::int(-1))])
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::product([Expr::int(-1), self])
    }
}

impl From<Variable> for Expr {
    fn from(v: Variable) -> Self {
        Expr::Var(v)
    }
}

impl From<Constant> for Expr {
    fn from(c: Constant) -> Self {
        Expr::Const(c)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::int(n)
    }
}
