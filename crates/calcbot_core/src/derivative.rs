//! Symbolic differentiation.

use tracing::debug;

use crate::error::MathResult;
use crate::expr::{Expr, Function, Variable};

/// Differentiate `expr` with respect to `var`.
pub fn differentiate(expr: &Expr, var: Variable) -> Expr {
    if expr.is_constant_in(var) {
        return Expr::zero();
    }
    match expr {
        Expr::Num(_) | Expr::Const(_) => Expr::zero(),
        Expr::Var(v) => {
            if *v == var {
                Expr::one()
            } else {
                Expr::zero()
            }
        }
        Expr::Add(terms) => Expr::sum(terms.iter().map(|t| differentiate(t, var))),
        Expr::Mul(factors) => product_rule(factors, var),
        Expr::Pow(base, exp) => power_rule(base, exp, var),
        Expr::Func(f, arg) => {
            let inner = differentiate(arg, var);
            if inner.is_zero() {
                return Expr::zero();
            }
            outer_derivative(*f, arg) * inner
        }
    }
}

/// The `order`-th derivative. Order zero returns the expression itself.
///
/// Stops with a validation error as soon as an intermediate derivative
/// grows past [`MAX_RESULT_SIZE`](crate::expr::MAX_RESULT_SIZE), before the next, larger one is computed.
pub fn nth_derivative(expr: &Expr, var: Variable, order: u32) -> MathResult<Expr> {
    let mut current = expr.clone();
    for step in 0..order {
        if current.is_zero() {
            break;
        }
        current = differentiate(&current, var)
            .within_size_limit()
            .inspect_err(|_| debug!(expression = %expr, step = step + 1, "derivative too large"))?;
    }
    Ok(current)
}

// (f1 f2 ... fn)' = sum over i of f1 ... fi' ... fn
fn product_rule(factors: &[Expr], var: Variable) -> Expr {
    let terms = factors.iter().enumerate().filter_map(|(i, factor)| {
        let d = differentiate(factor, var);
        if d.is_zero() {
            return None;
        }
        let others = factors
            .iter()
            .enumerate()
            .filter(move |(j, _)| *j != i)
            .map(|(_, f)| f.clone());
        Some(Expr::product(others.chain(std::iter::once(d))))
    });
    Expr::sum(terms)
}

fn power_rule(base: &Expr, exp: &Expr, var: Variable) -> Expr {
    let base_const = base.is_constant_in(var);
    let exp_const = exp.is_constant_in(var);

    if exp_const {
        // (u^n)' = n u^(n-1) u'
        let d_base = differentiate(base, var);
        Expr::product([
            exp.clone(),
            Expr::pow(base.clone(), exp.clone() - Expr::one()),
            d_base,
        ])
    } else if base_const {
        // (a^v)' = a^v log(a) v'
        Expr::product([
            Expr::pow(base.clone(), exp.clone()),
            Expr::func(Function::Log, base.clone()),
            differentiate(exp, var),
        ])
    } else {
        // (u^v)' = u^v (v' log(u) + v u'/u)
        let log_term = differentiate(exp, var) * Expr::func(Function::Log, base.clone());
        let ratio_term = Expr::product([
            exp.clone(),
            differentiate(base, var),
            Expr::pow(base.clone(), Expr::int(-1)),
        ]);
        Expr::pow(base.clone(), exp.clone()) * (log_term + ratio_term)
    }
}

/// `f'(u)` for a whitelisted function.
fn outer_derivative(f: Function, u: &Expr) -> Expr {
    let u = u.clone();
    let square = Expr::pow(u.clone(), Expr::int(2));
    match f {
        Function::Sin => Expr::func(Function::Cos, u),
        Function::Cos => -Expr::func(Function::Sin, u),
        Function::Tan => Expr::one() + Expr::pow(Expr::func(Function::Tan, u.clone()), Expr::int(2)),
        Function::Asin => Expr::pow(Expr::one() - square, Expr::rational(-1, 2)),
        Function::Acos => -Expr::pow(Expr::one() - square, Expr::rational(-1, 2)),
        Function::Atan => Expr::pow(Expr::one() + square, Expr::int(-1)),
        Function::Exp => Expr::func(Function::Exp, u),
        Function::Log => Expr::pow(u, Expr::int(-1)),
        Function::Sqrt => Expr::rational(1, 2) * Expr::pow(u, Expr::rational(-1, 2)),
        // d|u| = u/|u|, the chain factor is applied by the caller
        Function::Abs => u.clone() * Expr::pow(Expr::func(Function::Abs, u), Expr::int(-1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MathError;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn d(text: &str) -> Expr {
        differentiate(&parse(text).unwrap(), Variable::X)
    }

    fn p(text: &str) -> Expr {
        parse(text).unwrap()
    }

    #[test]
    fn test_polynomial() {
        assert_eq!(d("x^3 + 2x^2 - 5x + 7"), p("3x^2 + 4x - 5"));
        assert_eq!(d("x^2+3*x"), p("2x + 3"));
    }

    #[test]
    fn test_constants_vanish() {
        assert_eq!(d("pi^2 + E + 42"), Expr::zero());
        assert_eq!(d("y^3"), Expr::zero());
    }

    #[test]
    fn test_partial_derivative() {
        let expr = p("x^2*y + y^3");
        assert_eq!(differentiate(&expr, Variable::X), p("2x*y"));
        assert_eq!(differentiate(&expr, Variable::Y), p("x^2 + 3y^2"));
    }

    #[test]
    fn test_chain_rule() {
        assert_eq!(d("sin(2x)"), p("2cos(2x)"));
        assert_eq!(d("exp(x^2)"), p("2x*exp(x^2)"));
        assert_eq!(d("log(x)"), p("1/x"));
        assert_eq!(d("sqrt(x)"), p("1/(2*sqrt(x))"));
        assert_eq!(d("cos(x)"), p("-sin(x)"));
    }

    #[test]
    fn test_inverse_trig() {
        assert_eq!(d("atan(x)"), p("1/(1 + x^2)"));
        assert_eq!(d("asin(x)"), p("(1 - x^2)^(-1/2)"));
    }

    #[test]
    fn test_exponential_bases() {
        assert_eq!(d("2^x"), p("2^x*log(2)"));
        assert_eq!(d("x^x"), p("x^x*(log(x) + 1)"));
    }

    #[test]
    fn test_nth_derivative() {
        let expr = p("x^4");
        assert_eq!(nth_derivative(&expr, Variable::X, 2).unwrap(), p("12x^2"));
        assert_eq!(nth_derivative(&expr, Variable::X, 5).unwrap(), Expr::zero());
        assert_eq!(nth_derivative(&p("sin(x)"), Variable::X, 4).unwrap(), p("sin(x)"));
        assert_eq!(nth_derivative(&expr, Variable::X, 0).unwrap(), expr);
    }

    #[test]
    fn test_runaway_derivative_is_refused() {
        let started = std::time::Instant::now();
        let err = nth_derivative(&p("asin(x^x)"), Variable::X, 10).unwrap_err();
        assert!(matches!(err, MathError::Validation { .. }), "{:?}", err);
        assert!(err.to_string().starts_with("the result is too large to show"));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }
}
