//! Rule-based symbolic integration.
//!
//! Rules are tried in order: constants, linearity, constant factors,
//! integration by parts for `x^n * f(ax + b)`, powers and functions of
//! linear arguments, the arctangent form `1/(a*x^2 + c)`, and finally
//! expansion of products and small integer powers of sums. When nothing
//! matches the integrand is reported as having no closed form rather than
//! guessed at.

use tracing::debug;

use crate::convergence::check_interval;
use crate::derivative::differentiate;
use crate::error::{MathError, MathResult};
use crate::expr::{Expr, Function, Variable};
use crate::number::Number;

/// Highest power of the variable handled by integration by parts.
pub const MAX_PARTS_DEGREE: i64 = 8;

/// Recursion guard for nested rule applications.
const MAX_RULE_DEPTH: usize = 48;

/// Indefinite integral of `expr` with respect to `var`, additive constant omitted.
pub fn integrate(expr: &Expr, var: Variable) -> MathResult<Expr> {
    let primitive = antiderivative(expr, var, 0).ok_or_else(|| {
        debug!(expression = %expr, variable = %var, "no integration rule matched");
        MathError::NoClosedForm {
            expression: expr.to_string(),
            variable: var,
        }
    })?;
    primitive.within_size_limit()
}

/// Definite integral `F(upper) - F(lower)`.
///
/// Fails when the integrand has a non-integrable singularity on the closed
/// interval between the bounds, or is not real somewhere on it.
pub fn definite_integral(
    expr: &Expr,
    var: Variable,
    lower: &Expr,
    upper: &Expr,
) -> MathResult<Expr> {
    let primitive = integrate(expr, var)?;
    check_interval(expr, &primitive, var, lower, upper)?;
    (primitive.substitute(var, upper) - primitive.substitute(var, lower)).within_size_limit()
}

fn antiderivative(expr: &Expr, var: Variable, depth: usize) -> Option<Expr> {
    if depth > MAX_RULE_DEPTH {
        return None;
    }
    if expr.is_constant_in(var) {
        return Some(expr.clone() * Expr::Var(var));
    }
    match expr {
        Expr::Add(terms) => terms
            .iter()
            .map(|t| antiderivative(t, var, depth + 1))
            .collect::<Option<Vec<_>>>()
            .map(Expr::sum),
        Expr::Mul(factors) => product_antiderivative(expr, factors, var, depth),
        Expr::Var(_) => power_antiderivative(expr, expr, &Expr::one(), var, depth),
        Expr::Pow(base, exp) => power_antiderivative(expr, base, exp, var, depth),
        Expr::Func(f, arg) => function_antiderivative(*f, arg, var),
        Expr::Num(_) | Expr::Const(_) => None,
    }
}

/// `Some(a)` when `u = a*var + b` with `a` free of `var` and nonzero.
fn linear_slope(u: &Expr, var: Variable) -> Option<Expr> {
    let slope = differentiate(u, var);
    (!slope.is_zero() && slope.is_constant_in(var)).then_some(slope)
}

fn product_antiderivative(
    expr: &Expr,
    factors: &[Expr],
    var: Variable,
    depth: usize,
) -> Option<Expr> {
    let (constant, dependent): (Vec<Expr>, Vec<Expr>) = factors
        .iter()
        .cloned()
        .partition(|f| f.is_constant_in(var));

    if !constant.is_empty() {
        let rest = Expr::product(dependent);
        let integrated = antiderivative(&rest, var, depth + 1)?;
        return Some(Expr::product(constant) * integrated);
    }
    if let Some(result) = by_parts(&dependent, var, depth) {
        return Some(result);
    }
    expansion_fallback(expr, var, depth)
}

fn power_antiderivative(
    expr: &Expr,
    base: &Expr,
    exp: &Expr,
    var: Variable,
    depth: usize,
) -> Option<Expr> {
    if exp.is_constant_in(var) {
        let reciprocal = exp
            .as_number()
            .is_some_and(|n| n.to_f64() == -1.0);
        if let Some(slope) = linear_slope(base, var) {
            if reciprocal {
                // 1/(ax + b) -> log(|ax + b|)/a
                let log = Expr::func(Function::Log, Expr::func(Function::Abs, base.clone()));
                return Some(log / slope);
            }
            let raised = exp.clone() + Expr::one();
            return Some(Expr::pow(base.clone(), raised.clone()) / (raised * slope));
        }
        if reciprocal {
            if let Some(result) = arctangent_form(base, var) {
                return Some(result);
            }
        }
        return expansion_fallback(expr, var, depth);
    }

    if base.is_constant_in(var) {
        // a^(kx + b) -> a^(kx + b)/(k log(a))
        let slope = linear_slope(exp, var)?;
        let scale = Expr::func(Function::Log, base.clone()) * slope;
        return Some(Expr::pow(base.clone(), exp.clone()) / scale);
    }
    None
}

/// Whitelisted functions of a linear argument.
fn function_antiderivative(f: Function, u: &Expr, var: Variable) -> Option<Expr> {
    let slope = linear_slope(u, var)?;
    let u = u.clone();
    let square = Expr::pow(u.clone(), Expr::int(2));
    let sqrt_one_minus_square = Expr::pow(Expr::one() - square.clone(), Expr::Num(Number::HALF));

    let primitive = match f {
        Function::Sin => -Expr::func(Function::Cos, u),
        Function::Cos => Expr::func(Function::Sin, u),
        Function::Tan => -Expr::func(
            Function::Log,
            Expr::func(Function::Abs, Expr::func(Function::Cos, u)),
        ),
        Function::Exp => Expr::func(Function::Exp, u),
        Function::Log => u.clone() * Expr::func(Function::Log, u.clone()) - u,
        Function::Asin => u.clone() * Expr::func(Function::Asin, u) + sqrt_one_minus_square,
        Function::Acos => u.clone() * Expr::func(Function::Acos, u) - sqrt_one_minus_square,
        Function::Atan => {
            u.clone() * Expr::func(Function::Atan, u)
                - Expr::rational(1, 2) * Expr::func(Function::Log, Expr::one() + square)
        }
        Function::Sqrt => Expr::rational(2, 3) * Expr::pow(u, Expr::rational(3, 2)),
        Function::Abs => Expr::rational(1, 2) * u.clone() * Expr::func(Function::Abs, u),
    };
    Some(primitive / slope)
}

/// `1/(a*x^2 + c)` with positive exact `a` and `c`.
fn arctangent_form(base: &Expr, var: Variable) -> Option<Expr> {
    let Expr::Add(terms) = base else {
        return None;
    };
    let square = Expr::pow(Expr::Var(var), Expr::int(2));
    let mut quadratic = None;
    let mut constant = None;
    for term in terms {
        let (coeff, rest) = term.split_coefficient();
        if rest == square {
            quadratic = Some(coeff);
        } else if rest.is_one() {
            constant = Some(coeff);
        } else {
            return None;
        }
    }
    let (a, c) = (quadratic?, constant?);
    if !(a.is_exact() && c.is_exact() && a.is_positive() && c.is_positive()) {
        return None;
    }

    let half = Expr::Num(Number::HALF);
    let scale = Expr::pow(Expr::Num(a / c), half.clone());
    let norm = Expr::pow(Expr::Num(a * c), half);
    Some(Expr::func(Function::Atan, scale * Expr::Var(var)) / norm)
}

/// `x^n * f(ax + b)` for f in {sin, cos, exp}, reducing `n` by one per step.
fn by_parts(factors: &[Expr], var: Variable, depth: usize) -> Option<Expr> {
    let [first, second] = factors else {
        return None;
    };
    let (n, f) = match (monomial_degree(first, var), monomial_degree(second, var)) {
        (Some(n), None) => (n, second),
        (None, Some(n)) => (n, first),
        _ => return None,
    };
    if n > MAX_PARTS_DEGREE {
        return None;
    }
    let Expr::Func(Function::Sin | Function::Cos | Function::Exp, _) = f else {
        return None;
    };

    // ∫x^n f = x^n F - ∫n x^(n-1) F
    let integrated = antiderivative(f, var, depth + 1)?;
    let x = Expr::Var(var);
    let reduced = Expr::product([
        Expr::int(n),
        Expr::pow(x.clone(), Expr::int(n - 1)),
        integrated.clone(),
    ]);
    let rest = antiderivative(&reduced, var, depth + 1)?;
    Some(Expr::pow(x, Expr::int(n)) * integrated - rest)
}

fn monomial_degree(e: &Expr, var: Variable) -> Option<i64> {
    match e {
        Expr::Var(v) if *v == var => Some(1),
        Expr::Pow(base, exp) if **base == Expr::Var(var) => {
            exp.as_number()?.as_integer().filter(|n| *n >= 1)
        }
        _ => None,
    }
}

fn expansion_fallback(expr: &Expr, var: Variable, depth: usize) -> Option<Expr> {
    let expanded = expr.expand();
    if expanded == *expr {
        return None;
    }
    antiderivative(&expanded, var, depth + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use pretty_assertions::assert_eq;

    fn p(text: &str) -> Expr {
        parse(text).unwrap()
    }

    fn int(text: &str) -> Expr {
        integrate(&p(text), Variable::X).unwrap()
    }

    #[test]
    fn test_powers() {
        assert_eq!(int("x^2"), p("x^3/3"));
        assert_eq!(int("3x^2 + 2x + 1"), p("x^3 + x^2 + x"));
        assert_eq!(int("sqrt(x)"), p("2/3*x^(3/2)"));
        assert_eq!(int("1/x"), p("log(abs(x))"));
        assert_eq!(int("(2x+1)^3"), p("(2x+1)^4/8"));
    }

    #[test]
    fn test_constants() {
        assert_eq!(int("5"), p("5x"));
        assert_eq!(int("y"), p("x*y"));
        assert_eq!(int("pi*x"), p("pi*x^2/2"));
    }

    #[test]
    fn test_functions_of_linear_argument() {
        assert_eq!(int("sin(2x)"), p("-cos(2x)/2"));
        assert_eq!(int("cos(x)"), p("sin(x)"));
        assert_eq!(int("exp(3x+1)"), p("exp(3x+1)/3"));
        assert_eq!(int("2^x"), p("2^x/log(2)"));
        assert_eq!(int("log(x)"), p("x*log(x) - x"));
    }

    #[test]
    fn test_arctangent_form() {
        assert_eq!(int("1/(x^2+1)"), p("atan(x)"));
        assert_eq!(int("1/(4x^2+9)"), p("atan(2x/3)/6"));
    }

    #[test]
    fn test_by_parts() {
        assert_eq!(int("x*cos(x)"), p("x*sin(x) + cos(x)"));
        let expr = p("x^2*exp(x)");
        let primitive = integrate(&expr, Variable::X).unwrap();
        assert_eq!(differentiate(&primitive, Variable::X), expr);
    }

    #[test]
    fn test_expansion_fallback() {
        assert_eq!(int("(x+1)(x-1)"), p("x^3/3 - x"));
    }

    #[test]
    fn test_no_closed_form() {
        let err = integrate(&p("exp(x^2)"), Variable::X).unwrap_err();
        assert!(matches!(err, MathError::NoClosedForm { .. }));
        assert!(integrate(&p("sin(x)/x"), Variable::X).is_err());
    }

    #[test]
    fn test_definite() {
        let result = definite_integral(&p("x^2"), Variable::X, &p("0"), &p("1")).unwrap();
        assert_eq!(result, Expr::rational(1, 3));
        let result = definite_integral(&p("sin(x)"), Variable::X, &p("0"), &p("pi")).unwrap();
        assert_eq!(result, Expr::int(2));
        let result = definite_integral(&p("1/x"), Variable::X, &p("-2"), &p("-1")).unwrap();
        assert_eq!(result, p("-log(2)"));
        assert_eq!(result.to_string(), "-log(2)");
        let result = definite_integral(&p("1/sqrt(x)"), Variable::X, &p("0"), &p("1")).unwrap();
        assert_eq!(result, Expr::int(2));
    }

    #[test]
    fn test_divergent_definite() {
        for (integrand, lower, upper) in [
            ("1/x^2", "-1", "1"),
            ("tan(x)", "0", "pi"),
            ("1/x", "-1", "2"),
        ] {
            let err = definite_integral(&p(integrand), Variable::X, &p(lower), &p(upper))
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("integral diverges on [{}, {}]", lower, upper),
                "{}",
                integrand
            );
        }
    }
}
