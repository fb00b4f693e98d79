//! Finite-interval checks for definite integrals.
//!
//! `F(b) - F(a)` is the value of the integral only when the antiderivative
//! stays finite and continuous on `[a, b]`. A singularity can only sit
//! where a guard expression vanishes: the base of a negative power, the
//! argument of `log`, or `cos(u)` under `tan(u)`. Guards are scanned for
//! roots on a grid, and the antiderivative's one-sided limits are sampled
//! at each root.

use tracing::debug;

use crate::error::{MathError, MathResult};
use crate::expr::{Bindings, Expr, Function, Variable};

/// Grid segments used to scan the interval.
const SEGMENTS: usize = 1024;

/// Distances from a root, relative to its magnitude, where limits are sampled.
const LIMIT_STEPS: [f64; 3] = [1e-6, 1e-9, 1e-12];

/// Relative change between the two nearest samples allowed for a limit.
const LIMIT_TOLERANCE: f64 = 1e-3;

/// Relative gap allowed between the left and right limits.
const JUMP_TOLERANCE: f64 = 1e-4;

/// Guard values this close to zero count as roots.
const ROOT_TOLERANCE: f64 = 1e-12;

const BISECTION_STEPS: usize = 128;

/// Refuse an interval on which `primitive` does not give a finite value for
/// the integral of `integrand`.
///
/// Integrals with symbolic bounds or extra free variables are not checked.
pub(crate) fn check_interval(
    integrand: &Expr,
    primitive: &Expr,
    var: Variable,
    lower: &Expr,
    upper: &Expr,
) -> MathResult<()> {
    let symbolic = integrand.free_variables().iter().any(|v| *v != var)
        || !lower.free_variables().is_empty()
        || !upper.free_variables().is_empty();
    if symbolic {
        debug!(integrand = %integrand, "symbolic integral, interval not checked");
        return Ok(());
    }

    let a = lower.eval(&Bindings::new())?;
    let b = upper.eval(&Bindings::new())?;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == hi {
        return Ok(());
    }
    let interval = format!("[{}, {}]", lower, upper);

    let step = (hi - lo) / SEGMENTS as f64;
    let grid: Vec<f64> = (0..=SEGMENTS)
        .map(|i| if i == SEGMENTS { hi } else { lo + step * i as f64 })
        .collect();

    let mut guards = Vec::new();
    collect_guards(integrand, var, &mut guards);
    collect_guards(primitive, var, &mut guards);
    guards.sort();
    guards.dedup();

    let roots: Vec<f64> = guards
        .iter()
        .flat_map(|guard| guard_roots(guard, var, &grid))
        .collect();
    for &root in &roots {
        if !has_limits(primitive, var, root, lo, hi) {
            debug!(integrand = %integrand, root, "singular point inside interval");
            return Err(MathError::Divergent { interval });
        }
    }

    for pair in grid.windows(2) {
        let t = (pair[0] + pair[1]) / 2.0;
        if roots.iter().any(|root| (root - t).abs() <= step) {
            continue;
        }
        let at = Bindings::new().with(var, t);
        if integrand.eval(&at).is_err() || primitive.eval(&at).is_err() {
            return Err(MathError::evaluation(format!(
                "{} is not a real number everywhere on {}",
                integrand, interval
            )));
        }
    }
    Ok(())
}

fn collect_guards(expr: &Expr, var: Variable, out: &mut Vec<Expr>) {
    if expr.is_constant_in(var) {
        return;
    }
    match expr {
        Expr::Add(items) | Expr::Mul(items) => {
            for item in items {
                collect_guards(item, var, out);
            }
        }
        Expr::Pow(base, exp) => {
            if exp.as_number().is_some_and(|n| n.is_negative()) {
                out.push(without_abs(base));
            }
            collect_guards(base, var, out);
            collect_guards(exp, var, out);
        }
        Expr::Func(f, arg) => {
            match f {
                Function::Log => out.push(without_abs(arg)),
                Function::Tan => out.push(Expr::func(Function::Cos, (**arg).clone())),
                _ => {}
            }
            collect_guards(arg, var, out);
        }
        Expr::Num(_) | Expr::Const(_) | Expr::Var(_) => {}
    }
}

/// `abs(u)` vanishes exactly where `u` does, and `u` changes sign there.
fn without_abs(expr: &Expr) -> Expr {
    match expr {
        Expr::Func(Function::Abs, inner) => (**inner).clone(),
        _ => expr.clone(),
    }
}

fn guard_roots(guard: &Expr, var: Variable, grid: &[f64]) -> Vec<f64> {
    let value = |t: f64| guard.eval(&Bindings::new().with(var, t)).ok();
    let values: Vec<Option<f64>> = grid.iter().map(|&t| value(t)).collect();

    let mut roots = Vec::new();
    for (i, &t) in grid.iter().enumerate() {
        let Some(v) = values[i] else {
            continue;
        };
        if v.abs() <= ROOT_TOLERANCE {
            roots.push(t);
            continue;
        }
        if let Some(Some(next)) = values.get(i + 1) {
            if next.abs() > ROOT_TOLERANCE && v.signum() != next.signum() {
                roots.push(bisect(&value, t, grid[i + 1], v));
            }
        }
    }
    roots
}

fn bisect(value: &impl Fn(f64) -> Option<f64>, mut a: f64, mut b: f64, mut fa: f64) -> f64 {
    for _ in 0..BISECTION_STEPS {
        let mid = (a + b) / 2.0;
        if mid <= a.min(b) || mid >= a.max(b) {
            break;
        }
        match value(mid) {
            Some(v) if v == 0.0 => return mid,
            Some(v) if v.signum() == fa.signum() => {
                a = mid;
                fa = v;
            }
            Some(_) => b = mid,
            None => break,
        }
    }
    (a + b) / 2.0
}

/// Whether `primitive` has matching finite one-sided limits at `root`,
/// looking only from inside `[lo, hi]`.
fn has_limits(primitive: &Expr, var: Variable, root: f64, lo: f64, hi: f64) -> bool {
    let scale = root.abs().max(1.0);
    let mut limits = Vec::with_capacity(2);
    for side in [-1.0, 1.0] {
        let inside = if side < 0.0 { root > lo } else { root < hi };
        if !inside {
            continue;
        }
        let samples: MathResult<Vec<f64>> = LIMIT_STEPS
            .iter()
            .map(|h| primitive.eval(&Bindings::new().with(var, root + side * h * scale)))
            .collect();
        let Ok(samples) = samples else {
            return false;
        };
        let [.., near, nearest] = samples.as_slice() else {
            return false;
        };
        if (near - nearest).abs() > LIMIT_TOLERANCE * (1.0 + nearest.abs()) {
            return false;
        }
        limits.push(*nearest);
    }
    match limits.as_slice() {
        [left, right] => {
            (left - right).abs() <= JUMP_TOLERANCE * (1.0 + left.abs().max(right.abs()))
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integral::integrate;
    use crate::parser::parse;

    fn check(text: &str, lower: &str, upper: &str) -> MathResult<()> {
        let integrand = parse(text).unwrap();
        let primitive = integrate(&integrand, Variable::X).unwrap();
        check_interval(
            &integrand,
            &primitive,
            Variable::X,
            &parse(lower).unwrap(),
            &parse(upper).unwrap(),
        )
    }

    fn diverges(result: MathResult<()>) -> bool {
        matches!(result, Err(MathError::Divergent { .. }))
    }

    #[test]
    fn test_poles_inside_the_interval() {
        assert!(diverges(check("1/x^2", "-1", "1")));
        assert!(diverges(check("1/x", "-1", "2")));
        assert!(diverges(check("tan(x)", "0", "pi")));
        assert!(diverges(check("1/(x-3)", "0", "10")));
    }

    #[test]
    fn test_pole_at_a_bound() {
        assert!(diverges(check("1/x", "0", "1")));
        assert!(diverges(check("1/x^2", "1", "0")));
    }

    #[test]
    fn test_integrable_singularity_is_accepted() {
        assert_eq!(check("1/sqrt(x)", "0", "1"), Ok(()));
    }

    #[test]
    fn test_regular_intervals() {
        assert_eq!(check("1/x", "-2", "-1"), Ok(()));
        assert_eq!(check("tan(x)", "0", "1"), Ok(()));
        assert_eq!(check("1/(x^2+1)", "-10", "10"), Ok(()));
        assert_eq!(check("x^2", "2", "2"), Ok(()));
    }

    #[test]
    fn test_undefined_integrand() {
        let result = check("sqrt(x)", "-1", "1");
        assert!(matches!(result, Err(MathError::Evaluation { .. })));
        assert!(!diverges(result));
    }

    #[test]
    fn test_symbolic_bounds_are_not_checked() {
        assert_eq!(check("1/x", "-1", "y"), Ok(()));
    }

    #[test]
    fn test_guards() {
        let mut guards = Vec::new();
        collect_guards(&parse("log(abs(x)) + tan(2x) + x^3").unwrap(), Variable::X, &mut guards);
        guards.sort();
        let mut expected = vec![parse("x").unwrap(), parse("cos(2x)").unwrap()];
        expected.sort();
        assert_eq!(guards, expected);
    }
}
