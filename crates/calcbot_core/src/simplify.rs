//! Canonical constructors.
//!
//! Every `Expr` is built bottom-up through these four functions, each of
//! which assumes its inputs are already canonical:
//! - sums are flat, numeric terms folded, like terms collected;
//! - products are flat, numeric factors folded, like bases collected,
//!   a numeric coefficient distributed over a lone sum;
//! - powers and functions fold exact special values.

use std::cmp::Ordering;

use crate::expr::{Constant, Expr, Function};
use crate::number::Number;

/// Largest integer exponent a sum is expanded to.
pub const MAX_EXPANSION_POWER: i64 = 8;

impl Expr {
    /// Canonical sum.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Expr {
        let mut constant = Number::ZERO;
        let mut collected: Vec<(Expr, Number)> = Vec::new();

        fn push(term: Expr, constant: &mut Number, collected: &mut Vec<(Expr, Number)>) {
            match term {
                Expr::Add(inner) => {
                    for t in inner {
                        push(t, constant, collected);
                    }
                }
                Expr::Num(n) => *constant = *constant + n,
                other => {
                    let (coeff, rest) = other.split_coefficient();
                    match collected.iter_mut().find(|(r, _)| *r == rest) {
                        Some((_, c)) => *c = *c + coeff,
                        None => collected.push((rest, coeff)),
                    }
                }
            }
        }

        for term in terms {
            push(term, &mut constant, &mut collected);
        }

        let mut out: Vec<Expr> = Vec::new();
        for (rest, coeff) in collected {
            if coeff.is_zero() {
                continue;
            }
            // scaling a canonical term by a number can't produce another sum
            match Expr::product([Expr::Num(coeff), rest]) {
                Expr::Add(inner) => out.extend(inner),
                Expr::Num(n) => constant = constant + n,
                term => out.push(term),
            }
        }

        if out.is_empty() {
            return Expr::Num(constant);
        }
        if !constant.is_zero() {
            out.push(Expr::Num(constant));
        }
        out.sort_by(term_order);
        if out.len() == 1 {
            out.pop().unwrap_or_else(Expr::zero)
        } else {
            Expr::Add(out)
        }
    }

    /// Canonical product.
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Expr {
        let mut coeff = Number::ONE;
        let mut bases: Vec<(Expr, Expr)> = Vec::new();
        let mut exp_args: Vec<Expr> = Vec::new();

        fn push(
            factor: Expr,
            coeff: &mut Number,
            bases: &mut Vec<(Expr, Expr)>,
            exp_args: &mut Vec<Expr>,
        ) {
            match factor {
                Expr::Mul(inner) => {
                    for f in inner {
                        push(f, coeff, bases, exp_args);
                    }
                }
                Expr::Num(n) => *coeff = *coeff * n,
                Expr::Func(Function::Exp, arg) => exp_args.push(*arg),
                Expr::Pow(base, exp) => add_exponent(bases, *base, *exp),
                other => add_exponent(bases, other, Expr::one()),
            }
        }

        fn add_exponent(bases: &mut Vec<(Expr, Expr)>, base: Expr, exp: Expr) {
            match bases.iter_mut().find(|(b, _)| *b == base) {
                Some((_, e)) => *e = Expr::sum([e.clone(), exp]),
                None => bases.push((base, exp)),
            }
        }

        for factor in factors {
            push(factor, &mut coeff, &mut bases, &mut exp_args);
        }

        let mut out: Vec<Expr> = Vec::new();
        let mut rebuilt: Vec<Expr> = bases
            .into_iter()
            .map(|(base, exp)| Expr::pow(base, exp))
            .collect();
        if !exp_args.is_empty() {
            rebuilt.push(Expr::func(Function::Exp, Expr::sum(exp_args)));
        }
        for factor in rebuilt {
            match factor {
                Expr::Num(n) => coeff = coeff * n,
                Expr::Mul(inner) => {
                    for f in inner {
                        match f {
                            Expr::Num(n) => coeff = coeff * n,
                            other => out.push(other),
                        }
                    }
                }
                other => out.push(other),
            }
        }

        if coeff.is_zero() || out.is_empty() {
            return Expr::Num(coeff);
        }
        out.sort();

        if !coeff.is_one() {
            // 2*(x + 1) -> 2*x + 2
            if let [Expr::Add(terms)] = out.as_slice() {
                return Expr::sum(
                    terms
                        .iter()
                        .map(|t| Expr::product([Expr::Num(coeff), t.clone()])),
                );
            }
            out.insert(0, Expr::Num(coeff));
        }
        if out.len() == 1 {
            out.pop().unwrap_or_else(Expr::one)
        } else {
            Expr::Mul(out)
        }
    }

    /// Canonical power.
    pub fn pow(base: Expr, exp: Expr) -> Expr {
        if let Some(e) = exp.as_number() {
            if e.is_zero() && e.is_exact() {
                return Expr::one();
            }
            if e.is_one() {
                return base;
            }
        }

        match (&base, &exp) {
            (Expr::Num(b), Expr::Num(e)) => match b.pow(e) {
                Some(n) => Expr::Num(n),
                None if b.is_zero() && e.is_positive() => Expr::zero(),
                None => Expr::Pow(Box::new(base), Box::new(exp)),
            },
            (Expr::Num(b), _) if b.is_one() => Expr::one(),
            (Expr::Const(Constant::E), _) => Expr::func(Function::Exp, exp),
            (Expr::Func(Function::Exp, arg), _) => {
                Expr::func(Function::Exp, Expr::product([(**arg).clone(), exp]))
            }
            (Expr::Pow(inner_base, inner_exp), Expr::Num(e)) if e.as_integer().is_some() => {
                Expr::pow(
                    (**inner_base).clone(),
                    Expr::product([(**inner_exp).clone(), exp]),
                )
            }
            (Expr::Mul(factors), Expr::Num(e)) if e.as_integer().is_some() => {
                Expr::product(factors.iter().map(|f| Expr::pow(f.clone(), exp.clone())))
            }
            _ => Expr::Pow(Box::new(base), Box::new(exp)),
        }
    }

    /// Canonical function application.
    pub fn func(f: Function, arg: Expr) -> Expr {
        if f == Function::Sqrt {
            return Expr::pow(arg, Expr::Num(Number::HALF));
        }

        // symmetry: pull a negative coefficient out of odd/even functions
        if (f.is_odd() || f.is_even()) && !matches!(arg, Expr::Add(_)) {
            let (coeff, _) = arg.split_coefficient();
            if coeff.is_negative() {
                let flipped = -arg;
                return if f.is_odd() {
                    -Expr::func(f, flipped)
                } else {
                    Expr::func(f, flipped)
                };
            }
        }

        if let Some(value) = special_value(f, &arg) {
            return value;
        }

        if let Expr::Num(n) = arg {
            if !n.is_exact() {
                if let Some(v) = f.apply(n.to_f64()) {
                    return Expr::Num(Number::float(v));
                }
            }
        }

        match (f, &arg) {
            (Function::Exp, Expr::Func(Function::Log, inner)) => (**inner).clone(),
            (Function::Log, Expr::Func(Function::Exp, inner)) => (**inner).clone(),
            (Function::Abs, Expr::Func(Function::Abs, _)) => arg,
            (Function::Abs, Expr::Const(_)) => arg,
            (Function::Abs, Expr::Func(Function::Exp, _)) => arg,
            _ => Expr::Func(f, Box::new(arg)),
        }
    }

    /// Distribute products over sums and expand small positive integer
    /// powers of sums.
    pub fn expand(&self) -> Expr {
        match self {
            Expr::Add(terms) => Expr::sum(terms.iter().map(|t| t.expand())),
            Expr::Mul(factors) => factors
                .iter()
                .map(|f| f.expand())
                .fold(Expr::one(), |acc, f| distribute(&acc, &f)),
            Expr::Pow(base, exp) => {
                let expanded_base = base.expand();
                match (exp.as_number().and_then(|n| n.as_integer()), &expanded_base) {
                    (Some(n), Expr::Add(_)) if (2..=MAX_EXPANSION_POWER).contains(&n) => {
                        let mut acc = expanded_base.clone();
                        for _ in 1..n {
                            acc = distribute(&acc, &expanded_base);
                        }
                        acc
                    }
                    _ => Expr::pow(expanded_base, (**exp).clone()),
                }
            }
            _ => self.clone(),
        }
    }

    /// Rough polynomial degree, used to order sum terms for display.
    pub(crate) fn degree(&self) -> Number {
        match self {
            Expr::Num(_) | Expr::Const(_) => Number::ZERO,
            Expr::Var(_) => Number::ONE,
            Expr::Add(terms) => terms
                .iter()
                .map(|t| t.degree())
                .max()
                .unwrap_or(Number::ZERO),
            Expr::Mul(factors) => factors
                .iter()
                .fold(Number::ZERO, |acc, f| acc + f.degree()),
            Expr::Pow(base, exp) => match exp.as_number() {
                Some(n) => base.degree() * n,
                None => base.degree(),
            },
            Expr::Func(..) => Number::ZERO,
        }
    }
}

fn terms_of(e: &Expr) -> Vec<Expr> {
    match e {
        Expr::Add(terms) => terms.clone(),
        other => vec![other.clone()],
    }
}

fn distribute(a: &Expr, b: &Expr) -> Expr {
    let left = terms_of(a);
    let right = terms_of(b);
    Expr::sum(
        left.iter()
            .flat_map(|l| right.iter().map(move |r| Expr::product([l.clone(), r.clone()]))),
    )
}

/// Sum terms print highest degree first, bare numbers last.
fn term_order(a: &Expr, b: &Expr) -> Ordering {
    b.degree()
        .cmp(&a.degree())
        .then_with(|| {
            matches!(a, Expr::Num(_)).cmp(&matches!(b, Expr::Num(_)))
        })
        .then_with(|| a.split_coefficient().1.cmp(&b.split_coefficient().1))
        .then_with(|| a.cmp(b))
}

fn special_value(f: Function, arg: &Expr) -> Option<Expr> {
    let pi = || Expr::Const(Constant::Pi);
    let half_pi = || Expr::product([Expr::Num(Number::HALF), pi()]);

    if let Expr::Num(n) = arg {
        if f == Function::Abs && n.is_exact() {
            return Some(Expr::Num(n.abs()));
        }
    }
    if arg.is_zero() {
        return match f {
            Function::Sin | Function::Tan | Function::Asin | Function::Atan | Function::Abs => {
                Some(Expr::zero())
            }
            Function::Cos | Function::Exp => Some(Expr::one()),
            Function::Acos => Some(half_pi()),
            _ => None,
        };
    }
    if arg.is_one() {
        return match f {
            Function::Log | Function::Acos => Some(Expr::zero()),
            Function::Asin => Some(half_pi()),
            Function::Atan => Some(Expr::product([Expr::rational(1, 4), pi()])),
            _ => None,
        };
    }
    if *arg == Expr::int(-1) && f == Function::Acos {
        return Some(pi());
    }
    if *arg == Expr::Const(Constant::E) && f == Function::Log {
        return Some(Expr::one());
    }

    let k = arg.pi_multiple()?;
    let twice = (k * Number::int(2)).as_integer()?;
    // twice is even: integer multiple of pi, odd: half-integer multiple
    match f {
        Function::Sin if twice % 2 == 0 => Some(Expr::zero()),
        Function::Sin => Some(Expr::int(if twice.rem_euclid(4) == 1 { 1 } else { -1 })),
        Function::Cos if twice % 2 != 0 => Some(Expr::zero()),
        Function::Cos => Some(Expr::int(if twice.rem_euclid(4) == 0 { 1 } else { -1 })),
        Function::Tan if twice % 2 == 0 => Some(Expr::zero()),
        _ => None,
    }
}
