//! Behavioural properties of the parser, calculus and rotation operations.

use calcbot_core::dispatch::field;
use calcbot_core::{
    differentiate, integrate, nth_derivative, parse, render_reply, run, EulerAngles, Expr,
    FormFields, IntegralRequest, Limits, MathError, MathOutput, Operation, RotationMatrix,
    Variable,
};
use pretty_assertions::assert_eq;

const WHITELISTED: &[&str] = &[
    "x^2 + 3x - 1",
    "sin(x)*cos(y)",
    "exp(2x)/3",
    "sqrt(x^2 + 1)",
    "1/(x + y)",
    "-x/2 + pi",
    "log(abs(x)) - atan(y)",
    "x^(3/2)",
    "2^x*E",
    "x*y^2 - 4",
    "cos(x)^2 + sin(x)^2",
    "0.5x",
    "x - 0.5",
    "asin(x) + acos(x) + tan(y)",
];

#[test]
fn whitelisted_expressions_round_trip_through_display() {
    for text in WHITELISTED {
        let expr = parse(text).unwrap_or_else(|e| panic!("{} failed to parse: {}", text, e));
        let printed = expr.to_string();
        let reparsed =
            parse(&printed).unwrap_or_else(|e| panic!("{} did not re-parse: {}", printed, e));
        assert_eq!(reparsed, expr, "round trip of {} via {}", text, printed);
    }
}

#[test]
fn identifiers_outside_the_whitelist_are_rejected() {
    for text in [
        "import os",
        "z",
        "exec(x)",
        "x + foo",
        "Symbol('x')",
        "__class__",
        "lambda",
        "open(x)",
    ] {
        assert!(parse(text).is_err(), "{} should be rejected", text);
    }
    assert_eq!(parse("x^2+3*x").unwrap(), parse("x**2 + 3*x").unwrap());
}

#[test]
fn constants_differentiate_to_zero_at_every_order() {
    for text in ["42", "pi^2", "sin(1)", "E + log(2)", "y^2 + y"] {
        let expr = parse(text).unwrap();
        for order in 1..=10 {
            assert_eq!(
                nth_derivative(&expr, Variable::X, order).unwrap(),
                Expr::zero(),
                "d^{}/dx^{} of {}",
                order,
                order,
                text
            );
        }
    }
}

#[test]
fn blank_order_means_first_derivative() {
    let limits = Limits::default();
    let with_order = |order: &str| {
        let fields = FormFields::new()
            .with(field::EXPRESSION, "x^3 + sin(x)")
            .with(field::VARIABLE, "x")
            .with(field::ORDER, order);
        run(Operation::Derivative, &fields, &limits)
    };
    let first = with_order("1").unwrap();
    assert_eq!(with_order("").unwrap(), first);
    assert_eq!(with_order("   ").unwrap(), first);

    let MathOutput::Derivative { result, .. } = first else {
        panic!("expected a derivative output");
    };
    assert_eq!(result, parse("3x^2 + cos(x)").unwrap());
}

#[test]
fn differentiating_an_antiderivative_recovers_polynomials() {
    for text in [
        "x^3 - 2x + 7",
        "(2x+1)^3",
        "x^5/5 + x",
        "3",
        "y*x^2",
        "(x+1)*(x-2)",
        "(x - 1)^2*(x + 3)",
    ] {
        let expr = parse(text).unwrap();
        let primitive = integrate(&expr, Variable::X).unwrap();
        let recovered = differentiate(&primitive, Variable::X);
        assert_eq!(
            recovered.expand(),
            expr.expand(),
            "d/dx of {} (from {})",
            primitive,
            text
        );
    }
}

#[test]
fn zero_angles_give_the_identity() {
    let matrix = RotationMatrix::from_euler(&EulerAngles::new(0.0, 0.0, 0.0));
    assert!(matrix.approx_eq(&RotationMatrix::identity(), 1e-6));
    assert_eq!(matrix.render(), RotationMatrix::identity().render());
}

#[test]
fn divergent_definite_integral_is_reported() {
    let fields = FormFields::new()
        .with(field::EXPRESSION, "tan(x)")
        .with(field::VARIABLE, "x")
        .with(field::LOWER, "0")
        .with(field::UPPER, "pi");
    let result = run(Operation::Integral, &fields, &Limits::default());
    assert!(matches!(result, Err(MathError::Divergent { .. })));
    assert_eq!(render_reply(&result), "❌ integral diverges on [0, pi]");
}

#[test]
fn a_single_integration_bound_is_rejected() {
    for (lower, upper) in [("0", ""), ("", "1")] {
        let fields = FormFields::new()
            .with(field::EXPRESSION, "x")
            .with(field::VARIABLE, "x")
            .with(field::LOWER, lower)
            .with(field::UPPER, upper);
        let err = IntegralRequest::from_fields(&fields).unwrap_err();
        assert!(matches!(err, MathError::Validation { .. }));

        let reply = render_reply(&run(Operation::Integral, &fields, &Limits::default()));
        assert_eq!(reply, "❌ provide both integration bounds or neither");
    }
}

#[test]
fn missing_closed_form_is_reported() {
    let fields = FormFields::new()
        .with(field::EXPRESSION, "exp(x^2)")
        .with(field::VARIABLE, "x");
    let reply = render_reply(&run(Operation::Integral, &fields, &Limits::default()));
    assert_eq!(
        reply,
        "❌ no closed-form antiderivative found for exp(x^2) with respect to x"
    );
}
