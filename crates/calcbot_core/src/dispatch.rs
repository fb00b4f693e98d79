//! Math operation dispatcher.
//!
//! Turns raw form text into typed requests, runs them, and renders the
//! reply text. Every failure comes back as a [`MathError`] value, so the
//! chat layer only ever has to render a result.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info};

use crate::derivative::nth_derivative;
use crate::error::{MathError, MathResult};
use crate::expr::{Bindings, Expr, Variable};
use crate::integral::{definite_integral, integrate};
use crate::parser::parse;
use crate::rotation::{round_significant, EulerAngles, RotationMatrix};

/// Prefix of every error reply.
pub const FAILURE_MARKER: &str = "❌";

/// Default cap on the differentiation order.
pub const DEFAULT_MAX_DERIVATIVE_ORDER: u32 = 10;

/// The operations offered by the math menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Derivative,
    Integral,
    EulerRotation,
}

impl Operation {
    pub const ALL: [Operation; 3] = [
        Operation::Derivative,
        Operation::Integral,
        Operation::EulerRotation,
    ];

    /// Stable identifier used in component ids.
    pub fn id(&self) -> &'static str {
        match self {
            Operation::Derivative => "derivative",
            Operation::Integral => "integral",
            Operation::EulerRotation => "euler_rotation",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.id() == id)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Operation::Derivative => "Derivative",
            Operation::Integral => "Integral",
            Operation::EulerRotation => "Euler rotation matrix",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Operation::Derivative => "Differentiate an expression in x or y",
            Operation::Integral => "Indefinite or definite integral",
            Operation::EulerRotation => "3x3 matrix from roll, pitch and yaw in degrees",
        }
    }

    /// Form fields collected for this operation, in display order.
    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            Operation::Derivative => &DERIVATIVE_FIELDS,
            Operation::Integral => &INTEGRAL_FIELDS,
            Operation::EulerRotation => &ROTATION_FIELDS,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// One input of an operation form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub placeholder: &'static str,
    pub default: Option<&'static str>,
    pub required: bool,
}

impl FieldSpec {
    const fn required(id: &'static str, label: &'static str, placeholder: &'static str) -> Self {
        Self {
            id,
            label,
            placeholder,
            default: None,
            required: true,
        }
    }

    const fn optional(id: &'static str, label: &'static str, placeholder: &'static str) -> Self {
        Self {
            id,
            label,
            placeholder,
            default: None,
            required: false,
        }
    }

    const fn with_default(self, value: &'static str) -> Self {
        Self {
            default: Some(value),
            ..self
        }
    }
}

pub mod field {
    pub const EXPRESSION: &str = "expression";
    pub const VARIABLE: &str = "variable";
    pub const ORDER: &str = "order";
    pub const LOWER: &str = "lower";
    pub const UPPER: &str = "upper";
    pub const ROLL: &str = "roll";
    pub const PITCH: &str = "pitch";
    pub const YAW: &str = "yaw";
}

static DERIVATIVE_FIELDS: [FieldSpec; 3] = [
    FieldSpec::required(field::EXPRESSION, "Expression", "x^2 + 3x"),
    FieldSpec::required(field::VARIABLE, "Variable (x or y)", "x").with_default("x"),
    FieldSpec::optional(field::ORDER, "Order (default 1)", "1"),
];

static INTEGRAL_FIELDS: [FieldSpec; 4] = [
    FieldSpec::required(field::EXPRESSION, "Expression", "sin(x)"),
    FieldSpec::required(field::VARIABLE, "Variable (x or y)", "x").with_default("x"),
    FieldSpec::optional(field::LOWER, "Lower bound (optional)", "0"),
    FieldSpec::optional(field::UPPER, "Upper bound (optional)", "pi"),
];

static ROTATION_FIELDS: [FieldSpec; 3] = [
    FieldSpec::required(field::ROLL, "Roll (degrees)", "0"),
    FieldSpec::required(field::PITCH, "Pitch (degrees)", "0"),
    FieldSpec::required(field::YAW, "Yaw (degrees)", "0"),
];

/// Submitted form values keyed by field id. Blank values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    values: BTreeMap<String, String>,
}

impl FormFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(id, value);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.values.insert(id.into(), value.into());
    }

    /// Trimmed value, `None` when missing or blank.
    pub fn get(&self, id: &str) -> Option<&str> {
        self.values
            .get(id)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, id: &str) -> MathResult<&str> {
        self.get(id)
            .ok_or_else(|| MathError::validation(format!("{} is required", id)))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = FormFields::new();
        for (k, v) in iter {
            fields.insert(k, v);
        }
        fields
    }
}

/// Tunable bounds on request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_derivative_order: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_derivative_order: DEFAULT_MAX_DERIVATIVE_ORDER,
        }
    }
}

/// Exactly `x` or `y`.
pub fn parse_variable(text: &str) -> MathResult<Variable> {
    Variable::from_name(text).ok_or_else(|| {
        MathError::validation(format!("variable must be x or y, got `{}`", text.trim()))
    })
}

/// A blank order means first derivative.
pub fn parse_order(text: Option<&str>, limits: &Limits) -> MathResult<u32> {
    let Some(text) = text else {
        return Ok(1);
    };
    let max = limits.max_derivative_order;
    let invalid = || {
        MathError::validation(format!(
            "order must be a whole number from 1 to {}, got `{}`",
            max, text
        ))
    };
    let order: i64 = text.trim().parse().map_err(|_| invalid())?;
    if order < 1 || order > i64::from(max) {
        return Err(invalid());
    }
    u32::try_from(order).map_err(|_| invalid())
}

/// Angle in degrees: a number or a constant expression such as `180/3` or `pi`.
pub fn parse_angle(name: &str, text: &str) -> MathResult<f64> {
    let invalid = || {
        MathError::validation(format!(
            "{} must be a number of degrees, got `{}`",
            name, text
        ))
    };
    let expr = parse(text).map_err(|_| invalid())?;
    if !expr.free_variables().is_empty() {
        return Err(invalid());
    }
    expr.eval(&Bindings::new()).map_err(|_| invalid())
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeRequest {
    pub expression: Expr,
    pub variable: Variable,
    pub order: u32,
}

impl DerivativeRequest {
    pub fn from_fields(fields: &FormFields, limits: &Limits) -> MathResult<Self> {
        let expression = parse(fields.require(field::EXPRESSION)?)?;
        let variable = parse_variable(fields.require(field::VARIABLE)?)?;
        let order = parse_order(fields.get(field::ORDER), limits)?;
        Ok(Self {
            expression,
            variable,
            order,
        })
    }

    pub fn execute(&self) -> MathResult<MathOutput> {
        let result = nth_derivative(&self.expression, self.variable, self.order)?;
        Ok(MathOutput::Derivative {
            expression: self.expression.clone(),
            variable: self.variable,
            order: self.order,
            result,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegralRequest {
    pub expression: Expr,
    pub variable: Variable,
    /// `(lower, upper)` for a definite integral.
    pub bounds: Option<(Expr, Expr)>,
}

impl IntegralRequest {
    pub fn from_fields(fields: &FormFields) -> MathResult<Self> {
        let expression = parse(fields.require(field::EXPRESSION)?)?;
        let variable = parse_variable(fields.require(field::VARIABLE)?)?;
        let bounds = match (fields.get(field::LOWER), fields.get(field::UPPER)) {
            (Some(lower), Some(upper)) => Some((parse(lower)?, parse(upper)?)),
            (None, None) => None,
            _ => {
                return Err(MathError::validation(
                    "provide both integration bounds or neither",
                ))
            }
        };
        Ok(Self {
            expression,
            variable,
            bounds,
        })
    }

    pub fn execute(&self) -> MathResult<MathOutput> {
        let result = match &self.bounds {
            Some((lower, upper)) => {
                definite_integral(&self.expression, self.variable, lower, upper)?
            }
            None => integrate(&self.expression, self.variable)?,
        };
        let approximation = match self.bounds {
            Some(_) => approximate(&result),
            None => None,
        };
        Ok(MathOutput::Integral {
            expression: self.expression.clone(),
            variable: self.variable,
            bounds: self.bounds.clone(),
            result,
            approximation,
        })
    }
}

/// Numeric value of a closed-form result, unless it is already an integer or a float.
fn approximate(result: &Expr) -> Option<f64> {
    if let Some(n) = result.as_number() {
        if n.as_integer().is_some() || !n.is_exact() {
            return None;
        }
    }
    result.eval(&Bindings::new()).ok()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotationRequest {
    pub angles: EulerAngles,
}

impl RotationRequest {
    pub fn from_fields(fields: &FormFields) -> MathResult<Self> {
        let roll = parse_angle(field::ROLL, fields.require(field::ROLL)?)?;
        let pitch = parse_angle(field::PITCH, fields.require(field::PITCH)?)?;
        let yaw = parse_angle(field::YAW, fields.require(field::YAW)?)?;
        Ok(Self {
            angles: EulerAngles::new(roll, pitch, yaw),
        })
    }

    pub fn execute(&self) -> MathOutput {
        MathOutput::Rotation {
            angles: self.angles,
            matrix: RotationMatrix::from_euler(&self.angles),
        }
    }
}

/// A validated request for one of the menu operations.
#[derive(Debug, Clone, PartialEq)]
pub enum MathRequest {
    Derivative(DerivativeRequest),
    Integral(IntegralRequest),
    Rotation(RotationRequest),
}

impl MathRequest {
    pub fn from_fields(
        operation: Operation,
        fields: &FormFields,
        limits: &Limits,
    ) -> MathResult<Self> {
        let request = match operation {
            Operation::Derivative => {
                MathRequest::Derivative(DerivativeRequest::from_fields(fields, limits)?)
            }
            Operation::Integral => MathRequest::Integral(IntegralRequest::from_fields(fields)?),
            Operation::EulerRotation => {
                MathRequest::Rotation(RotationRequest::from_fields(fields)?)
            }
        };
        Ok(request)
    }

    pub fn operation(&self) -> Operation {
        match self {
            MathRequest::Derivative(_) => Operation::Derivative,
            MathRequest::Integral(_) => Operation::Integral,
            MathRequest::Rotation(_) => Operation::EulerRotation,
        }
    }

    pub fn execute(&self) -> MathResult<MathOutput> {
        debug!(operation = %self.operation(), "executing math request");
        match self {
            MathRequest::Derivative(request) => request.execute(),
            MathRequest::Integral(request) => request.execute(),
            MathRequest::Rotation(request) => Ok(request.execute()),
        }
    }
}

/// Parse, validate and run one form submission.
pub fn run(operation: Operation, fields: &FormFields, limits: &Limits) -> MathResult<MathOutput> {
    let result = MathRequest::from_fields(operation, fields, limits)?.execute();
    match &result {
        Ok(_) => info!(operation = %operation, "math request succeeded"),
        Err(e) => info!(operation = %operation, error = %e, "math request failed"),
    }
    result
}

/// The successful result of a math request.
#[derive(Debug, Clone, PartialEq)]
pub enum MathOutput {
    Derivative {
        expression: Expr,
        variable: Variable,
        order: u32,
        result: Expr,
    },
    Integral {
        expression: Expr,
        variable: Variable,
        bounds: Option<(Expr, Expr)>,
        result: Expr,
        approximation: Option<f64>,
    },
    Rotation {
        angles: EulerAngles,
        matrix: RotationMatrix,
    },
}

impl MathOutput {
    /// Summary line followed by a fenced block with the result.
    pub fn render(&self) -> String {
        match self {
            MathOutput::Derivative {
                expression,
                variable,
                order,
                result,
            } => {
                let heading = if *order == 1 {
                    format!("Derivative of `{}` with respect to {}:", expression, variable)
                } else {
                    format!(
                        "Derivative of order {} of `{}` with respect to {}:",
                        order, expression, variable
                    )
                };
                format!("{}\n```\n{}\n```", heading, result)
            }
            MathOutput::Integral {
                expression,
                variable,
                bounds,
                result,
                approximation,
            } => {
                let heading = match bounds {
                    Some((lower, upper)) => format!(
                        "Integral of `{}` with respect to {} from {} to {}:",
                        expression, variable, lower, upper
                    ),
                    None => format!("Integral of `{}` with respect to {}:", expression, variable),
                };
                let mut body = result.to_string();
                if let Some(value) = approximation {
                    body.push_str(&format!("\n≈ {}", round_significant(*value)));
                }
                format!("{}\n```\n{}\n```", heading, body)
            }
            MathOutput::Rotation { angles, matrix } => format!(
                "Rotation matrix for roll {}°, pitch {}°, yaw {}°:\n```\n{}\n```",
                angles.roll, angles.pitch, angles.yaw, matrix
            ),
        }
    }
}

/// Reply text for a finished request: the rendered output or one failure line.
pub fn render_reply(result: &MathResult<MathOutput>) -> String {
    match result {
        Ok(output) => output.render(),
        Err(e) => format!("{} {}", FAILURE_MARKER, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn derivative_fields(expr: &str, var: &str, order: &str) -> FormFields {
        FormFields::new()
            .with(field::EXPRESSION, expr)
            .with(field::VARIABLE, var)
            .with(field::ORDER, order)
    }

    #[test]
    fn test_operation_ids_round_trip() {
        for op in Operation::ALL {
            assert_eq!(Operation::from_id(op.id()), Some(op));
        }
        assert_eq!(Operation::from_id("eval"), None);
    }

    #[test]
    fn test_blank_fields_are_absent() {
        let fields = FormFields::new().with("a", "  ").with("b", " x ");
        assert_eq!(fields.get("a"), None);
        assert_eq!(fields.get("b"), Some("x"));
        assert_eq!(fields.get("c"), None);
    }

    #[test]
    fn test_order_validation() {
        let limits = Limits::default();
        assert_eq!(parse_order(None, &limits).unwrap(), 1);
        assert_eq!(parse_order(Some("3"), &limits).unwrap(), 3);
        for bad in ["0", "-2", "1.5", "two", "11"] {
            assert!(
                matches!(parse_order(Some(bad), &limits), Err(MathError::Validation { .. })),
                "{} should be rejected",
                bad
            );
        }
        let relaxed = Limits {
            max_derivative_order: 20,
        };
        assert_eq!(parse_order(Some("15"), &relaxed).unwrap(), 15);
    }

    #[test]
    fn test_variable_validation() {
        assert_eq!(parse_variable(" y ").unwrap(), Variable::Y);
        assert!(matches!(
            parse_variable("z"),
            Err(MathError::Validation { .. })
        ));
        assert!(parse_variable("xy").is_err());
    }

    #[test]
    fn test_derivative_reply() {
        let fields = derivative_fields("x^3", "x", "2");
        let reply = render_reply(&run(Operation::Derivative, &fields, &Limits::default()));
        assert_eq!(
            reply,
            "Derivative of order 2 of `x^3` with respect to x:\n```\n6*x\n```"
        );
    }

    #[test]
    fn test_parse_error_reply() {
        let fields = derivative_fields("import os", "x", "");
        let reply = render_reply(&run(Operation::Derivative, &fields, &Limits::default()));
        assert_eq!(reply, "❌ unknown identifier `import`");
    }

    #[test]
    fn test_definite_integral_reply() {
        let fields = FormFields::new()
            .with(field::EXPRESSION, "x^2")
            .with(field::VARIABLE, "x")
            .with(field::LOWER, "0")
            .with(field::UPPER, "1");
        let reply = render_reply(&run(Operation::Integral, &fields, &Limits::default()));
        assert_eq!(
            reply,
            "Integral of `x^2` with respect to x from 0 to 1:\n```\n1/3\n≈ 0.333333\n```"
        );
    }

    #[test]
    fn test_integer_result_has_no_approximation() {
        let fields = FormFields::new()
            .with(field::EXPRESSION, "sin(x)")
            .with(field::VARIABLE, "x")
            .with(field::LOWER, "0")
            .with(field::UPPER, "pi");
        let reply = render_reply(&run(Operation::Integral, &fields, &Limits::default()));
        assert!(reply.ends_with("```\n2\n```"), "{}", reply);
    }

    #[test]
    fn test_oversized_derivative_reply() {
        let fields = derivative_fields("asin(x^x)", "x", "10");
        let reply = render_reply(&run(Operation::Derivative, &fields, &Limits::default()));
        assert!(reply.starts_with("❌ the result is too large to show"), "{}", reply);
        assert_eq!(reply.lines().count(), 1);
    }

    #[test]
    fn test_divergent_integral_reply() {
        let fields = FormFields::new()
            .with(field::EXPRESSION, "1/x^2")
            .with(field::VARIABLE, "x")
            .with(field::LOWER, "-1")
            .with(field::UPPER, "1");
        let reply = render_reply(&run(Operation::Integral, &fields, &Limits::default()));
        assert_eq!(reply, "❌ integral diverges on [-1, 1]");
    }

    #[test]
    fn test_single_bound_rejected() {
        let fields = FormFields::new()
            .with(field::EXPRESSION, "x")
            .with(field::VARIABLE, "x")
            .with(field::UPPER, "1");
        let err = IntegralRequest::from_fields(&fields).unwrap_err();
        assert_eq!(
            err,
            MathError::validation("provide both integration bounds or neither")
        );
    }

    #[test]
    fn test_angles() {
        assert_eq!(parse_angle("roll", "-45.5").unwrap(), -45.5);
        assert_eq!(parse_angle("roll", "180/3").unwrap(), 60.0);
        assert!(matches!(
            parse_angle("yaw", "x + 1"),
            Err(MathError::Validation { .. })
        ));
        assert!(parse_angle("yaw", "ninety").is_err());
    }

    #[test]
    fn test_rotation_reply() {
        let fields = FormFields::new()
            .with(field::ROLL, "0")
            .with(field::PITCH, "0")
            .with(field::YAW, "0");
        let reply = render_reply(&run(Operation::EulerRotation, &fields, &Limits::default()));
        assert!(reply.starts_with("Rotation matrix for roll 0°, pitch 0°, yaw 0°:"));
        assert!(reply.contains("[ 1.000000,  0.000000,  0.000000]"));
    }

    #[test]
    fn test_missing_expression() {
        let fields = FormFields::new().with(field::VARIABLE, "x");
        let err = DerivativeRequest::from_fields(&fields, &Limits::default()).unwrap_err();
        assert_eq!(err.to_string(), "expression is required");
    }
}
