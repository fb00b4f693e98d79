//! Calculator core for calcbot.
//!
//! A small symbolic engine over a closed vocabulary (variables `x` and `y`,
//! the constants pi and E, and a fixed set of unary functions), the
//! operations the math menu offers on top of it, and Euler angle rotation
//! matrices. Nothing in here does I/O.

mod convergence;
pub mod derivative;
pub mod dispatch;
pub mod error;
pub mod expr;
pub mod integral;
pub mod number;
pub mod parser;
mod proptests;
pub mod rotation;
mod simplify;

pub use derivative::{differentiate, nth_derivative};
pub use dispatch::{
    render_reply, run, DerivativeRequest, FieldSpec, FormFields, IntegralRequest, Limits,
    MathOutput, MathRequest, Operation, RotationRequest, FAILURE_MARKER,
};
pub use error::{MathError, MathResult, ParseError};
pub use expr::{Bindings, Constant, Expr, Function, Variable};
pub use integral::{definite_integral, integrate};
pub use number::Number;
pub use parser::parse;
pub use rotation::{EulerAngles, RotationMatrix};
pub use simplify::MAX_EXPANSION_POWER;
