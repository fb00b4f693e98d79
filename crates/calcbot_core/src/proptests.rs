//! Property-based tests for the parser, calculus and rotation operations.
