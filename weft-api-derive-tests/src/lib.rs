//! Compile-and-run tests for `#[deployable]` live under `tests/`.
