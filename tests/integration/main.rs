//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a subsystem through
//! the full controller against mock adapters. All tests run on the
//! host with no real hardware required.

mod controller_tests;
mod mock_hw;
mod scheduler_flow_tests;
