//! Scenario tests: small programs run end to end through the runtime.

mod closure_tests;
