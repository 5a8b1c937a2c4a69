//! Provider test suites and shared mocks.
