//! Fixtures shared by unit tests.
