//! Integration tests over real database files.

mod concurrency_tests;
mod ledger_tests;
mod lifecycle_tests;
mod rewind_tests;
