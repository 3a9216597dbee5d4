//! End-to-end tests of the thread tree service against the storage adapters.
//! Everything lives under `tests/`.
