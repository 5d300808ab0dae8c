//! E2E test scenarios
//!
//! Full `compute` runs over realistic datasets: stream encryption, a dense
//! layer sharing one weight matrix, pipelines and injected lane faults.
