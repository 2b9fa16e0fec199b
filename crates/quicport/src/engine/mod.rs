// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cooperative task engine.

pub mod worker_pool;

pub use worker_pool::{TaskHandle, TaskScheduler, WorkerPool};
