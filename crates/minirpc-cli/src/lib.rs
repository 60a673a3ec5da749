// Copyright 2025 MiniRPC Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # MiniRPC CLI
//!
//! Command-line interface for MiniRPC.
//!
//! - `minirpc server`: serve the built-in [`arith`] service, optionally
//!   behind the HTTP front door and announced to a registry
//! - `minirpc registry`: run a heartbeat registry
//! - `minirpc call`: make one call and print the JSON reply

pub mod arith;
