// Copyright 2025 NexRPC Authors
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

//! # NexRPC CLI
//!
//! Command-line interface for the NexRPC runtime.
//!
//! ## Key Commands
//!
//! - `nexrpc serve`: Start a server publishing the demo services
//! - `nexrpc call`: Call a demo service method on a known endpoint and print
//!   the reply (stdout stays clean for scripting)
//!
//! The binary parses arguments with `argh` and hands off to [`serve`] and
//! [`call`], which wire `nexrpc-server` and `nexrpc-client` together.

pub mod call;
pub mod serve;
