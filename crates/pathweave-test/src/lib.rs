// Dweve Pathweave - Multi-Path Grammar Parsing Engine
//
// Copyright (c) 2025 Dweve IP B.V. and individual contributors.
//
// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License in the LICENSE file at the
// root of this repository or at: http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared grammar fixtures and utilities for Pathweave tests and benches.
//!
//! # Quick Start
//!
//! ```rust
//! use pathweave_test::{grammars, render};
//!
//! let grammar = grammars::arithmetic();
//! let tree = pathweave_core::parse(&grammar, "2+3*4").unwrap();
//! assert_eq!(render(&tree), "+(2,*(3,4))");
//! ```

pub mod grammars;
pub mod sources;

use pathweave_core::AstHandle;
use pathweave_memory::NodeId;

/// Install a `fmt` subscriber filtered by `PATHWEAVE_TEST_LOG`.
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_env("PATHWEAVE_TEST_LOG");
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// The tree as nested `payload(child,...)` text.
pub fn render(tree: &AstHandle) -> String {
    render_node(tree, tree.root())
}

/// Like [`render`], starting at `node`.
pub fn render_node(tree: &AstHandle, node: NodeId) -> String {
    let text = tree.text(node).unwrap_or("?");
    let children: Vec<String> = tree
        .ast()
        .children(node)
        .map(|child| render_node(tree, child))
        .collect();
    if children.is_empty() {
        text.to_string()
    } else {
        format!("{text}({})", children.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_arithmetic() {
        let tree = pathweave_core::parse(&grammars::arithmetic(), "1*2+3").unwrap();
        assert_eq!(render(&tree), "+(*(1,2),3)");
    }

    #[test]
    fn test_init_tracing_twice() {
        init_tracing();
        init_tracing();
    }
}
