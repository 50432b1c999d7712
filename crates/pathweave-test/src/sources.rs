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

//! Input generators for the fixture grammars.
//!
//! Output is deterministic so benchmark runs stay comparable.

/// `1+2+...+n` for [`arithmetic`](crate::grammars::arithmetic) or
/// [`ambiguous_sum`](crate::grammars::ambiguous_sum).
pub fn sum_chain(terms: usize) -> String {
    (1..=terms.max(1))
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("+")
}

/// `terms` numbers joined by a repeating `+ * *` operator pattern.
pub fn mixed_arithmetic(terms: usize) -> String {
    let mut out = String::with_capacity(terms * 4);
    for i in 0..terms.max(1) {
        if i > 0 {
            out.push_str(if i % 3 == 0 { " + " } else { " * " });
        }
        out.push_str(&(i % 97).to_string());
    }
    out
}

/// `depth` pairs of parentheses around `1`.
pub fn nested_parens(depth: usize) -> String {
    format!("{}1{}", "(".repeat(depth), ")".repeat(depth))
}

/// Alternating typedefs, declarations and multiplications.
pub fn typedef_unit(statements: usize) -> String {
    let mut out = String::new();
    for i in 0..statements {
        match i % 3 {
            0 => out.push_str(&format!("typedef T{i};\n")),
            1 => out.push_str(&format!("T{} * v{i};\n", i - 1)),
            _ => out.push_str(&format!("a{i} * b{i};\n")),
        }
    }
    out
}

/// `depth` nested blocks with one statement each.
pub fn nested_blocks(depth: usize) -> String {
    let mut out = String::from("global top;\n");
    for _ in 0..depth {
        out.push_str("{ x;\n");
    }
    out.push_str(&"}\n".repeat(depth));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_chain() {
        assert_eq!(sum_chain(3), "1+2+3");
        assert_eq!(sum_chain(0), "1");
    }

    #[test]
    fn test_nested_parens() {
        assert_eq!(nested_parens(2), "((1))");
    }

    #[test]
    fn test_typedef_unit() {
        assert_eq!(typedef_unit(3), "typedef T0;\nT0 * v1;\na2 * b2;\n");
    }

    #[test]
    fn test_mixed_arithmetic() {
        assert_eq!(mixed_arithmetic(4), "0 * 1 * 2 + 3");
    }
}
