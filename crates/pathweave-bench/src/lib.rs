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

//! Shared settings for Pathweave benchmarks.
//!
//! Inputs come from `pathweave_test::sources`; this crate only fixes the
//! sizes so every bench group measures the same workloads.

/// Input sizes used across bench groups.
pub mod sizes {
    /// Terms or statements per input.
    pub const SMALL: usize = 100;
    pub const MEDIUM: usize = 1_000;
    pub const LARGE: usize = 10_000;

    /// Sizes for throughput groups.
    pub const ALL: [usize; 3] = [SMALL, MEDIUM, LARGE];
}

/// Labels for `BenchmarkId`s.
pub fn size_label(size: usize) -> &'static str {
    match size {
        sizes::SMALL => "small",
        sizes::MEDIUM => "medium",
        sizes::LARGE => "large",
        _ => "custom",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_labels() {
        assert_eq!(size_label(sizes::SMALL), "small");
        assert_eq!(size_label(sizes::LARGE), "large");
        assert_eq!(size_label(7), "custom");
    }
}
