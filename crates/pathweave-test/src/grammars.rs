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

//! Fixture grammars.
//!
//! Each function builds a fresh grammar exercising one engine feature.
//! Invalid fixtures are a bug in this crate, so builders panic on error.

use std::sync::Arc;

use pathweave_core::grammar::{AstShape, GrammarBuilder};
use pathweave_core::Grammar;

/// List of fixture constructors (name, builder).
pub type FixtureList = Vec<(&'static str, fn() -> Arc<Grammar>)>;

/// Every fixture grammar.
pub fn all() -> FixtureList {
    vec![
        ("arithmetic", arithmetic),
        ("ambiguous_sum", ambiguous_sum),
        ("typedef", typedef),
        ("blocks", blocks),
        ("embedded_sql", embedded_sql),
        ("format_strings", format_strings),
    ]
}

fn finish(b: &GrammarBuilder) -> Arc<Grammar> {
    match b.build() {
        Ok(grammar) => Arc::new(grammar),
        Err(e) => panic!("fixture grammar is invalid: {e}"),
    }
}

/// `+` and `*` with the usual precedence, parentheses and whitespace.
///
/// Unambiguous; every valid input has exactly one accepted path.
pub fn arithmetic() -> Arc<Grammar> {
    let mut b = GrammarBuilder::new();
    b.pattern("NUMBER", "[0-9]+").scalar();
    b.literal("PLUS", "+");
    b.literal("STAR", "*");
    b.literal("LPAREN", "(").hidden().opens_bracket();
    b.literal("RPAREN", ")").hidden().closes_bracket();
    b.skip("WS", r"\s+");
    b.rule("expr", &["expr", "PLUS", "term"]).shape(AstShape::Operator(1));
    b.rule("expr", &["term"]).shape(AstShape::Passthrough(0));
    b.rule("term", &["term", "STAR", "factor"]).shape(AstShape::Operator(1));
    b.rule("term", &["factor"]).shape(AstShape::Passthrough(0));
    b.rule("factor", &["NUMBER"]).shape(AstShape::Passthrough(0));
    b.rule("factor", &["LPAREN", "expr", "RPAREN"]).shape(AstShape::Passthrough(1));
    b.start("expr");
    finish(&b)
}

/// `e := e '+' e | n`: every sum of three or more terms is ambiguous.
pub fn ambiguous_sum() -> Arc<Grammar> {
    let mut b = GrammarBuilder::new();
    b.pattern("N", "[0-9a-z]+");
    b.literal("PLUS", "+");
    b.skip("WS", r"\s+");
    b.rule("e", &["e", "PLUS", "e"]).shape(AstShape::Operator(1));
    b.rule("e", &["N"]).shape(AstShape::Passthrough(0));
    b.start("e");
    finish(&b)
}

/// C-style statements where `T * x;` is a declaration once `T` names a
/// typedef and a multiplication otherwise.
pub fn typedef() -> Arc<Grammar> {
    let mut b = GrammarBuilder::new();
    b.keyword("TYPEDEF", "typedef");
    b.identifier("TYPE_NAME", "[A-Za-z_][A-Za-z0-9_]*").declared_as("typedef");
    b.identifier("IDENT", "[A-Za-z_][A-Za-z0-9_]*");
    b.literal("STAR", "*");
    b.literal("SEMI", ";").hidden();
    b.skip("WS", r"\s+");
    b.rule("unit", &["unit", "stmt"]).shape(AstShape::List);
    b.rule("unit", &["stmt"]).shape(AstShape::List);
    b.rule("stmt", &["typedef_decl"]).shape(AstShape::Passthrough(0));
    b.rule("stmt", &["decl"]).shape(AstShape::Passthrough(0));
    b.rule("stmt", &["expr_stmt"]).shape(AstShape::Passthrough(0));
    b.rule("typedef_decl", &["TYPEDEF", "IDENT", "SEMI"]).declares(1, "typedef");
    b.rule("decl", &["TYPE_NAME", "STAR", "IDENT", "SEMI"]);
    b.rule("expr_stmt", &["IDENT", "STAR", "IDENT", "SEMI"]);
    b.start("unit");
    finish(&b)
}

/// Statements and nested `{ }` blocks; `global` is only legal at the top
/// level.
pub fn blocks() -> Arc<Grammar> {
    let mut b = GrammarBuilder::new();
    b.keyword("GLOBAL", "global").not_in(&["block"]);
    b.identifier("IDENT", "[a-z]+");
    b.literal("LBRACE", "{").hidden().opens_scope("block");
    b.literal("RBRACE", "}").hidden().closes_scope();
    b.literal("SEMI", ";").hidden();
    b.skip("WS", r"\s+");
    b.rule("items", &["items", "item"]).shape(AstShape::List);
    b.rule("items", &["item"]).shape(AstShape::List);
    b.rule("item", &["GLOBAL", "IDENT", "SEMI"]);
    b.rule("item", &["IDENT", "SEMI"]);
    b.rule("item", &["LBRACE", "items", "RBRACE"]).shape(AstShape::Passthrough(1));
    b.start("items");
    finish(&b)
}

/// Host statements with `sql{ select name }` blocks. From inside a block
/// only the host symbol `shared` resolves.
pub fn embedded_sql() -> Arc<Grammar> {
    let mut b = GrammarBuilder::new();
    b.keyword("LET", "let");
    b.keyword("SELECT", "select").only_in(&["sql"]);
    b.literal("SQL_OPEN", "sql{").hidden().opens_scope("sql");
    b.literal("SQL_CLOSE", "}").hidden().closes_scope();
    b.identifier("IDENT", "[a-z]+");
    b.pattern("NUM", "[0-9]+").scalar();
    b.literal("EQ", "=").hidden();
    b.literal("SEMI", ";").hidden();
    b.skip("WS", r"\s+");
    b.embedded_language("sql", "sql", &["shared"]);
    b.rule("prog", &["prog", "stmt"]).shape(AstShape::List);
    b.rule("prog", &["stmt"]).shape(AstShape::List);
    b.rule("stmt", &["LET", "IDENT", "EQ", "NUM", "SEMI"]).declares(1, "var");
    b.rule("stmt", &["ref", "SEMI"]).shape(AstShape::Passthrough(0));
    b.rule("stmt", &["SQL_OPEN", "query", "SQL_CLOSE"]).shape(AstShape::Passthrough(1));
    b.rule("query", &["SELECT", "ref"]);
    b.rule("ref", &["IDENT"]).shape(AstShape::Passthrough(0)).references(0);
    b.start("prog");
    finish(&b)
}

/// Sums of names and `f"..."` strings with `{expr}` holes, using lexer
/// modes for the string body.
pub fn format_strings() -> Arc<Grammar> {
    let mut b = GrammarBuilder::new();
    b.mode("fstr", true);
    b.literal("FSTART", "f\"").hidden().push_mode("fstr");
    b.pattern("TEXT", "[^\"{}]+").in_modes(&["fstr"]);
    b.literal("HOLE_OPEN", "{").hidden().in_modes(&["fstr"]).push_mode("default");
    b.literal("HOLE_CLOSE", "}").hidden().pop_mode();
    b.literal("FEND", "\"").hidden().in_modes(&["fstr"]).pop_mode();
    b.identifier("IDENT", "[a-z]+");
    b.literal("PLUS", "+");
    b.skip("WS", r"[ \t]+");
    b.rule("expr", &["expr", "PLUS", "atom"]).shape(AstShape::Operator(1));
    b.rule("expr", &["atom"]).shape(AstShape::Passthrough(0));
    b.rule("atom", &["IDENT"]).shape(AstShape::Passthrough(0));
    b.rule("atom", &["fstring"]).shape(AstShape::Passthrough(0));
    b.rule("fstring", &["FSTART", "parts", "FEND"]).shape(AstShape::Passthrough(1));
    b.rule("parts", &["parts", "part"]).shape(AstShape::List);
    b.rule("parts", &["part"]).shape(AstShape::List);
    b.rule("part", &["TEXT"]).shape(AstShape::Passthrough(0));
    b.rule("part", &["HOLE_OPEN", "expr", "HOLE_CLOSE"]).shape(AstShape::Passthrough(1));
    b.start("expr");
    finish(&b)
}
