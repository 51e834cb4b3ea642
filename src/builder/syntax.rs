//! Module references in declaration files.
//!
//! Declaration output is never edited with text patterns. Each file is parsed
//! with oxc as a `.d.ts` module and an AST visitor collects the string literal
//! of every module reference. Rewrites then splice new text into exactly
//! those spans, so comments, strings and templates are never touched.

use std::ops::Range;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ExportAllDeclaration, ExportNamedDeclaration, Expression, ImportDeclaration,
    ImportExpression, StringLiteral, TSExternalModuleReference, TSImportType,
};
use oxc_ast::visit::walk;
use oxc_ast::Visit;
use oxc_parser::Parser;
use oxc_span::SourceType;

/// The syntactic form a module reference appears in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `import x from "m"`, `import type { X } from "m"`
    Import,
    /// `import "m"`
    SideEffectImport,
    /// `export * from "m"`, `export { x } from "m"`
    ReExport,
    /// `import x = require("m")`
    ImportRequire,
    /// `import("m")` in value position
    DynamicImport,
    /// `import("m")` in type position: `typeof import("m")`, `Promise<import("m").T>`
    TypeImport,
}

/// A module specifier found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleReference {
    pub kind: ReferenceKind,
    /// The specifier as written, without quotes.
    pub specifier: String,
    /// Byte span of the specifier inside the quotes.
    pub span: Range<usize>,
}

struct ReferenceCollector<'s> {
    source: &'s str,
    references: Vec<ModuleReference>,
    /// Set while walking an import type whose specifier has not been seen.
    pending_type_import: bool,
}

impl<'s> ReferenceCollector<'s> {
    fn record(&mut self, kind: ReferenceKind, literal: &StringLiteral<'_>) {
        let (start, end) = (literal.span.start as usize, literal.span.end as usize);
        if end < start + 2 || end > self.source.len() {
            return;
        }
        let inner = start + 1..end - 1;
        self.references.push(ModuleReference {
            kind,
            specifier: self.source[inner.clone()].to_string(),
            span: inner,
        });
    }
}

impl<'a, 's> Visit<'a> for ReferenceCollector<'s> {
    fn visit_import_declaration(&mut self, it: &ImportDeclaration<'a>) {
        let kind = if it.specifiers.is_some() {
            ReferenceKind::Import
        } else {
            ReferenceKind::SideEffectImport
        };
        self.record(kind, &it.source);
    }

    fn visit_export_all_declaration(&mut self, it: &ExportAllDeclaration<'a>) {
        self.record(ReferenceKind::ReExport, &it.source);
    }

    fn visit_export_named_declaration(&mut self, it: &ExportNamedDeclaration<'a>) {
        if let Some(source) = &it.source {
            self.record(ReferenceKind::ReExport, source);
        }
        walk::walk_export_named_declaration(self, it);
    }

    fn visit_ts_external_module_reference(&mut self, it: &TSExternalModuleReference<'a>) {
        self.record(ReferenceKind::ImportRequire, &it.expression);
    }

    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        if let Expression::StringLiteral(literal) = &it.source {
            self.record(ReferenceKind::DynamicImport, literal);
        }
        walk::walk_import_expression(self, it);
    }

    fn visit_ts_import_type(&mut self, it: &TSImportType<'a>) {
        // The specifier is the first string literal under the import type.
        self.pending_type_import = true;
        walk::walk_ts_import_type(self, it);
        self.pending_type_import = false;
    }

    fn visit_string_literal(&mut self, it: &StringLiteral<'a>) {
        if std::mem::take(&mut self.pending_type_import) {
            self.record(ReferenceKind::TypeImport, it);
        }
    }
}

/// Every module reference in `source`, in order of appearance.
///
/// Syntax errors are logged; whatever the parser recovered is still scanned.
pub fn module_references(source: &str) -> Vec<ModuleReference> {
    let allocator = Allocator::default();
    let source_type = SourceType::ts()
        .with_module(true)
        .with_typescript_definition(true);
    let parsed = Parser::new(&allocator, source, source_type).parse();
    if !parsed.errors.is_empty() {
        tracing::debug!(
            "{} syntax error(s) while scanning declarations: {}",
            parsed.errors.len(),
            parsed.errors[0]
        );
    }

    let mut collector = ReferenceCollector {
        source,
        references: Vec::new(),
        pending_type_import: false,
    };
    collector.visit_program(&parsed.program);

    let mut references = collector.references;
    references.sort_by_key(|r| r.span.start);
    references.dedup_by_key(|r| r.span.start);
    references
}

/// Decides what a module reference should be rewritten to.
pub trait ReferenceVisitor {
    /// Return the replacement specifier, or `None` to keep it as written.
    fn visit_reference(&mut self, reference: &ModuleReference) -> Option<String>;
}

impl<F> ReferenceVisitor for F
where
    F: FnMut(&ModuleReference) -> Option<String>,
{
    fn visit_reference(&mut self, reference: &ModuleReference) -> Option<String> {
        self(reference)
    }
}

/// Rewrite module specifiers in place. Only the text between the quotes of a
/// reference ever changes; quote style and everything else is preserved.
pub fn rewrite_with<V>(source: &str, visitor: &mut V) -> String
where
    V: ReferenceVisitor + ?Sized,
{
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for reference in module_references(source) {
        if let Some(replacement) = visitor.visit_reference(&reference) {
            out.push_str(&source[last..reference.span.start]);
            out.push_str(&replacement);
            last = reference.span.end;
        }
    }
    out.push_str(&source[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specifiers(source: &str) -> Vec<(ReferenceKind, String)> {
        module_references(source)
            .into_iter()
            .map(|r| (r.kind, r.specifier))
            .collect()
    }

    #[test]
    fn test_static_forms() {
        let source = r#"
import def, { a, type B } from "./a";
import type { C } from './c';
import * as ns from "./ns";
import "./side-effect";
export * from "./star";
export * as grouped from "./grouped";
export { d } from "./d";
export type { E } from "./e";
import legacy = require("./legacy");
"#;
        assert_eq!(
            specifiers(source),
            vec![
                (ReferenceKind::Import, "./a".to_string()),
                (ReferenceKind::Import, "./c".to_string()),
                (ReferenceKind::Import, "./ns".to_string()),
                (ReferenceKind::SideEffectImport, "./side-effect".to_string()),
                (ReferenceKind::ReExport, "./star".to_string()),
                (ReferenceKind::ReExport, "./grouped".to_string()),
                (ReferenceKind::ReExport, "./d".to_string()),
                (ReferenceKind::ReExport, "./e".to_string()),
                (ReferenceKind::ImportRequire, "./legacy".to_string()),
            ]
        );
    }

    #[test]
    fn test_string_named_exports() {
        assert_eq!(
            specifiers("export * as \"ns\" from \"./util\";"),
            vec![(ReferenceKind::ReExport, "./util".to_string())]
        );
        assert_eq!(
            specifiers("export { \"a-b\" as ab, \"c\" } from './names';"),
            vec![(ReferenceKind::ReExport, "./names".to_string())]
        );
    }

    #[test]
    fn test_span_is_inside_quotes() {
        let source = "export * as \"ns\" from \"./util\";";
        let references = module_references(source);
        assert_eq!(references.len(), 1);
        assert_eq!(&source[references[0].span.clone()], "./util");
    }

    #[test]
    fn test_import_expressions() {
        let source = r#"
export declare const lazy: () => Promise<typeof import("./lazy")>;
export declare const config: import("./config").Config;
export type Handler = Parameters<import("./handler").Fn<"not-a-ref">>[0];
declare const loader: Promise<unknown>;
"#;
        assert_eq!(
            specifiers(source),
            vec![
                (ReferenceKind::TypeImport, "./lazy".to_string()),
                (ReferenceKind::TypeImport, "./config".to_string()),
                (ReferenceKind::TypeImport, "./handler".to_string()),
            ]
        );

        assert_eq!(
            specifiers("export default import('./dynamic');"),
            vec![(ReferenceKind::DynamicImport, "./dynamic".to_string())]
        );
    }

    #[test]
    fn test_ignores_non_references() {
        let source = r#"
// import { x } from "./commented";
/* export * from "./block"; */
/// <reference path="./triple.d.ts" />
declare const s: "import { y } from './in-string'";
declare const t: `export * from "./in-template"`;
declare const o: { import: string; from: "./not-a-ref" };
declare module "./ambient" {}
export { local };
export declare function from(x: string): void;
"#;
        assert!(module_references(source).is_empty());
    }

    #[test]
    fn test_export_without_from_does_not_swallow_next_import() {
        let source = "export { a }\nimport { b } from \"./b\"\n";
        assert_eq!(
            specifiers(source),
            vec![(ReferenceKind::Import, "./b".to_string())]
        );
    }

    #[test]
    fn test_rewrite_with_preserves_quotes() {
        let source = "export * from './a';\nexport { b } from \"./b\";\n";
        let rewritten = rewrite_with(source, &mut |r: &ModuleReference| {
            Some(format!("{}.mjs", r.specifier))
        });
        assert_eq!(
            rewritten,
            "export * from './a.mjs';\nexport { b } from \"./b.mjs\";\n"
        );
    }

    #[test]
    fn test_rewrite_string_named_reexport() {
        let source = "export * as \"ns\" from \"./util\";\n";
        let rewritten = rewrite_with(source, &mut |r: &ModuleReference| {
            Some(format!("{}.mjs", r.specifier))
        });
        assert_eq!(rewritten, "export * as \"ns\" from \"./util.mjs\";\n");
    }

    #[test]
    fn test_rewrite_with_none_keeps_source() {
        let source = "import x from \"react\";\n";
        let rewritten = rewrite_with(source, &mut |_: &ModuleReference| -> Option<String> { None });
        assert_eq!(rewritten, source);
    }
}
