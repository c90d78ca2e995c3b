//! `esm` stage: rewrites ES module syntax into module-registry calls.
//!
//! Chunk payloads register every script as a `function (module, exports,
//! require)`, where `import` and `export` declarations are not allowed. This
//! stage parses the source with oxc and splices in their CommonJS
//! equivalents:
//!
//! | source                          | output                                        |
//! |---------------------------------|-----------------------------------------------|
//! | `import a, { b as c } from "x"` | `var m = require("x"); var a = <default>; var c = m.b;` |
//! | `import "x"`                    | `require("x");`                               |
//! | `export const a = 1`            | `const a = 1` plus a getter for `a`           |
//! | `export { a as b }`             | a getter for `b` returning `a`                |
//! | `export default expr`           | `exports["default"] = expr;`                  |
//! | `export * from "x"`             | getters for every key of `require("x")`       |
//! | `import("x")`                   | `require.lazy("x")`                           |
//!
//! Imported bindings are copied when the module first runs, so they are not
//! live. Type-only imports and exports are dropped. Sources without module
//! syntax pass through unchanged.

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    Declaration, ExportDefaultDeclarationKind, ImportDeclarationSpecifier, ImportExpression,
    ModuleDeclaration, ModuleExportName, Program,
};
use oxc_ecmascript::BoundNames;
use oxc::ast_visit::{Visit, walk};
use oxc::parser::Parser;
use oxc::span::{GetSpan, SourceType, Span};

use super::{Stage, StageContext, StageError, StageOutput, utf8};

#[derive(Debug, Default, Clone, Copy)]
pub struct EsmStage;

impl Stage for EsmStage {
    fn name(&self) -> &str {
        "esm"
    }

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        let source = utf8(ctx, &input)?;
        match to_commonjs(ctx, source)? {
            Some(converted) => Ok(StageOutput::new(converted.into_bytes())),
            None => Ok(StageOutput::new(input)),
        }
    }
}

/// A replacement of `source[start..end]`.
struct Edit {
    start: u32,
    end: u32,
    text: String,
}

/// Generated code, grouped by where it lands at the top of the module.
#[derive(Default)]
struct Header {
    exports: Vec<String>,
    imports: Vec<String>,
    star_exports: Vec<String>,
    modules: usize,
}

impl Header {
    /// A fresh local holding `require(specifier)`.
    fn require(&mut self, specifier: &str) -> String {
        let local = format!("__tessel_m{}", self.modules);
        self.modules += 1;
        self.imports
            .push(format!("var {} = require({});", local, js_string(specifier)));
        local
    }

    fn getter(&mut self, exported: &str, expression: &str) {
        self.exports.push(format!(
            "Object.defineProperty(exports, {}, {{ enumerable: true, get: function () {{ return {}; }} }});",
            js_string(exported),
            expression
        ));
    }

    fn is_empty(&self) -> bool {
        self.exports.is_empty() && self.imports.is_empty() && self.star_exports.is_empty()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        if !self.exports.is_empty() || !self.star_exports.is_empty() {
            out.push_str("Object.defineProperty(exports, \"__esModule\", { value: true });\n");
        }
        for line in self.exports.iter().chain(&self.imports).chain(&self.star_exports) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Convert `source`, or `None` when it has no module syntax.
pub fn to_commonjs(ctx: &StageContext<'_>, source: &str) -> Result<Option<String>, StageError> {
    if !source.contains("import") && !source.contains("export") {
        return Ok(None);
    }

    let allocator = Allocator::default();
    // Unambiguous, so CommonJS sources are not held to module strictness.
    let source_type = SourceType::from_path(ctx.path)
        .unwrap_or_else(|_| SourceType::cjs())
        .with_unambiguous(true);
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(StageError::new(format!("failed to parse {}: {}", ctx.id, error)));
    }
    let program = ret.program;

    let mut edits: Vec<Edit> = Vec::new();
    let mut header = Header::default();
    for statement in &program.body {
        if let Some(declaration) = statement.as_module_declaration() {
            rewrite_declaration(source, declaration, &mut header, &mut edits);
        }
    }

    let mut dynamic = DynamicImports::default();
    dynamic.visit_program(&program);
    for span in dynamic.spans {
        edits.push(Edit {
            start: span.start,
            end: span.start + "import".len() as u32,
            text: "require.lazy".to_string(),
        });
    }

    if edits.is_empty() && header.is_empty() {
        return Ok(None);
    }

    edits.push(Edit {
        start: header_offset(&program),
        end: header_offset(&program),
        text: header.render(),
    });
    tracing::trace!(asset = ctx.id, edits = edits.len(), "converted module syntax");
    Ok(Some(splice(source, edits)))
}

fn rewrite_declaration(
    source: &str,
    declaration: &ModuleDeclaration<'_>,
    header: &mut Header,
    edits: &mut Vec<Edit>,
) {
    let span = declaration.span();
    let remove = |edits: &mut Vec<Edit>| {
        edits.push(Edit {
            start: span.start,
            end: span.end,
            text: String::new(),
        });
    };

    match declaration {
        ModuleDeclaration::ImportDeclaration(import) => {
            remove(edits);
            if import.import_kind.is_type() {
                return;
            }
            let specifier = import.source.value.as_str();
            let Some(specifiers) = &import.specifiers else {
                // `import "x"`
                header.imports.push(format!("require({});", js_string(specifier)));
                return;
            };
            let module = header.require(specifier);
            for spec in specifiers {
                let line = match spec {
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(default) => format!(
                        "var {} = {m} && {m}.__esModule ? {m}[\"default\"] : {m};",
                        default.local.name,
                        m = module
                    ),
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(namespace) => {
                        format!("var {} = {};", namespace.local.name, module)
                    }
                    ImportDeclarationSpecifier::ImportSpecifier(named) => {
                        if named.import_kind.is_type() {
                            continue;
                        }
                        format!(
                            "var {} = {}[{}];",
                            named.local.name,
                            module,
                            js_string(&export_name(&named.imported))
                        )
                    }
                };
                header.imports.push(line);
            }
        }
        ModuleDeclaration::ExportNamedDeclaration(named) => {
            if named.export_kind.is_type() {
                remove(edits);
                return;
            }
            if let Some(declared) = &named.declaration {
                if declared.is_typescript_syntax() {
                    remove(edits);
                    return;
                }
                // Keep the declaration, drop the `export` keyword.
                edits.push(Edit {
                    start: span.start,
                    end: declared.span().start,
                    text: String::new(),
                });
                for name in bound_names(declared) {
                    header.getter(&name, &name);
                }
                return;
            }

            remove(edits);
            let module = named.source.as_ref().map(|src| header.require(src.value.as_str()));
            for spec in &named.specifiers {
                if spec.export_kind.is_type() {
                    continue;
                }
                let exported = export_name(&spec.exported);
                let local = export_name(&spec.local);
                match &module {
                    Some(module) => {
                        header.getter(&exported, &format!("{}[{}]", module, js_string(&local)))
                    }
                    None => header.getter(&exported, &local),
                }
            }
        }
        ModuleDeclaration::ExportDefaultDeclaration(default) => {
            let declared = &default.declaration;
            let named_declaration = match declared {
                ExportDefaultDeclarationKind::FunctionDeclaration(function) => {
                    function.id.as_ref().map(|id| id.name.to_string())
                }
                ExportDefaultDeclarationKind::ClassDeclaration(class) => {
                    class.id.as_ref().map(|id| id.name.to_string())
                }
                ExportDefaultDeclarationKind::TSInterfaceDeclaration(_) => {
                    remove(edits);
                    return;
                }
                _ => None,
            };

            let inner = declared.span();
            match named_declaration {
                Some(name) => {
                    edits.push(Edit {
                        start: span.start,
                        end: inner.start,
                        text: String::new(),
                    });
                    header.getter("default", &name);
                }
                None => {
                    let body = &source[inner.start as usize..inner.end as usize];
                    edits.push(Edit {
                        start: span.start,
                        end: span.end,
                        text: format!("exports[\"default\"] = {};", body),
                    });
                    header.exports.push(
                        "Object.defineProperty(exports, \"default\", { enumerable: true, writable: true, value: undefined });"
                            .to_string(),
                    );
                }
            }
        }
        ModuleDeclaration::ExportAllDeclaration(all) => {
            remove(edits);
            if all.export_kind.is_type() {
                return;
            }
            let module = header.require(all.source.value.as_str());
            match &all.exported {
                Some(exported) => header.getter(&export_name(exported), &module),
                None => header.star_exports.push(format!(
                    "Object.keys({m}).forEach(function (k) {{ if (k !== \"default\" && k !== \"__esModule\" && !Object.prototype.hasOwnProperty.call(exports, k)) Object.defineProperty(exports, k, {{ enumerable: true, get: function () {{ return {m}[k]; }} }}); }});",
                    m = module
                )),
            }
        }
        // `export =` and `export as namespace` are TypeScript-only.
        _ => remove(edits),
    }
}

fn bound_names(declaration: &Declaration<'_>) -> Vec<String> {
    let mut names = Vec::new();
    declaration.bound_names(&mut |ident| names.push(ident.name.to_string()));
    names
}

fn export_name(name: &ModuleExportName<'_>) -> String {
    match name {
        ModuleExportName::IdentifierName(ident) => ident.name.to_string(),
        ModuleExportName::IdentifierReference(ident) => ident.name.to_string(),
        ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
    }
}

/// After the directive prologue, so `"use strict"` stays first.
fn header_offset(program: &Program<'_>) -> u32 {
    program
        .directives
        .last()
        .map_or(0, |directive| directive.span.end)
}

/// Spans of every `import(...)` expression.
#[derive(Default)]
struct DynamicImports {
    spans: Vec<Span>,
}

impl<'a> Visit<'a> for DynamicImports {
    fn visit_import_expression(&mut self, it: &ImportExpression<'a>) {
        self.spans.push(it.span);
        walk::walk_import_expression(self, it);
    }
}

fn splice(source: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|edit| (edit.start, edit.end));
    let mut out = String::with_capacity(source.len() + 256);
    let mut at = 0usize;
    for edit in edits {
        let start = edit.start as usize;
        if start < at {
            continue;
        }
        out.push_str(&source[at..start]);
        out.push_str(&edit.text);
        at = (edit.end as usize).max(start);
    }
    out.push_str(&source[at..]);
    out
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
