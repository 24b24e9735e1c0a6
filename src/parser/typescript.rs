use super::{
    DescriptorKind, DocumentSymbols, ImportedName, MemberDescriptor, SourceError,
    SymbolDescriptor, SymbolSource,
};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tree_sitter::{Language, Node, Parser, TreeCursor};

/// Suffixes tried, in order, when resolving a relative module specifier
const MODULE_SUFFIXES: &[&str] = &[".ts", ".tsx", ".d.ts", "/index.ts", "/index.tsx"];

/// Symbol source using tree-sitter to extract classes, interfaces and enums
pub struct TypeScriptSource {
    languages: HashMap<String, Language>,
}

impl TypeScriptSource {
    pub fn new() -> Self {
        let mut languages = HashMap::new();

        // TSX needs its own grammar, `<T>value` casts don't parse there
        languages.insert("ts".to_string(), tree_sitter_typescript::language_typescript());
        languages.insert("mts".to_string(), tree_sitter_typescript::language_typescript());
        languages.insert("cts".to_string(), tree_sitter_typescript::language_typescript());
        languages.insert("tsx".to_string(), tree_sitter_typescript::language_tsx());

        Self { languages }
    }

    /// Parse document text and extract declarations and named imports
    pub fn parse(&self, path: &Path, content: &str) -> Result<DocumentSymbols, SourceError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();

        let language = self
            .languages
            .get(&extension)
            .ok_or_else(|| SourceError::UnsupportedLanguage(path.to_path_buf()))?;

        let mut parser = Parser::new();
        parser.set_language(*language)?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| SourceError::Parse(path.to_path_buf()))?;

        let mut symbols = DocumentSymbols::default();
        let root = tree.root_node();
        self.extract_symbols(&mut symbols, &mut root.walk(), content, path);

        tracing::debug!(
            "Extracted {} declarations and {} imports from {}",
            symbols.declared.len(),
            symbols.imports.len(),
            path.display()
        );

        Ok(symbols)
    }

    fn extract_symbols(
        &self,
        symbols: &mut DocumentSymbols,
        cursor: &mut TreeCursor,
        source: &str,
        path: &Path,
    ) {
        loop {
            let node = cursor.node();

            match node.kind() {
                "class_declaration" | "abstract_class_declaration" | "interface_declaration" => {
                    symbols.declared.extend(class_descriptor(node, source));
                }
                "enum_declaration" => {
                    symbols.declared.extend(enum_descriptor(node, source));
                }
                "import_statement" => {
                    symbols.imports.extend(imported_names(node, source, path));
                }
                _ => {
                    if cursor.goto_first_child() {
                        self.extract_symbols(symbols, cursor, source, path);
                        cursor.goto_parent();
                    }
                }
            }

            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

impl Default for TypeScriptSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolSource for TypeScriptSource {
    fn symbols_of_document(&self, path: &Path, text: &str) -> Result<DocumentSymbols, SourceError> {
        self.parse(path, text)
    }
}

/// Resolve a relative module specifier against the importing file.
/// Package specifiers are never resolved.
pub fn resolve_module(importer: &Path, specifier: &str) -> Option<PathBuf> {
    if !(specifier.starts_with("./") || specifier.starts_with("../")) {
        return None;
    }

    // ESM-style imports name the emitted file
    let specifier = specifier.strip_suffix(".js").unwrap_or(specifier);
    let base = importer.parent()?.join(specifier);

    if base.is_file() {
        return Some(base);
    }

    MODULE_SUFFIXES
        .iter()
        .map(|suffix| {
            let mut candidate = OsString::from(base.as_os_str());
            candidate.push(suffix);
            PathBuf::from(candidate)
        })
        .find(|candidate| candidate.is_file())
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unquote(text: &str) -> String {
    text.trim_matches(|c| c == '"' || c == '\'' || c == '`').to_string()
}

fn named_children<'tree>(node: Node<'tree>) -> impl Iterator<Item = Node<'tree>> {
    (0..node.named_child_count()).filter_map(move |i| node.named_child(i))
}

fn class_descriptor(node: Node, source: &str) -> Option<SymbolDescriptor> {
    let name = node.child_by_field_name("name")?;
    let body = node.child_by_field_name("body")?;

    let members = named_children(body)
        .filter(|member| matches!(member.kind(), "public_field_definition" | "property_signature"))
        .filter_map(|member| property_member(member, source))
        .collect();

    Some(SymbolDescriptor {
        name: node_text(name, source).to_string(),
        kind: DescriptorKind::Class,
        members,
    })
}

fn property_member(node: Node, source: &str) -> Option<MemberDescriptor> {
    let name = unquote(node_text(node.child_by_field_name("name")?, source));

    let optional = (0..node.child_count())
        .filter_map(|i| node.child(i))
        .any(|child| child.kind() == "?");

    let type_text = match node.child_by_field_name("type") {
        Some(annotation) => {
            collapse_whitespace(node_text(annotation, source).trim_start_matches(':'))
        }
        None => node
            .child_by_field_name("value")
            .map(|value| literal_type(value.kind()))
            .unwrap_or("any")
            .to_string(),
    };

    let marker = if optional { "?" } else { "" };
    Some(MemberDescriptor {
        display_label: format!("{name}{marker}: {type_text}"),
        name,
    })
}

fn literal_type(kind: &str) -> &'static str {
    match kind {
        "number" => "number",
        "string" | "template_string" => "string",
        "true" | "false" => "boolean",
        "array" => "Array",
        _ => "any",
    }
}

fn enum_descriptor(node: Node, source: &str) -> Option<SymbolDescriptor> {
    let name = node.child_by_field_name("name")?;
    let body = node.child_by_field_name("body")?;

    // Implicit members continue from the previous numeric value
    let mut next_value: Option<i64> = Some(0);
    let mut members = Vec::new();

    for child in named_children(body) {
        let (member_name, value) = match child.kind() {
            "enum_assignment" => {
                let Some(member) = child.child_by_field_name("name") else {
                    continue;
                };
                let value = child
                    .child_by_field_name("value")
                    .map(|value| collapse_whitespace(node_text(value, source)));
                next_value = value
                    .as_deref()
                    .and_then(|v| v.parse::<i64>().ok())
                    .and_then(|v| v.checked_add(1));
                (unquote(node_text(member, source)), value)
            }
            "property_identifier" | "string" => {
                let value = next_value.map(|v| v.to_string());
                next_value = next_value.and_then(|v| v.checked_add(1));
                (unquote(node_text(child, source)), value)
            }
            _ => continue,
        };

        let display_label = match value {
            Some(value) => format!("{member_name} = {value}"),
            None => member_name.clone(),
        };
        members.push(MemberDescriptor {
            name: member_name,
            display_label,
        });
    }

    Some(SymbolDescriptor {
        name: node_text(name, source).to_string(),
        kind: DescriptorKind::Enum,
        members,
    })
}

fn imported_names(node: Node, source: &str, importer: &Path) -> Vec<ImportedName> {
    let Some(module) = node.child_by_field_name("source") else {
        return Vec::new();
    };
    let specifier = unquote(node_text(module, source));
    let resolved_path = resolve_module(importer, &specifier);

    let mut names = Vec::new();
    collect_import_specifiers(node, source, &mut names);

    names
        .into_iter()
        .map(|name| ImportedName {
            name,
            specifier: specifier.clone(),
            resolved_path: resolved_path.clone(),
        })
        .collect()
}

fn collect_import_specifiers(node: Node, source: &str, names: &mut Vec<String>) {
    for child in named_children(node) {
        if child.kind() == "import_specifier" {
            if let Some(name) = child.child_by_field_name("name") {
                names.push(unquote(node_text(name, source)));
            }
        } else {
            collect_import_specifiers(child, source, names);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(symbol: &SymbolDescriptor) -> Vec<&str> {
        symbol.members.iter().map(|m| m.display_label.as_str()).collect()
    }

    #[test]
    fn test_parse_class_properties() {
        let source = TypeScriptSource::new();
        let code = r#"
            export class UserEntity {
                id: number;
                nickname?: string;
                createdAt: Date;
                count = 0;
                active = true;
                tags: Array<
                    string
                >;

                greet(): string {
                    return "hi";
                }
            }
        "#;

        let symbols = source.parse(Path::new("user.ts"), code).unwrap();
        assert_eq!(symbols.declared.len(), 1);

        let user = &symbols.declared[0];
        assert_eq!(user.name, "UserEntity");
        assert_eq!(user.kind, DescriptorKind::Class);
        assert_eq!(
            labels(user),
            vec![
                "id: number",
                "nickname?: string",
                "createdAt: Date",
                "count: number",
                "active: boolean",
                "tags: Array< string >",
            ]
        );
        assert_eq!(user.members[1].name, "nickname");
    }

    #[test]
    fn test_parse_interface_as_class() {
        let source = TypeScriptSource::new();
        let code = "interface UserDto { id: number; email: string }";

        let symbols = source.parse(Path::new("dto.ts"), code).unwrap();
        assert_eq!(symbols.declared[0].kind, DescriptorKind::Class);
        assert_eq!(labels(&symbols.declared[0]), vec!["id: number", "email: string"]);
    }

    #[test]
    fn test_parse_enum_values() {
        let source = TypeScriptSource::new();
        let code = r#"
            export enum StatusEnum {
                Draft,
                Active,
                Archived = 10,
                Deleted,
            }
            enum Color { Red = 'red', Blue = 'blue' }
        "#;

        let symbols = source.parse(Path::new("status.ts"), code).unwrap();
        assert_eq!(symbols.declared.len(), 2);
        assert_eq!(symbols.declared[0].kind, DescriptorKind::Enum);
        assert_eq!(
            labels(&symbols.declared[0]),
            vec!["Draft = 0", "Active = 1", "Archived = 10", "Deleted = 11"]
        );
        assert_eq!(
            labels(&symbols.declared[1]),
            vec!["Red = 'red'", "Blue = 'blue'"]
        );
    }

    #[test]
    fn test_enum_value_past_i64_max_has_no_value() {
        let source = TypeScriptSource::new();
        let code = "enum BigEnum { A = 9223372036854775807, B, C }";

        let symbols = source.parse(Path::new("big.ts"), code).unwrap();
        assert_eq!(
            labels(&symbols.declared[0]),
            vec!["A = 9223372036854775807", "B", "C"]
        );
    }

    #[test]
    fn test_declaration_order_is_kept() {
        let source = TypeScriptSource::new();
        let code = "class B { x: number }\nenum A { One }\nclass C {}";

        let symbols = source.parse(Path::new("order.ts"), code).unwrap();
        let names: Vec<_> = symbols.declared.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert!(symbols.declared[2].members.is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let source = TypeScriptSource::new();
        let err = source.parse(Path::new("main.rs"), "fn main() {}").unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_imports_resolve_to_local_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("user.entity.ts"),
            "export class UserEntity { id: number; name: string }",
        )
        .unwrap();
        std::fs::create_dir(dir.path().join("dto")).unwrap();
        std::fs::write(dir.path().join("dto/index.ts"), "export interface UserDto { id: number }")
            .unwrap();

        let importer = dir.path().join("service.ts");
        let code = r#"
            import { UserEntity } from "./user.entity";
            import { UserDto as Dto } from './dto';
            import { Injectable } from "@nestjs/common";
        "#;
        std::fs::write(&importer, code).unwrap();

        let source = TypeScriptSource::new();
        let symbols = source.symbols_of_file(&importer).unwrap();

        let names: Vec<_> = symbols.imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["UserEntity", "UserDto", "Injectable"]);
        assert_eq!(
            symbols.imports[0].resolved_path.as_deref(),
            Some(dir.path().join("user.entity.ts").as_path())
        );
        assert_eq!(
            symbols.imports[1].resolved_path.as_deref(),
            Some(dir.path().join("dto/index.ts").as_path())
        );
        assert_eq!(symbols.imports[2].resolved_path, None);

        let user = source
            .symbols_of_imported_name(&dir.path().join("user.entity.ts"), "UserEntity")
            .unwrap()
            .unwrap();
        assert_eq!(labels(&user), vec!["id: number", "name: string"]);

        let missing = source
            .symbols_of_imported_name(&dir.path().join("user.entity.ts"), "Nope")
            .unwrap();
        assert!(missing.is_none());
    }
}
