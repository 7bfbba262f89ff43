//! Lexical language heuristics.
//!
//! Nothing here parses source code. Each language family recognizes import
//! and function-definition lines by keyword prefixes or bracket shape, and the
//! registry picks a family by file extension.

use std::collections::HashMap;
use std::sync::Arc;

/// Lexical role of a source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Code,
    Import,
    FunctionDefinition,
}

/// Line classifier for one language family.
pub trait LanguageHeuristic: Send + Sync {
    fn family(&self) -> &'static str;

    fn is_import(&self, line: &str) -> bool;

    fn is_function_definition(&self, line: &str) -> bool;

    /// Classify every line of a file. Families with multi-line import blocks
    /// override this to carry state between lines.
    fn classify_lines(&self, lines: &[&str]) -> Vec<LineKind> {
        lines
            .iter()
            .map(|line| {
                if self.is_import(line) {
                    LineKind::Import
                } else if self.is_function_definition(line) {
                    LineKind::FunctionDefinition
                } else {
                    LineKind::Code
                }
            })
            .collect()
    }
}

fn starts_with_any(line: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|p| line.starts_with(p))
}

/// Strip leading modifiers such as `pub`, `export`, `static`.
fn strip_modifiers<'a>(mut line: &'a str, modifiers: &[&str]) -> &'a str {
    loop {
        let before = line;
        for m in modifiers {
            if let Some(rest) = line.strip_prefix(m) {
                if rest.starts_with(char::is_whitespace) {
                    line = rest.trim_start();
                } else if let Some(rest) = rest.strip_prefix('(') {
                    // pub(crate)
                    if let Some(end) = rest.find(')') {
                        line = rest[end + 1..].trim_start();
                    }
                }
            }
        }
        if line == before {
            return line;
        }
    }
}

/// Python: `import x`, `from x import y`, `def f(`.
pub struct PythonFamily;

impl LanguageHeuristic for PythonFamily {
    fn family(&self) -> &'static str {
        "python"
    }

    fn is_import(&self, line: &str) -> bool {
        let line = line.trim_start();
        line.starts_with("import ") || (line.starts_with("from ") && line.contains(" import "))
    }

    fn is_function_definition(&self, line: &str) -> bool {
        let line = line.trim_start();
        starts_with_any(line, &["def ", "async def "]) && line.contains('(')
    }
}

const C_STYLE_MODIFIERS: &[&str] = &[
    "pub", "export", "default", "public", "private", "protected", "internal", "static", "final",
    "abstract", "override", "virtual", "async", "unsafe", "inline", "extern", "synchronized",
    "const", "open", "suspend",
];

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "switch", "catch", "return", "new", "throw", "await", "do",
    "case", "sizeof", "typeof", "match", "loop", "yield", "delete",
];

/// C, C++, C#, Java, Kotlin, Scala, Swift, Rust, JavaScript and TypeScript.
pub struct CStyleFamily;

impl CStyleFamily {
    /// `type name(args) {` style definitions.
    fn looks_like_bracket_definition(line: &str) -> bool {
        if line.ends_with(';')
            || line.starts_with('#')
            || line.starts_with("//")
            || line.starts_with('*')
        {
            return false;
        }
        let Some(open) = line.find('(') else {
            return false;
        };
        let head = &line[..open];
        if head.contains('=') || head.contains('.') || head.contains("->") {
            return false;
        }
        let tokens: Vec<&str> = head.split_whitespace().collect();
        if tokens.len() < 2 {
            return false;
        }
        if CONTROL_KEYWORDS.contains(&tokens[0]) {
            return false;
        }
        let name = tokens[tokens.len() - 1].trim_start_matches(['*', '&']);
        let is_ident = !name.is_empty()
            && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == ':' || c == '~')
            && !name.chars().next().is_some_and(|c| c.is_ascii_digit());
        if !is_ident {
            return false;
        }
        let Some(close) = line.rfind(')') else {
            return line.ends_with(',') || line.ends_with('(');
        };
        let tail = line[close + 1..].trim();
        tail.is_empty()
            || tail.starts_with('{')
            || tail.starts_with("const")
            || tail.starts_with("throws")
            || tail.starts_with("override")
            || tail.starts_with("noexcept")
            || tail.starts_with(':')
    }

    /// `const f = (x) =>` and `const f = async x =>`.
    fn looks_like_arrow_definition(line: &str) -> bool {
        let line = strip_modifiers(line, &["export"]);
        if !starts_with_any(line, &["const ", "let ", "var "]) {
            return false;
        }
        match line.split_once('=') {
            Some((_, rhs)) => rhs.contains("=>") && !rhs.trim_start().starts_with('='),
            None => false,
        }
    }
}

impl LanguageHeuristic for CStyleFamily {
    fn family(&self) -> &'static str {
        "c-style"
    }

    fn is_import(&self, line: &str) -> bool {
        let line = line.trim_start();
        starts_with_any(
            line,
            &[
                "#include",
                "#import",
                "import ",
                "import{",
                "using ",
                "use ",
                "pub use ",
                "extern crate ",
            ],
        ) || line.contains("require(")
            || (line.starts_with("export ") && line.contains(" from "))
    }

    fn is_function_definition(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let stripped = strip_modifiers(trimmed, C_STYLE_MODIFIERS);
        if starts_with_any(stripped, &["fn ", "function ", "function*", "fun ", "def ", "func "]) {
            return true;
        }
        Self::looks_like_arrow_definition(trimmed) || Self::looks_like_bracket_definition(trimmed)
    }
}

/// Go: import blocks span lines, so classification is stateful.
pub struct GoFamily;

impl LanguageHeuristic for GoFamily {
    fn family(&self) -> &'static str {
        "go"
    }

    fn is_import(&self, line: &str) -> bool {
        line.trim_start().starts_with("import ")
    }

    fn is_function_definition(&self, line: &str) -> bool {
        line.trim_start().starts_with("func ")
    }

    fn classify_lines(&self, lines: &[&str]) -> Vec<LineKind> {
        let mut in_block = false;
        lines
            .iter()
            .map(|line| {
                let trimmed = line.trim();
                if in_block {
                    if trimmed.starts_with(')') {
                        in_block = false;
                        return LineKind::Code;
                    }
                    return LineKind::Import;
                }
                if trimmed.starts_with("import (") || trimmed == "import(" {
                    in_block = true;
                    return LineKind::Import;
                }
                if self.is_import(line) {
                    LineKind::Import
                } else if self.is_function_definition(line) {
                    LineKind::FunctionDefinition
                } else {
                    LineKind::Code
                }
            })
            .collect()
    }
}

/// Ruby: `require`, `require_relative`, `def`.
pub struct RubyFamily;

impl LanguageHeuristic for RubyFamily {
    fn family(&self) -> &'static str {
        "ruby"
    }

    fn is_import(&self, line: &str) -> bool {
        starts_with_any(line.trim_start(), &["require ", "require_relative ", "require(", "load "])
    }

    fn is_function_definition(&self, line: &str) -> bool {
        line.trim_start().starts_with("def ")
    }
}

/// PHP: `use`, `require`/`include` variants, `function`.
pub struct PhpFamily;

impl LanguageHeuristic for PhpFamily {
    fn family(&self) -> &'static str {
        "php"
    }

    fn is_import(&self, line: &str) -> bool {
        starts_with_any(
            line.trim_start(),
            &[
                "use ",
                "require ",
                "require_once",
                "include ",
                "include_once",
                "require(",
                "include(",
            ],
        )
    }

    fn is_function_definition(&self, line: &str) -> bool {
        let stripped = strip_modifiers(
            line.trim(),
            &["public", "private", "protected", "static", "final", "abstract"],
        );
        stripped.starts_with("function ")
    }
}

/// POSIX shells: `source`/`.` and `name() {` or `function name`.
pub struct ShellFamily;

impl LanguageHeuristic for ShellFamily {
    fn family(&self) -> &'static str {
        "shell"
    }

    fn is_import(&self, line: &str) -> bool {
        starts_with_any(line.trim_start(), &["source ", ". "])
    }

    fn is_function_definition(&self, line: &str) -> bool {
        let line = line.trim();
        line.starts_with("function ")
            || line
                .split_once("()")
                .map(|(name, rest)| {
                    !name.is_empty()
                        && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
                        && rest.trim_start().starts_with('{')
                })
                .unwrap_or(false)
    }
}

/// Extension -> heuristic lookup.
///
/// Families are registered strategies; adding a language means registering a
/// new `LanguageHeuristic` for its extensions.
#[derive(Clone, Default)]
pub struct HeuristicRegistry {
    by_extension: HashMap<String, Arc<dyn LanguageHeuristic>>,
}

impl HeuristicRegistry {
    /// An empty registry: every file falls back to literal/regex matching.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with the built-in families.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(&["py", "pyi", "pyw"], Arc::new(PythonFamily));
        registry.register(
            &[
                "c", "h", "cc", "cpp", "cxx", "hpp", "hh", "hxx", "cs", "java", "kt", "kts",
                "scala", "swift", "rs", "js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts",
            ],
            Arc::new(CStyleFamily),
        );
        registry.register(&["go"], Arc::new(GoFamily));
        registry.register(&["rb", "rake"], Arc::new(RubyFamily));
        registry.register(&["php"], Arc::new(PhpFamily));
        registry.register(&["sh", "bash", "zsh"], Arc::new(ShellFamily));
        registry
    }

    pub fn register(&mut self, extensions: &[&str], heuristic: Arc<dyn LanguageHeuristic>) {
        for ext in extensions {
            self.by_extension
                .insert(ext.trim_start_matches('.').to_ascii_lowercase(), Arc::clone(&heuristic));
        }
    }

    pub fn for_extension(&self, extension: Option<&str>) -> Option<&dyn LanguageHeuristic> {
        let ext = extension?.to_ascii_lowercase();
        self.by_extension.get(&ext).map(|h| h.as_ref())
    }
}

impl std::fmt::Debug for HeuristicRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut extensions: Vec<&String> = self.by_extension.keys().collect();
        extensions.sort();
        f.debug_struct("HeuristicRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_lines() {
        let py = PythonFamily;
        assert!(py.is_import("import hashlib"));
        assert!(py.is_import("from Crypto.Cipher import DES"));
        assert!(!py.is_import("important = 1"));
        assert!(py.is_function_definition("    def login(user, pwd):"));
        assert!(py.is_function_definition("async def track_event(e):"));
        assert!(!py.is_function_definition("defaults = {}"));
    }

    #[test]
    fn test_c_style_imports() {
        let c = CStyleFamily;
        assert!(c.is_import("#include <openssl/md5.h>"));
        assert!(c.is_import("import { track } from 'analytics';"));
        assert!(c.is_import("const md5 = require('md5');"));
        assert!(c.is_import("use std::process::Command;"));
        assert!(c.is_import("using System.Security.Cryptography;"));
        assert!(!c.is_import("let user = getUser();"));
    }

    #[test]
    fn test_c_style_definitions() {
        let c = CStyleFamily;
        assert!(c.is_function_definition("pub fn login(user: &str) -> bool {"));
        assert!(c.is_function_definition("pub(crate) async fn track(e: Event) {"));
        assert!(c.is_function_definition("export async function login(req, res) {"));
        assert!(c.is_function_definition(
            "public static boolean login(String user, String pw) throws AuthException {"
        ));
        assert!(c.is_function_definition("int login(const char *user) {"));
        assert!(c.is_function_definition("export const track = async (event) => {"));
        assert!(!c.is_function_definition("if (login(user)) {"));
        assert!(!c.is_function_definition("return login(user);"));
        assert!(!c.is_function_definition("result = login(user)"));
        assert!(!c.is_function_definition("login(user);"));
    }

    #[test]
    fn test_go_import_block() {
        let lines = vec![
            "package main",
            "import (",
            "    \"crypto/md5\"",
            "    \"fmt\"",
            ")",
            "func main() {",
        ];
        let kinds = GoFamily.classify_lines(&lines);
        assert_eq!(
            kinds,
            vec![
                LineKind::Code,
                LineKind::Import,
                LineKind::Import,
                LineKind::Import,
                LineKind::Code,
                LineKind::FunctionDefinition
            ]
        );
    }

    #[test]
    fn test_shell_and_ruby() {
        assert!(ShellFamily.is_function_definition("deploy() {"));
        assert!(ShellFamily.is_import("source ./env.sh"));
        assert!(RubyFamily.is_import("require 'openssl'"));
        assert!(RubyFamily.is_function_definition("def login(user)"));
        assert!(PhpFamily.is_function_definition("public static function login($user) {"));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = HeuristicRegistry::builtin();
        assert_eq!(registry.for_extension(Some("PY")).unwrap().family(), "python");
        assert_eq!(registry.for_extension(Some("tsx")).unwrap().family(), "c-style");
        assert!(registry.for_extension(Some("yaml")).is_none());
        assert!(registry.for_extension(None).is_none());
    }
}
