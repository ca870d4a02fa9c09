use std::path::Path;

use crate::error::{RecognizeError, Result};
use crate::models::{DeclaredLicense, Dependency, Package, PackageType, Party};

use super::{file_name, file_name_is, has_extension, non_empty, read_text, PackageParser};

/// OCaml `opam` package descriptions.
pub struct OpamFile;

impl PackageParser for OpamFile {
    const PACKAGE_TYPE: PackageType = PackageType::Opam;
    const DATASOURCE_ID: &'static str = "opam_file";

    fn is_package_data_file(path: &Path) -> bool {
        file_name_is(path, &["opam"]) || has_extension(path, &["opam"])
    }

    fn recognize(path: &Path) -> Result<Vec<Package>> {
        let content = read_text(path)?;
        let tokens = tokenize(&content).map_err(|e| RecognizeError::parse("opam", path, e))?;
        let fields = parse_fields(&tokens);

        let mut package = Self::new_package();
        package.primary_language = Some("Ocaml".to_string());

        let mut synopsis = None;
        let mut description = None;
        for (key, value) in &fields {
            match (key.as_str(), value) {
                ("name", v) => package.name = v.as_text(),
                ("version", v) => package.version = v.as_text(),
                ("synopsis", v) => synopsis = v.as_text(),
                ("description", v) => description = v.as_text(),
                ("homepage", v) => package.homepage_url = v.as_text(),
                ("bug-reports", v) => package.bug_tracking_url = v.as_text(),
                ("dev-repo", v) => package.vcs_url = v.as_text(),
                ("license", v) => package.declared_license = DeclaredLicense::from_texts(v.texts()),
                ("maintainer", v) => add_parties(&mut package, v, "maintainer"),
                ("authors", v) => add_parties(&mut package, v, "author"),
                ("tags", v) => package.keywords = v.texts(),
                ("depends", v) => package.dependencies = dependencies(v),
                ("url", OpamValue::Section(section)) => {
                    for (skey, svalue) in section {
                        match skey.as_str() {
                            "src" | "archive" => package.download_url = svalue.as_text(),
                            "checksum" => apply_checksums(&mut package, &svalue.texts()),
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        package.description = match (synopsis, description) {
            (Some(s), Some(d)) => Some(format!("{s}\n{d}")),
            (s, d) => s.or(d),
        };

        // opam 2 takes the package name from `<name>.opam`
        if package.name.is_none() {
            package.name = file_name(path)
                .and_then(|n| n.strip_suffix(".opam"))
                .and_then(non_empty);
        }
        Ok(vec![package])
    }
}

fn add_parties(package: &mut Package, value: &OpamValue, role: &str) {
    for raw in value.texts() {
        package.parties.extend(Party::from_person_string(&raw, role));
    }
}

fn dependencies(value: &OpamValue) -> Vec<Dependency> {
    let mut deps = Vec::new();
    value.visit_packages(&mut |name, filter| {
        let requirement = filter.filter(|f| !f.is_empty());
        let mut dep = Dependency::new(PackageType::Opam, None, name, requirement, "dependency");
        let test_only = requirement
            .is_some_and(|f| f.split_whitespace().any(|w| w == "with-test" || w == "with-doc"));
        if test_only {
            dep = dep.development();
        }
        deps.push(dep);
    });
    deps
}

fn apply_checksums(package: &mut Package, checksums: &[String]) {
    for checksum in checksums {
        let Some((algo, digest)) = checksum.split_once('=') else {
            continue;
        };
        let digest = Some(digest.to_string());
        match algo {
            "md5" => package.md5 = digest,
            "sha1" => package.sha1 = digest,
            "sha256" => package.sha256 = digest,
            "sha512" => package.sha512 = digest,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Str(String),
    Ident(String),
    Colon,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Op(String),
}

fn tokenize(input: &str) -> std::result::Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            _ if c.is_whitespace() => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '(' if chars.get(i + 1) == Some(&'*') => {
                let start = i;
                i += 2;
                loop {
                    if i + 1 >= chars.len() {
                        return Err(format!("unterminated comment at offset {start}"));
                    }
                    if chars[i] == '*' && chars[i + 1] == ')' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            '"' => {
                let triple = chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"');
                let start = i;
                i += if triple { 3 } else { 1 };
                let mut text = String::new();
                loop {
                    let Some(&ch) = chars.get(i) else {
                        return Err(format!("unterminated string at offset {start}"));
                    };
                    if triple {
                        let closing = chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"');
                        if ch == '"' && closing {
                            i += 3;
                            break;
                        }
                    } else if ch == '"' {
                        i += 1;
                        break;
                    }
                    if ch == '\\' {
                        if let Some(&next) = chars.get(i + 1) {
                            match next {
                                'n' => text.push('\n'),
                                't' => text.push('\t'),
                                '\n' => {}
                                other => text.push(other),
                            }
                            i += 2;
                            continue;
                        }
                    }
                    text.push(ch);
                    i += 1;
                }
                tokens.push(Token::Str(text));
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '{' => {
                tokens.push(Token::LBrace);
                i += 1;
            }
            '}' => {
                tokens.push(Token::RBrace);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            _ if c.is_alphanumeric() || c == '_' || c == '%' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | '-' | '+' | '.' | '%'))
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => {
                let start = i;
                while i < chars.len()
                    && matches!(chars[i], '=' | '!' | '<' | '>' | '&' | '|' | '?' | '~' | '+')
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                }
                tokens.push(Token::Op(chars[start..i].iter().collect()));
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum OpamValue {
    Str(String),
    Ident(String),
    List(Vec<OpamValue>),
    /// A value followed by a `{ ... }` filter, kept as rendered text.
    Filtered(Box<OpamValue>, String),
    Section(Vec<(String, OpamValue)>),
}

impl OpamValue {
    fn as_text(&self) -> Option<String> {
        match self {
            OpamValue::Str(s) => non_empty(s),
            OpamValue::Filtered(inner, _) => inner.as_text(),
            OpamValue::List(items) => items.first().and_then(OpamValue::as_text),
            _ => None,
        }
    }

    fn texts(&self) -> Vec<String> {
        match self {
            OpamValue::List(items) => items.iter().flat_map(OpamValue::texts).collect(),
            other => other.as_text().into_iter().collect(),
        }
    }

    /// Call `f` with every package name and its filter in a `depends` formula.
    fn visit_packages(&self, f: &mut dyn FnMut(&str, Option<&str>)) {
        match self {
            OpamValue::Str(name) => f(name.as_str(), None),
            OpamValue::Filtered(inner, filter) => match inner.as_ref() {
                OpamValue::Str(name) => f(name.as_str(), Some(filter.as_str())),
                other => other.visit_packages(f),
            },
            OpamValue::List(items) => items.iter().for_each(|v| v.visit_packages(f)),
            _ => {}
        }
    }
}

/// Parser over the token stream. Operators between values in lists are skipped,
/// which flattens `"a" | "b"` alternatives into separate entries.
struct FieldParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl FieldParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn at_field_start(&self) -> bool {
        matches!(
            (self.peek(), self.peek_at(1)),
            (Some(Token::Ident(_)), Some(Token::Colon | Token::LBrace))
        )
    }

    fn fields(&mut self, until: Option<&Token>) -> Vec<(String, OpamValue)> {
        let mut fields = Vec::new();
        while let Some(token) = self.peek() {
            if Some(token) == until {
                self.next();
                break;
            }
            if !self.at_field_start() {
                self.next();
                continue;
            }
            let Some(Token::Ident(key)) = self.next() else {
                continue;
            };
            match self.next() {
                Some(Token::Colon) => {
                    if let Some(value) = self.value() {
                        fields.push((key, value));
                    }
                    // Skip the rest of a formula such as `os != "win32"`
                    while self.peek().is_some() && !self.at_field_start() && self.peek() != until {
                        self.next();
                    }
                }
                Some(Token::LBrace) => {
                    let section = self.fields(Some(&Token::RBrace));
                    fields.push((key, OpamValue::Section(section)));
                }
                _ => {}
            }
        }
        fields
    }

    fn value(&mut self) -> Option<OpamValue> {
        let atom = match self.next()? {
            Token::Str(s) => OpamValue::Str(s),
            Token::Ident(s) => OpamValue::Ident(s),
            Token::LBracket => OpamValue::List(self.items(&Token::RBracket)),
            Token::LParen => OpamValue::List(self.items(&Token::RParen)),
            _ => return None,
        };
        if self.peek() == Some(&Token::LBrace) {
            self.next();
            let filter = self.filter_text();
            return Some(OpamValue::Filtered(Box::new(atom), filter));
        }
        Some(atom)
    }

    fn items(&mut self, close: &Token) -> Vec<OpamValue> {
        let mut items = Vec::new();
        while let Some(token) = self.peek() {
            if token == close {
                self.next();
                break;
            }
            if matches!(token, Token::Op(_) | Token::Colon | Token::RBrace) {
                self.next();
                continue;
            }
            match self.value() {
                Some(v) => items.push(v),
                None => continue,
            }
        }
        items
    }

    /// Render the tokens up to the matching `}` as text, e.g. `>= 4.08 & build`.
    fn filter_text(&mut self) -> String {
        let mut depth = 1;
        let mut parts: Vec<String> = Vec::new();
        while let Some(token) = self.next() {
            let part = match token {
                Token::LBrace => {
                    depth += 1;
                    "{".to_string()
                }
                Token::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    "}".to_string()
                }
                Token::Str(s) | Token::Ident(s) | Token::Op(s) => s,
                Token::LParen => "(".to_string(),
                Token::RParen => ")".to_string(),
                Token::LBracket => "[".to_string(),
                Token::RBracket => "]".to_string(),
                Token::Colon => ":".to_string(),
            };
            parts.push(part);
        }
        parts.join(" ")
    }
}

fn parse_fields(tokens: &[Token]) -> Vec<(String, OpamValue)> {
    FieldParser { tokens, pos: 0 }.fields(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::write_fixture;

    const OPAM: &str = r#"opam-version: "2.0"
version: "1.2.0"
synopsis: "Fast JSON"
description: """
A JSON library
with "quotes"."""
maintainer: "Jane Doe <jane@example.com>"
authors: ["Jane Doe" "Bob"]
license: ["MIT" "ISC"]
homepage: "https://example.org/json"
bug-reports: "https://example.org/json/issues"
dev-repo: "git+https://example.org/json.git"
depends: [
  "ocaml" {>= "4.08"}
  "dune" {>= "2.0" & build}
  ("lwt" | "async")
  "alcotest" {with-test}
]
available: os != "win32"
build: [["dune" "build" "-p" name "-j" jobs]]
(* trailing comment *)
url {
  src: "https://example.org/json-1.2.0.tbz"
  checksum: [
    "md5=0123456789abcdef"
    "sha256=fedcba9876543210"
  ]
}
"#;

    #[test]
    fn test_parse_opam() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "fastjson.opam", OPAM);
        let p = &OpamFile::recognize(&path).unwrap()[0];
        assert_eq!(p.name.as_deref(), Some("fastjson"));
        assert_eq!(p.version.as_deref(), Some("1.2.0"));
        assert_eq!(
            p.description.as_deref(),
            Some("Fast JSON\nA JSON library\nwith \"quotes\".")
        );
        assert_eq!(p.parties.len(), 3);
        assert_eq!(p.parties[0].role.as_deref(), Some("maintainer"));
        assert_eq!(p.compute_normalized_license().as_deref(), Some("MIT AND ISC"));
        assert_eq!(p.vcs_url.as_deref(), Some("git+https://example.org/json.git"));
        assert_eq!(p.download_url.as_deref(), Some("https://example.org/json-1.2.0.tbz"));
        assert_eq!(p.sha256.as_deref(), Some("fedcba9876543210"));

        let names: Vec<&str> = p.dependencies.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["ocaml", "dune", "lwt", "async", "alcotest"]);
        assert_eq!(p.dependencies[0].extracted_requirement.as_deref(), Some(">= 4.08"));
        assert_eq!(
            p.dependencies[1].extracted_requirement.as_deref(),
            Some(">= 2.0 & build")
        );
        assert!(!p.dependencies[4].is_runtime);
    }

    #[test]
    fn test_unterminated_string_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fixture(dir.path(), "opam", "name: \"broken\nversion: 1");
        assert!(matches!(
            OpamFile::recognize(&path),
            Err(RecognizeError::Parse { format: "opam", .. })
        ));
    }
}
