//! Hygiene: source rules for the roomchat crates, checked at test time.
//!
//! Scans the production sources of both crates for patterns that crash the
//! process or swallow errors. Sibling `*_test.rs` files are exempt. Every
//! budget is zero and should stay there.

use std::fs;
use std::path::{Path, PathBuf};

const SOURCE_ROOTS: &[&str] = &["src", "packets/src"];

/// `(pattern, budget, what it means)`
const RULES: &[(&str, usize, &str)] = &[
    (".unwrap()", 0, "panics on None/Err"),
    (".expect(", 0, "panics on None/Err"),
    ("panic!(", 0, "explicit panic"),
    ("unreachable!(", 0, "explicit panic"),
    ("todo!(", 0, "unfinished stub"),
    ("unimplemented!(", 0, "unfinished stub"),
    ("let _ =", 0, "discards a result without inspecting it"),
    (".ok()", 0, "turns an error into None without logging it"),
    ("Err(_) => None", 0, "hand-written .ok()"),
    ("#[allow(dead_code)]", 0, "hides unused code"),
];

struct SourceFile {
    path: PathBuf,
    content: String,
}

fn source_files() -> Vec<SourceFile> {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    let mut files = Vec::new();
    for root in SOURCE_ROOTS {
        collect_rs_files(&manifest.join(root), &mut files);
    }
    files
}

fn collect_rs_files(dir: &Path, out: &mut Vec<SourceFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, out);
            continue;
        }
        let is_rust = path.extension().is_some_and(|e| e == "rs");
        let is_test = path.to_string_lossy().ends_with("_test.rs");
        if !is_rust || is_test {
            continue;
        }
        if let Ok(content) = fs::read_to_string(&path) {
            out.push(SourceFile { path, content });
        }
    }
}

/// `(path:line, text)` for every line containing `pattern`.
fn hits(files: &[SourceFile], pattern: &str) -> Vec<String> {
    files
        .iter()
        .flat_map(|file| {
            file.content
                .lines()
                .enumerate()
                .filter(|(_, line)| line.contains(pattern))
                .map(|(n, line)| format!("  {}:{}: {}", file.path.display(), n + 1, line.trim()))
        })
        .collect()
}

#[test]
fn sources_are_found() {
    let files = source_files();
    assert!(files.iter().any(|f| f.path.ends_with("src/session.rs")), "session.rs not scanned");
    assert!(files.iter().any(|f| f.path.ends_with("packets/src/lib.rs")), "packets not scanned");
    assert!(files.iter().all(|f| !f.path.to_string_lossy().ends_with("_test.rs")));
}

#[test]
fn pattern_budgets() {
    let files = source_files();
    let mut report = Vec::new();
    for (pattern, budget, meaning) in RULES {
        let found = hits(&files, pattern);
        if found.len() > *budget {
            report.push(format!("`{pattern}` ({meaning}): found {}, max {budget}\n{}", found.len(), found.join("\n")));
        }
    }
    assert!(report.is_empty(), "hygiene budgets exceeded:\n{}", report.join("\n\n"));
}
