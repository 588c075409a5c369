//! Embeds the commit and commit date shown by `qlp --version`.

use std::process::Command;

const UNKNOWN: &str = "unknown";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=QLP_COMMIT");

    let (head, date) = head_commit().unwrap_or_else(|| (UNKNOWN.to_string(), UNKNOWN.to_string()));
    // Release pipelines build from exported trees without .git.
    let commit = match std::env::var("QLP_COMMIT") {
        Ok(sha) if !sha.trim().is_empty() => sha.trim().chars().take(7).collect(),
        _ => head,
    };

    println!("cargo:rustc-env=QLP_BUILD_COMMIT={commit}");
    println!("cargo:rustc-env=QLP_BUILD_DATE={date}");
}

/// Abbreviated hash and short commit date of HEAD.
fn head_commit() -> Option<(String, String)> {
    let output = Command::new("git")
        .args(["log", "-1", "--format=%h %cs"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let (hash, date) = text.trim().split_once(' ')?;
    Some((hash.to_string(), date.to_string()))
}
