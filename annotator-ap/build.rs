//! Build script for annotator-ap
//!
//! Stamps the binary with the commit and build time it was built from so the
//! startup log identifies the exact build.

use std::process::Command;

fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|hash| hash.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let built_at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    println!("cargo:rustc-env=ANNOTATOR_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=ANNOTATOR_BUILD_TIMESTAMP={}", built_at);
}
