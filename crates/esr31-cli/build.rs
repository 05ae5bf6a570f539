use std::env;
use std::process::Command;

const UNKNOWN: &str = "unknown";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=GITHUB_SHA");

    let commit_full = env::var("GITHUB_SHA")
        .ok()
        .filter(|v| !v.is_empty())
        .or_else(|| git(&["rev-parse", "HEAD"]));
    let commit_short = match commit_full.as_deref() {
        Some(full) => full.chars().take(7).collect(),
        None => UNKNOWN.to_string(),
    };
    let build_date = git(&["log", "-1", "--format=%cI"]).unwrap_or_else(|| UNKNOWN.to_string());

    emit("ESR31_BUILD_COMMIT", &commit_short);
    emit(
        "ESR31_BUILD_COMMIT_FULL",
        commit_full.as_deref().unwrap_or(UNKNOWN),
    );
    emit("ESR31_BUILD_DATE", &build_date);
}

fn emit(key: &str, value: &str) {
    println!("cargo:rustc-env={}={}", key, value);
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() { None } else { Some(value) }
}
