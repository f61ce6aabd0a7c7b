use std::env;
use std::process::Command;

/// Short commit hash of the checkout, if git is available.
fn short_sha() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() { None } else { Some(sha) }
}

fn main() {
    println!("cargo:rerun-if-env-changed=GESNP_GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    // packagers building from a tarball can pin the hash explicitly
    let sha = env::var("GESNP_GIT_SHA")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(short_sha);

    if let Some(sha) = sha {
        println!("cargo:rustc-env=GESNP_GIT_SHA={}", sha);
    }
}
