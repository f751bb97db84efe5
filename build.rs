use std::env;
use std::process::Command;

fn main() {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    if let Some(version) = command_output(&rustc, &["--version"]) {
        println!("cargo:rustc-env=PRINTGATE_RUSTC_VERSION={version}");
    }

    // CI may pin the commit explicitly; fall back to the local checkout.
    if env::var_os("PRINTGATE_COMMIT").is_none()
        && let Some(commit) = command_output("git", &["rev-parse", "--short", "HEAD"])
    {
        println!("cargo:rustc-env=PRINTGATE_COMMIT={commit}");
    }

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PRINTGATE_COMMIT");
    println!("cargo:rerun-if-env-changed=PRINTGATE_BUILD_DATE");
    println!("cargo:rerun-if-env-changed=PRINTGATE_BUILT_BY");
    println!("cargo:rerun-if-env-changed=PRINTGATE_REPO_URL");
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
