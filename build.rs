use std::process::Command;

/// `git describe` の結果を BUILD_ID として埋め込む。git が無い環境ではパッケージバージョン。
fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");

    let described = Command::new("git")
        .args(["describe", "--always", "--dirty", "--tags", "--abbrev=8"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .filter(|s| !s.is_empty());

    let build_id = described
        .unwrap_or_else(|| format!("v{}", std::env::var("CARGO_PKG_VERSION").unwrap_or_default()));

    println!("cargo:rustc-env=BUILD_ID={}", build_id);
}
