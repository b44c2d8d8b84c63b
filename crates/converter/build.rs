//! Build script for cc-music-converter
//!
//! Warns when `assets/` holds no encoder payload. Such a build compiles, but
//! every run stops at startup with a missing-payload error.

use std::fs;
use std::path::Path;

const ASSETS_DIR: &str = "assets";
const PAYLOAD_SUFFIX: &str = ".jar";

fn has_payload(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.filter_map(|e| e.ok()).any(|entry| {
        let path = entry.path();
        if path.is_dir() {
            return has_payload(&path);
        }
        entry
            .file_name()
            .to_str()
            .map(|name| name.to_lowercase().ends_with(PAYLOAD_SUFFIX))
            .unwrap_or(false)
    })
}

fn main() {
    println!("cargo:rerun-if-changed={}", ASSETS_DIR);

    if !has_payload(Path::new(ASSETS_DIR)) {
        println!(
            "cargo:warning=no *{} encoder payload in {}/; runs will fail until one is added",
            PAYLOAD_SUFFIX, ASSETS_DIR
        );
    }
}
