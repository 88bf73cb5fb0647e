//! Build script for tlc-mux.

use std::{env, fs, path::PathBuf};

fn main() {
    println!("cargo:rustc-check-cfg=cfg(rust_analyzer)");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let target = env::var("TARGET").expect("TARGET is set by cargo");

    // Firmware binaries (demos, compile-only checks) link against the board's memory map.
    let memory_file = if target.starts_with("thumbv6m") {
        Some("memory-pico1.x")
    } else if target.starts_with("thumbv8m") {
        Some("memory-pico2.x")
    } else {
        None
    };

    if let Some(memory_file) = memory_file {
        let memory_x = fs::read_to_string(memory_file)
            .unwrap_or_else(|err| panic!("Failed to read {memory_file}: {err}"));
        fs::write(out_dir.join("memory.x"), memory_x).expect("Failed to write memory.x");
        println!("cargo:rustc-link-search={}", out_dir.display());
        println!("cargo:rerun-if-changed={memory_file}");
        println!("cargo:rustc-link-arg-bins=--nmagic");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        if target.starts_with("thumbv6m") {
            println!("cargo:rustc-link-arg-bins=-Tlink-rp.x");
        }
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
}
