//! Build Script for Temperature Stream
//!
//! Emits the coverage cfg and tracks the checked-in protobuf stubs.
//!
//! The Rust stubs for `temperature.v1` are generated ahead of time into
//! `packages/schema-gen/rust/` so that building this crate does not need
//! `protoc` or `buf` on the PATH.

use std::env;

fn main() {
    // Rerun build script if it changes
    println!("cargo:rerun-if-changed=build.rs");

    // Rerun if the proto source or the generated stubs change
    println!("cargo:rerun-if-changed=../../packages/proto/temperature/");
    println!("cargo:rerun-if-changed=../../packages/schema-gen/rust/temperature/");

    // Emit cfg for coverage detection
    if env::var("CARGO_LLVM_COV").is_ok()
        || env::var("LLVM_PROFILE_FILE").is_ok()
        || env::var("RUSTFLAGS")
            .map(|f| f.contains("instrument-coverage"))
            .unwrap_or(false)
    {
        println!("cargo:rustc-cfg=coverage");
    }
}
