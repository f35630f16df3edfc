//! Build script for isr-servo.

use std::{env, fs, path::PathBuf};

// RP2040 (Pico 1): 2 MB flash with a 256-byte second-stage bootloader, 256 KB striped RAM.
const MEMORY_X_RP2040: &str = "MEMORY {
    BOOT2 : ORIGIN = 0x10000000, LENGTH = 0x100
    FLASH : ORIGIN = 0x10000100, LENGTH = 2048K - 0x100
    RAM   : ORIGIN = 0x20000000, LENGTH = 256K
}

SECTIONS {
    .boot2 ORIGIN(BOOT2) :
    {
        KEEP(*(.boot2));
    } > BOOT2
} INSERT BEFORE .text;
";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Handle memory.x based on target; host builds need none.
    let target = env::var("TARGET").unwrap_or_default();

    if target.starts_with("thumbv6m") {
        let out_dir = PathBuf::from(env::var("OUT_DIR").expect("cargo sets OUT_DIR"));
        let dest = out_dir.join("memory.x");
        fs::write(&dest, MEMORY_X_RP2040).expect("Failed to write memory.x");
        println!("cargo:rustc-link-search={}", out_dir.display());
    }
}
