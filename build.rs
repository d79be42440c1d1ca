use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=SYBASE");

    // Only the DB-Library backend needs the native client
    if env::var_os("CARGO_FEATURE_DBLIB").is_none() {
        return;
    }

    // Get the FreeTDS / Sybase install prefix
    if let Ok(sybase_dir) = env::var("SYBASE") {
        let lib_path = PathBuf::from(format!("{}/lib", sybase_dir));
        let lib64_path = PathBuf::from(format!("{}/lib64", sybase_dir));

        // Pass the paths to the linker
        println!("cargo:rustc-link-search=native={}", lib_path.display());
        println!("cargo:rustc-link-search=native={}", lib64_path.display());
    }

    // Link the DB-Library dynamic library
    println!("cargo:rustc-link-lib=dylib=sybdb");
}
