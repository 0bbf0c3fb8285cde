//! Build script for mobile-php-bridge.
//!
//! Without the `embed` feature nothing is linked: the crate only exposes the
//! `Engine` seam and everything above it.
//!
//! With `embed`, PHP's embed SAPI (`libphp.a`) is linked statically. The
//! build expects a PHP prefix containing:
//! - `lib/libphp.a` (embed SAPI, NTS, static)
//! - `include/php/` (headers, used for layout validation)
//!
//! Configure it with `NATIVEPHP_BRIDGE_PHP_PREFIX`. Without it the script
//! falls back to `~/.nativephp/php`, `~/.local/php` and `/usr/local`.
//!
//! For Android/iOS targets the prefix must hold a cross-compiled build:
//! ```sh
//! ./configure --host=aarch64-linux-android --enable-embed=static --disable-zts ...
//! make && make install INSTALL_ROOT=/path/to/prefix
//! ```

use std::env;
use std::path::{Path, PathBuf};

const PREFIX_VAR: &str = "NATIVEPHP_BRIDGE_PHP_PREFIX";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed={}", PREFIX_VAR);
    println!("cargo:rustc-check-cfg=cfg(bindgen_available)");

    if env::var_os("CARGO_FEATURE_EMBED").is_none() {
        return;
    }

    if env::var("DOCS_RS").is_ok() {
        println!("cargo:warning=Building docs - skipping PHP linking");
        return;
    }

    let prefix = find_php_prefix().unwrap_or_else(|| {
        panic!(
            "Could not locate a PHP build for the `embed` feature.\n\
             \n\
             Set {} to a PHP installation root containing:\n\
             - lib/libphp.a (PHP embed SAPI)\n\
             - include/php/ (PHP headers)\n\
             \n\
             Build PHP with: ./configure --enable-embed=static --disable-zts",
            PREFIX_VAR
        )
    });

    let lib_dir = prefix.join("lib");
    let libphp_path = lib_dir.join("libphp.a");
    if !libphp_path.exists() {
        panic!(
            "libphp.a was not found at: {}\n\
             Set {} to a PHP prefix containing lib/libphp.a.",
            libphp_path.display(),
            PREFIX_VAR
        );
    }

    println!("cargo:rustc-link-search=native={}", lib_dir.display());
    println!("cargo:rustc-link-lib=static=php");
    println!("cargo:warning=Linking against: {}", libphp_path.display());

    link_php_dependencies(&lib_dir);
    link_platform_libraries();

    #[cfg(feature = "embed")]
    generate_bindgen_validation(&prefix);
}

fn find_php_prefix() -> Option<PathBuf> {
    if let Ok(prefix) = env::var(PREFIX_VAR) {
        let path = PathBuf::from(&prefix);
        if validate_php_prefix(&path) {
            return Some(path);
        }
        println!("cargo:warning={} set but invalid: {}", PREFIX_VAR, prefix);
    }

    let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
    let candidates = [
        format!("{}/.nativephp/php", home),
        format!("{}/.local/php", home),
        "/usr/local".to_string(),
    ];

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| validate_php_prefix(p))
}

fn validate_php_prefix(prefix: &Path) -> bool {
    prefix.join("lib").join("libphp.a").exists()
}

/// Static archives a mobile PHP build usually ships next to `libphp.a`.
fn link_php_dependencies(lib_dir: &Path) {
    let libs = [
        "charset", "iconv", "z", "crypto", "ssl", "curl", "xml2", "onig", "sqlite3", "zip",
    ];

    for lib in libs {
        if lib_dir.join(format!("lib{}.a", lib)).exists() {
            println!("cargo:rustc-link-lib=static={}", lib);
        }
    }
}

fn link_platform_libraries() {
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    match target_os.as_str() {
        "android" => {
            println!("cargo:rustc-link-lib=log");
            println!("cargo:rustc-link-lib=m");
            println!("cargo:rustc-link-lib=dl");
        }
        "ios" | "macos" => {
            println!("cargo:rustc-link-lib=resolv");
            println!("cargo:rustc-link-lib=c++");
            println!("cargo:rustc-link-lib=framework=CoreFoundation");
            println!("cargo:rustc-link-lib=framework=SystemConfiguration");
        }
        _ => {}
    }
}

#[cfg(feature = "embed")]
fn generate_bindgen_validation(php_prefix: &Path) {
    use std::fs;

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR not set"));
    let output_path = out_dir.join("bindgen_validation.rs");

    let include_candidates = [php_prefix.join("include").join("php"), php_prefix.join("php")];

    let Some(include_dir) = include_candidates
        .iter()
        .find(|p| p.join("main").join("SAPI.h").exists())
    else {
        println!("cargo:warning=PHP SAPI.h not found, skipping layout validation");
        fs::write(&output_path, "// PHP headers not available\n")
            .expect("Failed to write stub bindgen file");
        return;
    };

    let wrapper_content = format!(
        "#include \"{}\"\n#include \"{}\"\n",
        include_dir.join("main").join("php.h").display(),
        include_dir.join("main").join("SAPI.h").display()
    );

    let wrapper_path = out_dir.join("bindgen_wrapper.h");
    fs::write(&wrapper_path, wrapper_content).expect("Failed to write bindgen wrapper");

    let bindings = bindgen::Builder::default()
        .header(wrapper_path.to_string_lossy())
        .clang_arg(format!("-I{}", include_dir.join("main").display()))
        .clang_arg(format!("-I{}", include_dir.join("Zend").display()))
        .clang_arg(format!("-I{}", include_dir.join("TSRM").display()))
        .clang_arg(format!("-I{}", include_dir.display()))
        .allowlist_type("_sapi_globals_struct")
        .allowlist_type("_sapi_module_struct")
        .allowlist_type("sapi_request_info")
        .allowlist_type("_sapi_headers_struct")
        .opaque_type("_zval_struct")
        .opaque_type("_zend_array")
        .opaque_type("_zend_object")
        .opaque_type("_zend_string")
        .opaque_type("_zend_class_entry")
        .opaque_type("_zend_function")
        .opaque_type("_zend_module_entry")
        .opaque_type("_php_stream")
        .opaque_type("_sapi_post_entry")
        .derive_debug(true)
        .derive_default(false)
        .layout_tests(false)
        .generate_comments(false)
        .parse_callbacks(Box::new(bindgen::CargoCallbacks::new()))
        .generate();

    match bindings {
        Ok(b) => {
            b.write_to_file(&output_path)
                .expect("Failed to write bindgen validation output");
            println!("cargo:rustc-cfg=bindgen_available");
        }
        Err(e) => {
            println!("cargo:warning=Bindgen generation failed: {}", e);
            fs::write(&output_path, "// Bindgen generation failed - see build warnings\n")
                .expect("Failed to write error stub");
        }
    }
}
