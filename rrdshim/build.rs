//! Build script for rrdshim.
//!
//! With the `native` feature enabled, locates the system librrd and decides
//! which info entry point the binding can call. librrd 1.3.x only exports the
//! argument-vector `rrd_info`; 1.4 and later also export `rrd_info_r`.

use std::env;

/// First librrd release that exports `rrd_info_r`.
const INFO_R_SINCE: (u32, u32) = (1, 4);

fn main() {
    println!("cargo::rustc-check-cfg=cfg(rrd_info_r)");
    println!("cargo::rerun-if-env-changed=RRDSHIM_LIBRRD_VERSION");

    if env::var_os("CARGO_FEATURE_NATIVE").is_none() {
        return;
    }

    let version = match env::var("RRDSHIM_LIBRRD_VERSION") {
        // Pinned for cross builds where pkg-config cannot see the target.
        Ok(pinned) => {
            println!("cargo::rustc-link-lib=rrd");
            Some(pinned)
        }
        Err(_) => match pkg_config::Config::new().probe("librrd") {
            Ok(library) => Some(library.version),
            Err(e) => {
                let reason = e.to_string();
                let reason = reason.lines().next().unwrap_or("unknown error");
                println!(
                    "cargo::warning=librrd not found via pkg-config ({reason}); \
                     falling back to the argument-vector rrd_info entry point"
                );
                println!("cargo::rustc-link-lib=rrd");
                None
            }
        },
    };

    if version
        .as_deref()
        .and_then(parse_version)
        .is_some_and(|v| v >= INFO_R_SINCE)
    {
        println!("cargo::rustc-cfg=rrd_info_r");
    }
}

/// Parses the `major.minor` prefix of a version such as `1.7.2`.
fn parse_version(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts
        .next()?
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .ok()?;
    Some((major, minor))
}
