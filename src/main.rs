//! apk_release - build, sign, publish and announce an Android release.
//!
//! Exit code 0 means the release went out (possibly with a degraded mirror
//! or notification) or there was nothing to release. Exit code 1 means a
//! fatal error stopped the run before anything was published.

use anyhow::Context;
use std::process;

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::init();

    let exit_code = match apk_release::cli::run().await.context("release pipeline failed") {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}
