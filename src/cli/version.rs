//! `version` subcommand.

pub fn execute() {
    println!("turnstile {}", env!("CARGO_PKG_VERSION"));
}
