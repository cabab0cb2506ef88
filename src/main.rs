fn main() {
    // Diagnostics go to stderr; stdout carries the protocol stream.
    env_logger::Builder::from_env(env_logger::Env::default()).init();

    if let Err(err) = mermaid_sidecar::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
