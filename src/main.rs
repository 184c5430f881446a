use release_manifest::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    // Logs go to stderr so `generate --dry-run` output stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run_cli() {
        eprintln!("Error: {}", e);

        // Print the error chain
        let mut source = e.source();
        while let Some(err) = source {
            eprintln!("Caused by: {}", err);
            source = err.source();
        }

        std::process::exit(1);
    }
}
