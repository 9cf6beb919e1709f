/// rstpy CLI
///
/// Turns the ipython blocks of a documentation tree into standalone scripts
/// and runs them in parallel to check that the examples still work.

use rstpy_core::cli;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();

    match cli::run_cli().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
