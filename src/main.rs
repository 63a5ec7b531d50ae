//! CLI entry point.

fn main() {
    if let Err(e) = zmanim_expr::cli::run_cli() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
