use clap::Parser;
use office_repair::cli::{self, Args, RunStatus};

fn main() {
    let args = Args::parse();

    // Initialize logging/tracing system
    // Control log level with RUST_LOG env var:
    //   RUST_LOG=debug office-repair broken.docx fixed.docx
    //   RUST_LOG=office_repair::archive=trace office-repair broken.docx fixed.docx
    if args.verbose {
        office_repair::logging::init_verbose();
    } else {
        office_repair::logging::init();
    }

    match cli::run(&args) {
        Ok(RunStatus::Repaired) => {}
        Ok(RunStatus::NothingRecovered) => std::process::exit(2),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
