use std::process::ExitCode;

fn main() -> ExitCode {
    texforge::logger::init();
    texforge::cli::run()
}
