//! srcpack - Build source archives from tagged descriptor files

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(e) = srcpack::cli::run() {
        srcpack::cli::report_error(&e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
