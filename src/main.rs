use std::process::ExitCode;

fn main() -> ExitCode {
    match loadlens::entry::run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::from(2)
        }
    }
}
