use std::process::ExitCode;

fn main() -> ExitCode {
    match vmslaved::run_slave() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("vmslaved: {error}");
            ExitCode::FAILURE
        }
    }
}
