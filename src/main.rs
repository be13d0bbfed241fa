use std::process::ExitCode;

fn main() -> ExitCode {
    packforge_lib::run()
}
