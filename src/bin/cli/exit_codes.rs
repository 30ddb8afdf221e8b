//! Process exit codes: success, install failure, and CLI argument errors
//! (the latter handled by `clap` itself, which already exits with 2).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    InstallFailure = 1,
    ArgumentError = 2,
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
