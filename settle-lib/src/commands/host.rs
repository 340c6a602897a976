use std::io::Write;

/// Where command output goes and how the process ends; swapped out in tests.
pub trait Host: Send + Sync {
    /// Destination for command results (e.g., stdout).
    fn output(&mut self) -> impl Write;

    /// Destination for diagnostics (e.g., stderr).
    fn error(&mut self) -> impl Write;

    /// Terminate the process (a test host may just record the code).
    fn exit(&mut self, code: i32);
}

/// Host capturing output in memory
#[cfg(test)]
pub struct TestHost {
    pub output_buf: Vec<u8>,
    pub error_buf: Vec<u8>,
    pub exit_code: Option<i32>,
}

#[cfg(test)]
impl TestHost {
    pub const fn new() -> Self {
        Self {
            output_buf: Vec::new(),
            error_buf: Vec::new(),
            exit_code: None,
        }
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output_buf).into_owned()
    }

    pub fn error_str(&self) -> String {
        String::from_utf8_lossy(&self.error_buf).into_owned()
    }
}

#[cfg(test)]
impl Host for TestHost {
    fn output(&mut self) -> impl Write {
        &mut self.output_buf
    }

    fn error(&mut self) -> impl Write {
        &mut self.error_buf
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}
