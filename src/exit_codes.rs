/// Process exit codes.
pub mod exit {
    /// Normal exit, including a user interrupt while watching.
    pub const SUCCESS: i32 = 0;
    /// Fetching, parsing, or notifying failed.
    pub const OPERATIONAL_FAILURE: i32 = 1;
    /// Bad configuration detected before polling started.
    pub const CONFIG_FAILURE: i32 = 2;
}
