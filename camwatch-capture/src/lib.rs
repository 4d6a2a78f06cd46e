pub mod supervisor;

pub use supervisor::{
    CaptureError, CaptureProcess, ExitOutcome, ProcessExit, ProcessSupervisor,
};
