mod scanner;
mod signature;
mod trampoline;

pub use scanner::SignatureScanner;
pub use signature::*;
pub use trampoline::{
    CaptureRegister, HookSession, TrampolineRecord, emit_capture_stub, emit_site_patch,
    inject_pointer_capture, JMP_LEN, REGION_SIZE,
};
