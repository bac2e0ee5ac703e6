use std::cell::RefCell;
use std::ffi::CString;

use sd_model::ModelError;
use sd_speculative::SpecError;

use crate::types::SdStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `sd_last_error`.
pub fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Record `err` and map it to a status code.
pub fn spec_failure(err: SpecError) -> SdStatus {
    let status = match err {
        SpecError::InvalidArgument(_) | SpecError::VocabMismatch { .. } => {
            SdStatus::ErrorInvalidArgument
        }
        _ => SdStatus::ErrorGenerate,
    };
    set_last_error(err.to_string());
    status
}

pub fn model_failure(context: &str, err: ModelError) -> SdStatus {
    set_last_error(format!("{}: {}", context, err));
    SdStatus::ErrorModelLoad
}
