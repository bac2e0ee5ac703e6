mod context;
mod error;
mod types;

pub use context::*;
pub use error::*;
pub use types::*;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use sd_model::{ChainScorer, Corpus, ModelSpec, Tokenizer};
use sd_sampler::{ProcessorChain, RngSource, Token};
use sd_speculative::{
    auto_regressive_with, ModelProposer, SpeculativeConfig, SpeculativeGenerator,
};

/// Execute a closure that returns an `SdStatus`, catching any panics
/// and converting them into `SdStatus::ErrorInternal`.
fn catch_panic<F: FnOnce() -> SdStatus>(f: F) -> SdStatus {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(_) => {
            set_last_error("internal panic".to_string());
            SdStatus::ErrorInternal
        }
    }
}

/// Borrow a C string argument as UTF-8.
unsafe fn c_str<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, SdStatus> {
    if ptr.is_null() {
        set_last_error(format!("{} is null", what));
        return Err(SdStatus::ErrorInvalidArgument);
    }
    CStr::from_ptr(ptr).to_str().map_err(|e| {
        set_last_error(format!("invalid {}: {}", what, e));
        SdStatus::ErrorInvalidArgument
    })
}

fn write_output(output: *mut *mut c_char, text: String) -> SdStatus {
    match CString::new(text) {
        Ok(c) => {
            unsafe { *output = c.into_raw() };
            SdStatus::Ok
        }
        Err(e) => {
            set_last_error(format!("output encoding error: {}", e));
            SdStatus::ErrorGenerate
        }
    }
}

/// Validated inputs shared by both generation entry points.
struct Request {
    prompt: Vec<Token>,
    max_tokens: usize,
    width: usize,
    draft: ChainScorer,
    target: ChainScorer,
}

fn prepare(ctx: &SdContext, prompt: &str, params: &SdGenerateParams) -> Result<Request, SdStatus> {
    let (max_tokens, width) = params.counts().map_err(|msg| {
        set_last_error(msg);
        SdStatus::ErrorInvalidArgument
    })?;
    let Some(models) = ctx.models.as_ref() else {
        set_last_error("models not loaded".to_string());
        return Err(SdStatus::ErrorGenerate);
    };

    let chain = || {
        ProcessorChain::from_params(params.temperature, params.top_k as usize, params.top_p)
    };
    Ok(Request {
        prompt: ctx.tokenizer.encode(prompt),
        max_tokens,
        width,
        draft: ChainScorer::new(Arc::clone(&models.draft), chain()),
        target: ChainScorer::new(Arc::clone(&models.target), chain()),
    })
}

/// Create a new context.
///
/// On success, writes a heap-allocated `SdContext` pointer into `*ctx_out`
/// and returns `SdStatus::Ok`. The caller must later call `sd_context_destroy`
/// to free the context.
#[no_mangle]
pub extern "C" fn sd_context_create(ctx_out: *mut *mut SdContext) -> SdStatus {
    catch_panic(|| {
        if ctx_out.is_null() {
            set_last_error("ctx_out is null".to_string());
            return SdStatus::ErrorInvalidArgument;
        }
        let ctx = Box::new(SdContext::new());
        unsafe {
            *ctx_out = Box::into_raw(ctx);
        }
        SdStatus::Ok
    })
}

/// Destroy a context previously created by `sd_context_create`.
///
/// Passing a null pointer is a no-op and returns `SdStatus::Ok`.
#[no_mangle]
pub unsafe extern "C" fn sd_context_destroy(ctx: *mut SdContext) -> SdStatus {
    if ctx.is_null() {
        return SdStatus::Ok;
    }
    drop(Box::from_raw(ctx));
    SdStatus::Ok
}

/// Train the draft and target models on a text corpus.
///
/// `draft_spec` and `target_spec` name the models, e.g. `ngram:2` or
/// `uniform`. Replaces any models loaded earlier.
#[no_mangle]
pub unsafe extern "C" fn sd_model_load(
    ctx: *mut SdContext,
    corpus_path: *const c_char,
    draft_spec: *const c_char,
    target_spec: *const c_char,
) -> SdStatus {
    catch_panic(|| {
        if ctx.is_null() {
            set_last_error("null argument".to_string());
            return SdStatus::ErrorInvalidArgument;
        }
        let ctx = unsafe { &mut *ctx };
        let args = unsafe {
            (
                c_str(corpus_path, "corpus path"),
                c_str(draft_spec, "draft spec"),
                c_str(target_spec, "target spec"),
            )
        };
        let (path, draft, target) = match args {
            (Ok(p), Ok(d), Ok(t)) => (p, d, t),
            (Err(status), _, _) | (_, Err(status), _) | (_, _, Err(status)) => return status,
        };

        let specs = draft
            .parse::<ModelSpec>()
            .and_then(|d| target.parse::<ModelSpec>().map(|t| (d, t)));
        let (draft, target) = match specs {
            Ok(specs) => specs,
            Err(e) => {
                set_last_error(e.to_string());
                return SdStatus::ErrorInvalidArgument;
            }
        };

        let corpus = match Corpus::open(Path::new(path), &ctx.tokenizer) {
            Ok(c) => c,
            Err(e) => return model_failure("failed to load corpus", e),
        };
        let draft = match draft.build(&corpus) {
            Ok(m) => m,
            Err(e) => return model_failure("failed to build draft model", e),
        };
        let target = match target.build(&corpus) {
            Ok(m) => m,
            Err(e) => return model_failure("failed to build target model", e),
        };

        ctx.models = Some(LoadedModels { draft, target });
        SdStatus::Ok
    })
}

/// Generate text from a prompt with speculative sampling.
///
/// On success, writes the generated continuation (without the prompt) as a
/// heap-allocated C string into `*output`. The caller must later call
/// `sd_free_string` to free it. Generation stops early at end-of-text.
#[no_mangle]
pub unsafe extern "C" fn sd_generate(
    ctx: *mut SdContext,
    prompt: *const c_char,
    params: SdGenerateParams,
    output: *mut *mut c_char,
) -> SdStatus {
    catch_panic(|| {
        if ctx.is_null() || output.is_null() {
            set_last_error("null argument".to_string());
            return SdStatus::ErrorInvalidArgument;
        }
        let ctx = unsafe { &mut *ctx };
        let prompt = match unsafe { c_str(prompt, "prompt") } {
            Ok(s) => s,
            Err(status) => return status,
        };
        let request = match prepare(ctx, prompt, &params) {
            Ok(r) => r,
            Err(status) => return status,
        };

        let defaults = SpeculativeConfig::default();
        let config = SpeculativeConfig {
            speculation_width: request.width,
            max_speculation_width: defaults.max_speculation_width.max(request.width),
            policy: params.policy_kind(),
            stop_token: ctx.tokenizer.eot_id(),
            ..defaults
        };
        let mut generator = match SpeculativeGenerator::new(
            ModelProposer::new(request.draft),
            request.target,
            config,
        ) {
            Ok(g) => g,
            Err(e) => return spec_failure(e),
        };

        let mut rng = RngSource::seeded(params.seed);
        match generator.generate(&request.prompt, request.max_tokens, &mut rng) {
            Ok(generation) => {
                ctx.last_stats = SdStats::from(&generation.stats);
                write_output(output, ctx.tokenizer.decode(generation.generated()))
            }
            Err(e) => spec_failure(e),
        }
    })
}

/// Generate text from a prompt with the target model alone, one model call
/// per token. Same output contract as `sd_generate`.
#[no_mangle]
pub unsafe extern "C" fn sd_generate_baseline(
    ctx: *mut SdContext,
    prompt: *const c_char,
    params: SdGenerateParams,
    output: *mut *mut c_char,
) -> SdStatus {
    catch_panic(|| {
        if ctx.is_null() || output.is_null() {
            set_last_error("null argument".to_string());
            return SdStatus::ErrorInvalidArgument;
        }
        let ctx = unsafe { &mut *ctx };
        let prompt = match unsafe { c_str(prompt, "prompt") } {
            Ok(s) => s,
            Err(status) => return status,
        };
        let request = match prepare(ctx, prompt, &params) {
            Ok(r) => r,
            Err(status) => return status,
        };

        let mut rng = RngSource::seeded(params.seed);
        match auto_regressive_with(
            &request.prompt,
            request.max_tokens,
            request.target,
            ctx.tokenizer.eot_id(),
            &mut rng,
        ) {
            Ok(generation) => {
                ctx.last_stats = SdStats::from(&generation.stats);
                write_output(output, ctx.tokenizer.decode(generation.generated()))
            }
            Err(e) => spec_failure(e),
        }
    })
}

/// Copy the counters of the most recent successful generation on `ctx`.
#[no_mangle]
pub unsafe extern "C" fn sd_context_stats(ctx: *const SdContext, out: *mut SdStats) -> SdStatus {
    catch_panic(|| {
        if ctx.is_null() || out.is_null() {
            set_last_error("null argument".to_string());
            return SdStatus::ErrorInvalidArgument;
        }
        unsafe { *out = (*ctx).last_stats };
        SdStatus::Ok
    })
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error, or
/// null if no error has occurred. The caller must free the returned string
/// with `sd_free_string`.
#[no_mangle]
pub extern "C" fn sd_last_error() -> *const c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null(),
    }
}

/// Free a string previously returned by `sd_generate` or `sd_last_error`.
#[no_mangle]
pub unsafe extern "C" fn sd_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
