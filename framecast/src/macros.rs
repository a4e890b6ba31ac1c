//! Custom macros for reducing code repetition in framecast

/// Log a failure and continue execution (non-fatal error handling)
///
/// Used on release paths, where an error must not mask the failure that
/// triggered the unwind.
///
/// # Example
/// ```ignore
/// log_and_continue!(compositor.close_display(handle), "close display");
/// ```
#[macro_export]
macro_rules! log_and_continue {
    ($expr:expr, $context:expr) => {
        if let Err(e) = $expr {
            log::warn!("Failed to {}: {}", $context, e);
        }
    };
}

/// Validate an enum-like string value
///
/// # Example
/// ```ignore
/// validate_enum!(backend, "sim", "videocore");
/// validate_enum!(quality, "nonantialiased", "faster", "better");
/// ```
#[macro_export]
macro_rules! validate_enum {
    ($value:expr, $($variant:expr),+) => {
        match $value {
            $($variant)|+ => Ok(()),
            _ => anyhow::bail!("Invalid value: {} (expected one of: {})", $value, [$($variant),+].join(", ")),
        }
    };
}

/// Keep the first error of a teardown sequence, logging the ones after it
///
/// # Example
/// ```ignore
/// let mut first = None;
/// keep_first_error!(first, image.destroy(), Step::Teardown);
/// keep_first_error!(first, display.close(), Step::Teardown);
/// ```
#[macro_export]
macro_rules! keep_first_error {
    ($slot:expr, $expr:expr, $step:expr) => {
        if let Err(e) = $expr {
            let e = common::PipelineError::new($step, e);
            if $slot.is_none() {
                $slot = Some(e);
            } else {
                log::warn!("Further teardown failure: {}", e);
            }
        }
    };
}
