//! ---
//! msr_section: "03-logging"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Structured reconciliation logging helpers."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
//! Logging macros that stamp every event with the [`LogContext`](crate::LogContext) fields.

/// Emit an informational log enriched with reconciliation context.
#[macro_export]
macro_rules! msr_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__msr_event!($crate::__tracing::Level::INFO, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__msr_event!($crate::__tracing::Level::INFO, &$crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with reconciliation context.
#[macro_export]
macro_rules! msr_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__msr_event!($crate::__tracing::Level::DEBUG, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__msr_event!($crate::__tracing::Level::DEBUG, &$crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with reconciliation context.
#[macro_export]
macro_rules! msr_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__msr_event!($crate::__tracing::Level::ERROR, &$ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__msr_event!($crate::__tracing::Level::ERROR, &$crate::LogContext::default(), $($arg)+)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __msr_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx: &$crate::LogContext = $ctx;
        $crate::__tracing::event!(
            $level,
            service_id = ctx.service_id.unwrap_or(""),
            service_name = ctx.service_name.unwrap_or(""),
            operation = ctx.operation.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}
