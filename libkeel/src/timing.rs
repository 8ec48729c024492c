//! Lightweight phase instrumentation. Spans show up when the embedding driver
//! installs a tracing subscriber; otherwise they cost almost nothing.

#[macro_export]
macro_rules! timing_phase {
    ($($args:tt)*) => {
        let _guard = tracing::debug_span!($($args)*).entered();
    };
}
