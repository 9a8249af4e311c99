pub(crate) mod bootstrap;
pub(crate) mod crash_report;
pub(crate) mod loop_runner;
pub(crate) mod title_screen;
