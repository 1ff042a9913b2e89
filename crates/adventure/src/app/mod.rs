pub(crate) mod bootstrap;
pub(crate) mod content;
pub(crate) mod gameplay;
pub(crate) mod loop_runner;
