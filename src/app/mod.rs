pub(crate) mod exit_handler;
pub(crate) mod list;
pub(crate) mod runtime;
pub(crate) mod settings;
pub(crate) mod terminal;
